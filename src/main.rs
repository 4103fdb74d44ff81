use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rusty_best_ball::args::{AppConfig, Cli, Command, load_config};
use rusty_best_ball::model::{MatchId, MatchSetup, TeamHoleResult, TeamId};
use rusty_best_ball::prefill::db_prefill;
use rusty_best_ball::storage::{SqliteBackend, SqliteCache};
use rusty_best_ball::{ScoreStore, SubmitOutcome};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Cli::parse())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("parse log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backend = SqliteBackend::open(&config.db_path)
        .with_context(|| format!("open database {}", config.db_path.display()))?;

    match config.command.clone() {
        Command::InitDb => {
            SqliteCache::open(&config.cache_path)
                .with_context(|| format!("open cache {}", config.cache_path.display()))?;
            println!(
                "initialized {} and {}",
                config.db_path.display(),
                config.cache_path.display()
            );
        }
        Command::Import { json } => {
            let contents = std::fs::read_to_string(&json)
                .with_context(|| format!("read {}", json.display()))?;
            let value: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("parse {}", json.display()))?;
            let count = db_prefill(&value, &backend).await?;
            println!("imported {count} match(es)");
        }
        Command::Submit {
            match_id,
            player_id,
            hole,
            gross,
        } => {
            let store = open_store(&config, backend)?;
            store.mount(match_id).await?;
            match store.submit_raw(match_id, player_id, hole, &gross).await {
                SubmitOutcome::Accepted => {}
                SubmitOutcome::Rejected(e) | SubmitOutcome::Skipped(e) => {
                    return Err(anyhow!("score not recorded: {e}"));
                }
            }
            store.settle().await;
            print_sync_summary(&store).await;
        }
        Command::Standing { match_id } => {
            let store = open_store(&config, backend)?;
            store.load_match(match_id).await?;
            print_standing(&store, match_id).await;
        }
        Command::Retry { match_id } => {
            let store = open_store(&config, backend)?;
            store.mount(match_id).await?;
            store.settle().await;
            print_sync_summary(&store).await;
        }
    }
    Ok(())
}

fn open_store(config: &AppConfig, backend: SqliteBackend) -> Result<ScoreStore> {
    let cache = SqliteCache::open(&config.cache_path)
        .with_context(|| format!("open cache {}", config.cache_path.display()))?;
    Ok(ScoreStore::new(
        Arc::new(backend),
        Arc::new(cache),
        config.rules,
    ))
}

async fn print_sync_summary(store: &ScoreStore) {
    match store.pending_count().await {
        0 => println!("all scores synced"),
        n => println!("{n} write(s) still pending; run `retry` when back online"),
    }
}

fn cell(result: Option<&TeamHoleResult>, setup: &MatchSetup) -> String {
    let Some(result) = result else {
        return "-".to_string();
    };
    match (result.best_net_score, result.contributing_player_id) {
        (Some(net), Some(player_id)) => match setup.player(player_id) {
            Some(player) => format!("{net} ({})", player.name),
            None => net.to_string(),
        },
        (Some(net), None) => net.to_string(),
        (None, _) => "-".to_string(),
    }
}

async fn print_standing(store: &ScoreStore, match_id: MatchId) {
    let Some(setup) = store.match_setup(match_id).await else {
        println!("match {match_id} is not loaded");
        return;
    };
    let results = store.get_team_results(match_id).await;
    println!("{:>4} {:>14} {:>14}", "hole", TeamId::A.name(), TeamId::B.name());
    for hole in setup.hole_numbers() {
        let team = |team_id| {
            results
                .iter()
                .find(|r| r.hole_number == hole && r.team_id == team_id)
        };
        println!(
            "{:>4} {:>14} {:>14}",
            hole,
            cell(team(TeamId::A), &setup),
            cell(team(TeamId::B), &setup)
        );
    }

    let standing = store.get_standing(match_id).await;
    if standing.is_decided {
        let hole = standing.deciding_hole.unwrap_or(standing.through_hole);
        println!("{} (decided on hole {hole})", standing.label());
    } else {
        println!("{} through {}", standing.label(), standing.through_hole);
    }
}
