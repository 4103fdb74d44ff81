use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::score::ScoringRules;

#[derive(Parser, Debug)]
#[command(author, version, about = "Best-ball match scoring", long_about = None)]
pub struct Cli {
    /// Optional TOML file; command-line values override it.
    #[arg(long, value_name = "CONFIG_TOML")]
    pub config_toml: Option<PathBuf>,
    /// SQLite file holding the roster and both score sources.
    #[arg(long, value_name = "DATABASE_PATH")]
    pub db_path: Option<PathBuf>,
    /// SQLite file used as the device-local score cache.
    #[arg(long, value_name = "CACHE_PATH")]
    pub cache_path: Option<PathBuf>,
    /// Tracing filter, e.g. `info` or `rusty_best_ball=debug`. `RUST_LOG` wins if set.
    #[arg(long, value_name = "LOG_LEVEL")]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the database and cache schemas.
    InitDb,
    /// Load a match roster, holes and course handicaps from JSON.
    Import {
        #[arg(long, value_name = "JSON_PATH")]
        json: PathBuf,
    },
    /// Record one gross score. Blank text clears the hole.
    Submit {
        #[arg(long = "match")]
        match_id: i64,
        #[arg(long = "player")]
        player_id: i64,
        #[arg(long)]
        hole: i32,
        #[arg(long, default_value = "")]
        gross: String,
    },
    /// Print per-hole team results and the match standing.
    Standing {
        #[arg(long = "match")]
        match_id: i64,
    },
    /// Replay writes still waiting to reach the back end.
    Retry {
        #[arg(long = "match")]
        match_id: i64,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    db_path: Option<PathBuf>,
    cache_path: Option<PathBuf>,
    log_level: Option<String>,
    rules: Option<ScoringRules>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub cache_path: PathBuf,
    pub log_level: String,
    pub rules: ScoringRules,
    pub command: Command,
}

/// Merge CLI values over the optional TOML file over defaults.
///
/// # Errors
/// Returns an error if the config file is unreadable or invalid, or the
/// scoring rules are inconsistent.
pub fn load_config(cli: Cli) -> Result<AppConfig> {
    let file_config = match cli.config_toml.as_ref() {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read config toml {}", path.display()))?;
            toml::from_str::<FileConfig>(&contents)
                .with_context(|| format!("parse config toml {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    let rules = file_config.rules.unwrap_or_default();
    validate_rules(&rules)?;

    Ok(AppConfig {
        db_path: cli
            .db_path
            .or(file_config.db_path)
            .unwrap_or_else(|| PathBuf::from("best_ball.db")),
        cache_path: cli
            .cache_path
            .or(file_config.cache_path)
            .unwrap_or_else(|| PathBuf::from("best_ball_cache.db")),
        log_level: cli
            .log_level
            .or(file_config.log_level)
            .unwrap_or_else(|| "info".to_string()),
        rules,
        command: cli.command,
    })
}

fn validate_rules(rules: &ScoringRules) -> Result<()> {
    if rules.min_gross < 1 || rules.min_gross > rules.max_gross {
        return Err(anyhow!(
            "invalid gross range {}..={}",
            rules.min_gross,
            rules.max_gross
        ));
    }
    if rules.max_strokes_per_hole < 0 {
        return Err(anyhow!("max_strokes_per_hole must not be negative"));
    }
    if rules.holes_per_round < 1 {
        return Err(anyhow!("holes_per_round must be at least 1"));
    }
    Ok(())
}
