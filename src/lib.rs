pub mod args;
pub mod error;
pub mod model;
pub mod mvu;
pub mod prefill;
pub mod score;
pub mod storage;
pub mod store;

pub use error::CoreError;
pub use store::{ScoreStore, SubmitOutcome};
