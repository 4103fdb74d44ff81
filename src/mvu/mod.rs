pub mod runtime;
pub mod score;
