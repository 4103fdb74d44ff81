pub mod best_ball;
pub mod handicap;
pub mod match_status;
pub mod net;
pub mod request;
pub mod rules;

pub use best_ball::*;
pub use handicap::*;
pub use match_status::*;
pub use net::*;
pub use request::*;
pub use rules::*;
