pub mod behav;
pub mod error;
pub mod funcmin;
pub mod game_arena;
pub mod game_poker;
pub mod game_tree;
pub mod qre;
pub mod support;

pub use behav::BehaviorProfile;
pub use error::{Error, Result};
pub use support::BehaviorSupport;
