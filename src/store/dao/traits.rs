//! DAO trait definitions
//!
//! The ranking engine reads content signals through [`SignalSource`] and
//! writes/reads the score table through [`ScoreStore`].

mod scores;
mod signals;

pub use scores::ScoreStore;
pub use signals::SignalSource;
