//! Content ranking engine: pure score formulas plus the batch run that feeds
//! them from the signal source and writes the score table.

pub mod calculator;
mod error;
pub mod orchestrator;
mod types;

pub use calculator::{TrendingBreakdown, compute_hot_score, compute_trending_score, score_item};
pub use error::{InvalidSignal, RankingError};
pub use orchestrator::{RankingOrchestrator, RankingSettings};
pub use types::{
    ContentItem, ContentScope, ContentType, EngagementWindow, RankedContent, RunSummary,
    ScoreKind, TrendingScore,
};
