// DAO トレイトと実装の公開
mod content;
mod impls;
pub mod memory;
mod scores;
pub mod traits;

pub use impls::postgres::PgTrendingDao;
pub use memory::InMemoryTrendingDao;
pub use traits::{ScoreStore, SignalSource};
