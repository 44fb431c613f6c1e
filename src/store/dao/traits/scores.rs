//! ScoreStore trait - trending score persistence and ranking reads

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ranking::{ContentScope, RankedContent, ScoreKind, TrendingScore};

/// トレンドスコアテーブルのデータアクセス層。
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// 接続確認（readiness probe 用）
    async fn ping(&self) -> Result<()>;

    /// `(content_id, content_type)` をキーに全列を上書きする。書き込んだ行数を返す。
    async fn upsert_scores(&self, records: &[TrendingScore]) -> Result<u64>;

    /// `calculated_at < cutoff` の行を削除し、削除件数を返す。
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// 指定スコアの降順で上位 `limit` 件をメタデータ付きで返す。
    async fn top_n(
        &self,
        scope: ContentScope,
        kind: ScoreKind,
        limit: usize,
    ) -> Result<Vec<RankedContent>>;
}
