//! SignalSource trait - read-only access to platform content and engagement

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ranking::{ContentItem, ContentType};
use crate::store::models::EngagementCounts;

/// コンテンツとエンゲージメントの読み取り専用アダプタ。
///
/// 実装はアイテムごとの往復ではなく、まとめて集計すること。
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// `since` 以降に作成/公開された非表示でないコンテンツを返す。
    async fn fetch_candidates(
        &self,
        content_type: ContentType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>>;

    /// 指定 ID 群について、`since` 以降のいいね数・コメント数と累計コメント数を
    /// 1回の呼び出しで集計する。
    async fn fetch_engagement(
        &self,
        content_type: ContentType,
        content_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, EngagementCounts>>;
}
