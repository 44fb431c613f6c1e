//! ランキングエンジンのドメイン型。

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// スコア対象となるコンテンツ種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    NewsArticle,
    CommunityPost,
}

impl ContentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::NewsArticle => "news_article",
            ContentType::CommunityPost => "community_post",
        }
    }

    /// DB の `content_type` 列の値から復元する。
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "news_article" => Some(ContentType::NewsArticle),
            "community_post" => Some(ContentType::CommunityPost),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// バッチ実行およびランキング参照の対象範囲。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentScope {
    #[default]
    All,
    #[serde(alias = "news_only")]
    News,
    #[serde(alias = "community_only")]
    Community,
}

impl ContentScope {
    #[must_use]
    pub fn content_types(self) -> &'static [ContentType] {
        match self {
            ContentScope::All => &[ContentType::NewsArticle, ContentType::CommunityPost],
            ContentScope::News => &[ContentType::NewsArticle],
            ContentScope::Community => &[ContentType::CommunityPost],
        }
    }

    #[must_use]
    pub fn includes(self, content_type: ContentType) -> bool {
        self.content_types().contains(&content_type)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentScope::All => "all",
            ContentScope::News => "news",
            ContentScope::Community => "community",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(ContentScope::All),
            "news" | "news_only" => Some(ContentScope::News),
            "community" | "community_only" => Some(ContentScope::Community),
            _ => None,
        }
    }
}

/// どちらのスコアで並べるか。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Hot,
    #[default]
    Trending,
}

impl ScoreKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreKind::Hot => "hot",
            ScoreKind::Trending => "trending",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" => Some(ScoreKind::Hot),
            "trending" => Some(ScoreKind::Trending),
            _ => None,
        }
    }

    /// Descending order by this score, then by the other score, then by id.
    #[must_use]
    pub fn compare(self, a: &TrendingScore, b: &TrendingScore) -> Ordering {
        let (primary_a, secondary_a, primary_b, secondary_b) = match self {
            ScoreKind::Hot => (a.hot_score, a.trending_score, b.hot_score, b.trending_score),
            ScoreKind::Trending => (a.trending_score, a.hot_score, b.trending_score, b.hot_score),
        };
        primary_b
            .total_cmp(&primary_a)
            .then_with(|| secondary_b.total_cmp(&secondary_a))
            .then_with(|| a.content_id.cmp(&b.content_id))
            .then_with(|| a.content_type.cmp(&b.content_type))
    }

    /// `records` を降順に並べて先頭 `limit` 件を返す。
    #[must_use]
    pub fn top(self, records: &[TrendingScore], limit: usize) -> Vec<TrendingScore> {
        let mut sorted = records.to_vec();
        sorted.sort_by(|a, b| self.compare(a, b));
        sorted.truncate(limit);
        sorted
    }
}

/// 外部コンテンツストアが所有する読み取り専用のコンテンツ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    /// 記事なら公開日時、投稿なら作成日時。
    pub created_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    pub is_hidden: bool,
}

/// 直近ウィンドウ内のエンゲージメント集計。実行ごとに再計算され、永続化されない。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementWindow {
    pub recent_likes: u64,
    pub recent_comments: u64,
    pub total_comments: u64,
}

/// エンジンが所有するスコア行。`(content_id, content_type)` ごとに高々1行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingScore {
    pub content_id: String,
    pub content_type: ContentType,
    pub hot_score: f64,
    pub trending_score: f64,
    pub velocity_score: f64,
    pub engagement_score: f64,
    pub recency_score: f64,
    pub quality_score: f64,
    pub calculated_at: DateTime<Utc>,
}

impl TrendingScore {
    #[must_use]
    pub fn key(&self) -> (ContentType, &str) {
        (self.content_type, self.content_id.as_str())
    }
}

/// ランキング参照の結果。スコアに最小限のメタデータを結合したもの。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedContent {
    #[serde(flatten)]
    pub score: TrendingScore,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 1回のバッチ実行の結果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scope: ContentScope,
    pub calculated_at: DateTime<Utc>,
    pub processed_count: usize,
    pub skipped_count: usize,
    pub pruned_count: u64,
    pub top_trending: Vec<TrendingScore>,
    pub top_hot: Vec<TrendingScore>,
    pub message: String,
}
