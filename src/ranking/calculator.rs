//! Hot / trending score formulas.
//!
//! Everything here is pure: `now` is passed in, nothing reads the clock or
//! touches I/O, so identical inputs always yield identical scores.
#![allow(clippy::cast_precision_loss)]

use chrono::{DateTime, Utc};

use super::types::{ContentItem, ContentType, EngagementWindow, TrendingScore};

const HOT_LIKE_WEIGHT: f64 = 5.0;
const HOT_COMMENT_WEIGHT: f64 = 10.0;
const HOT_AGE_OFFSET_HOURS: f64 = 2.0;
const HOT_GRAVITY: f64 = 1.8;

const ENGAGEMENT_LIKE_WEIGHT: f64 = 3.0;
const ENGAGEMENT_COMMENT_WEIGHT: f64 = 5.0;
const ENGAGEMENT_VIEW_WEIGHT: f64 = 0.1;

const TRENDING_ENGAGEMENT_WEIGHT: f64 = 0.4;
const TRENDING_VELOCITY_WEIGHT: f64 = 0.3;
const TRENDING_RECENCY_WEIGHT: f64 = 0.2;
const TRENDING_QUALITY_WEIGHT: f64 = 0.1;

const QUALITY_BASE_NEWS: f64 = 80.0;
const QUALITY_BASE_COMMUNITY: f64 = 70.0;
const QUALITY_FALLBACK_MULTIPLIER: f64 = 0.5;
const QUALITY_MULTIPLIER_CAP: f64 = 1.5;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// トレンドスコアの内訳。すべて小数第2位で丸め済み。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendingBreakdown {
    pub engagement_score: f64,
    pub velocity_score: f64,
    pub recency_score: f64,
    pub quality_score: f64,
    pub trending_score: f64,
}

/// Elapsed hours between `created_at` and `now`, fractional and unclamped.
/// Negative when the content timestamp is ahead of `now`.
#[must_use]
pub fn hours_since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Rounds to 2 decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 短期的な勢いを表す hot スコア。
///
/// 経過時間は 1 時間で下限を取り、作成直後のコンテンツで値が発散しないようにする。
#[must_use]
pub fn compute_hot_score(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    recent_likes: u64,
    recent_comments: u64,
) -> f64 {
    let hours = hours_since(created_at, now).max(1.0);
    let raw = recent_likes as f64 * HOT_LIKE_WEIGHT + recent_comments as f64 * HOT_COMMENT_WEIGHT;
    round2(raw / (hours + HOT_AGE_OFFSET_HOURS).powf(HOT_GRAVITY))
}

/// Piecewise linear recency decay over a 7 day horizon.
#[must_use]
pub fn recency_score(hours_ago: f64) -> f64 {
    if hours_ago <= 2.0 {
        100.0
    } else if hours_ago <= 24.0 {
        100.0 - (hours_ago - 2.0) * 2.0
    } else if hours_ago <= 168.0 {
        56.0 - (hours_ago - 24.0) * 0.3
    } else {
        10.0
    }
}

/// いいね率に基づく品質スコア。閲覧数 0 のときは除算せずフォールバック倍率を使う。
#[must_use]
pub fn quality_score(content_type: ContentType, like_count: u64, view_count: u64) -> f64 {
    let base = match content_type {
        ContentType::NewsArticle => QUALITY_BASE_NEWS,
        ContentType::CommunityPost => QUALITY_BASE_COMMUNITY,
    };
    let multiplier = if like_count > 0 && view_count > 0 {
        (like_count as f64 / view_count as f64) * 10.0
    } else {
        QUALITY_FALLBACK_MULTIPLIER
    };
    base * multiplier.min(QUALITY_MULTIPLIER_CAP)
}

/// エンゲージメント・速度・新しさ・品質を 40/30/20/10 で合成したトレンドスコア。
///
/// `velocity_score` は hot スコアと違い経過時間に下限を設けない。公開直後の
/// コンテンツでは非常に大きな値になり得る。
#[must_use]
pub fn compute_trending_score(
    item: &ContentItem,
    comment_count: u64,
    now: DateTime<Utc>,
) -> TrendingBreakdown {
    let hours = hours_since(item.created_at, now);

    let engagement = item.like_count as f64 * ENGAGEMENT_LIKE_WEIGHT
        + comment_count as f64 * ENGAGEMENT_COMMENT_WEIGHT
        + item.view_count as f64 * ENGAGEMENT_VIEW_WEIGHT;
    let velocity = if hours > 0.0 {
        engagement / hours
    } else {
        engagement
    };
    let recency = recency_score(hours);
    let quality = quality_score(item.content_type, item.like_count, item.view_count);

    let trending = engagement * TRENDING_ENGAGEMENT_WEIGHT
        + velocity * TRENDING_VELOCITY_WEIGHT
        + recency * TRENDING_RECENCY_WEIGHT
        + quality * TRENDING_QUALITY_WEIGHT;

    TrendingBreakdown {
        engagement_score: round2(engagement),
        velocity_score: round2(velocity),
        recency_score: round2(recency),
        quality_score: round2(quality),
        trending_score: round2(trending),
    }
}

/// 1件分のスコア行を組み立てる。
#[must_use]
pub fn score_item(
    item: &ContentItem,
    engagement: &EngagementWindow,
    now: DateTime<Utc>,
) -> TrendingScore {
    let hot_score = compute_hot_score(
        item.created_at,
        now,
        engagement.recent_likes,
        engagement.recent_comments,
    );
    let breakdown = compute_trending_score(item, engagement.total_comments, now);

    TrendingScore {
        content_id: item.id.clone(),
        content_type: item.content_type,
        hot_score,
        trending_score: breakdown.trending_score,
        velocity_score: breakdown.velocity_score,
        engagement_score: breakdown.engagement_score,
        recency_score: breakdown.recency_score,
        quality_score: breakdown.quality_score,
        calculated_at: now,
    }
}
