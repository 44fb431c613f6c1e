use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::ranking::{ContentItem, ContentType};
use crate::store::models::EngagementCounts;

/// コンテンツ種別ごとのプラットフォーム側テーブル配置。
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContentTables {
    pub(crate) content: &'static str,
    /// 記事は `published_at`、投稿は `created_at`
    pub(crate) timestamp: &'static str,
    pub(crate) likes: &'static str,
    pub(crate) comments: &'static str,
    pub(crate) foreign_key: &'static str,
    pub(crate) id_type: &'static str,
}

const NEWS_TABLES: ContentTables = ContentTables {
    content: "news_articles",
    timestamp: "published_at",
    likes: "news_likes",
    comments: "news_comments",
    foreign_key: "news_id",
    id_type: "uuid",
};

const COMMUNITY_TABLES: ContentTables = ContentTables {
    content: "community_posts",
    timestamp: "created_at",
    likes: "post_likes",
    comments: "post_comments",
    foreign_key: "post_id",
    id_type: "uuid",
};

pub(crate) fn tables_for(content_type: ContentType) -> &'static ContentTables {
    match content_type {
        ContentType::NewsArticle => &NEWS_TABLES,
        ContentType::CommunityPost => &COMMUNITY_TABLES,
    }
}

pub(crate) struct ContentQueries;

impl ContentQueries {
    /// ウィンドウ内の非表示でないコンテンツを取得する。
    pub(crate) async fn fetch_candidates(
        pool: &PgPool,
        content_type: ContentType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>> {
        let tables = tables_for(content_type);
        let sql = format!(
            r"
            SELECT id::text AS id,
                   title,
                   {ts} AS created_at,
                   COALESCE(view_count, 0)::bigint AS view_count,
                   COALESCE(like_count, 0)::bigint AS like_count
            FROM {content}
            WHERE COALESCE(is_hidden, FALSE) = FALSE
              AND {ts} >= $1
            ORDER BY {ts} DESC
            ",
            ts = tables.timestamp,
            content = tables.content,
        );

        let rows = sqlx::query(&sql)
            .bind(since)
            .fetch_all(pool)
            .await
            .with_context(|| format!("failed to fetch {content_type} candidates"))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let view_count: i64 = row.try_get("view_count")?;
            let like_count: i64 = row.try_get("like_count")?;
            items.push(ContentItem {
                id: row.try_get("id")?,
                content_type,
                title: row.try_get("title")?,
                created_at: row.try_get("created_at")?,
                // カウンタは単調増加の非負値。壊れた値は 0 として扱う
                view_count: u64::try_from(view_count).unwrap_or(0),
                like_count: u64::try_from(like_count).unwrap_or(0),
                is_hidden: false,
            });
        }

        Ok(items)
    }

    /// Aggregates recent likes, recent comments and total comments for a
    /// chunk of ids in a single round trip.
    pub(crate) async fn fetch_engagement(
        pool: &PgPool,
        content_type: ContentType,
        content_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, EngagementCounts>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let tables = tables_for(content_type);
        let sql = format!(
            r"
            SELECT ids.content_id,
                   (SELECT COUNT(*) FROM {likes} l
                     WHERE l.{fk} = ids.content_id::{id_type} AND l.created_at >= $2) AS recent_likes,
                   (SELECT COUNT(*) FROM {comments} c
                     WHERE c.{fk} = ids.content_id::{id_type} AND c.created_at >= $2) AS recent_comments,
                   (SELECT COUNT(*) FROM {comments} c
                     WHERE c.{fk} = ids.content_id::{id_type}) AS total_comments
            FROM UNNEST($1::text[]) AS ids(content_id)
            ",
            likes = tables.likes,
            comments = tables.comments,
            fk = tables.foreign_key,
            id_type = tables.id_type,
        );

        let rows = sqlx::query(&sql)
            .bind(content_ids)
            .bind(since)
            .fetch_all(pool)
            .await
            .with_context(|| format!("failed to aggregate {content_type} engagement"))?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let content_id: String = row.try_get("content_id")?;
            counts.insert(
                content_id,
                EngagementCounts {
                    recent_likes: row.try_get("recent_likes")?,
                    recent_comments: row.try_get("recent_comments")?,
                    total_comments: row.try_get("total_comments")?,
                },
            );
        }

        Ok(counts)
    }
}
