use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::content::tables_for;
use crate::ranking::{ContentScope, ContentType, RankedContent, ScoreKind, TrendingScore};

pub(crate) struct ScoreQueries;

impl ScoreQueries {
    /// UNNEST でまとめて upsert する。既存行は全列上書き。
    pub(crate) async fn upsert_scores(pool: &PgPool, records: &[TrendingScore]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let content_ids: Vec<String> = records.iter().map(|r| r.content_id.clone()).collect();
        let content_types: Vec<String> = records
            .iter()
            .map(|r| r.content_type.as_str().to_string())
            .collect();
        let hot: Vec<f64> = records.iter().map(|r| r.hot_score).collect();
        let trending: Vec<f64> = records.iter().map(|r| r.trending_score).collect();
        let velocity: Vec<f64> = records.iter().map(|r| r.velocity_score).collect();
        let engagement: Vec<f64> = records.iter().map(|r| r.engagement_score).collect();
        let recency: Vec<f64> = records.iter().map(|r| r.recency_score).collect();
        let quality: Vec<f64> = records.iter().map(|r| r.quality_score).collect();
        let calculated_at: Vec<DateTime<Utc>> = records.iter().map(|r| r.calculated_at).collect();

        let result = sqlx::query(
            r"
            INSERT INTO trending_scores
                (content_id, content_type, hot_score, trending_score, velocity_score,
                 engagement_score, recency_score, quality_score, calculated_at)
            SELECT content_id, content_type, hot_score, trending_score, velocity_score,
                   engagement_score, recency_score, quality_score, calculated_at
            FROM UNNEST($1::text[], $2::text[], $3::float8[], $4::float8[], $5::float8[],
                        $6::float8[], $7::float8[], $8::float8[], $9::timestamptz[])
                AS t(content_id, content_type, hot_score, trending_score, velocity_score,
                     engagement_score, recency_score, quality_score, calculated_at)
            ON CONFLICT (content_id, content_type) DO UPDATE SET
                hot_score = EXCLUDED.hot_score,
                trending_score = EXCLUDED.trending_score,
                velocity_score = EXCLUDED.velocity_score,
                engagement_score = EXCLUDED.engagement_score,
                recency_score = EXCLUDED.recency_score,
                quality_score = EXCLUDED.quality_score,
                calculated_at = EXCLUDED.calculated_at
            ",
        )
        .bind(&content_ids)
        .bind(&content_types)
        .bind(&hot)
        .bind(&trending)
        .bind(&velocity)
        .bind(&engagement)
        .bind(&recency)
        .bind(&quality)
        .bind(&calculated_at)
        .execute(pool)
        .await
        .context("failed to batch upsert trending_scores")?;

        Ok(result.rows_affected())
    }

    pub(crate) async fn prune_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM trending_scores WHERE calculated_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await
            .context("failed to prune trending_scores")?;

        Ok(result.rows_affected())
    }

    /// スコアとコンテンツのメタデータを結合して上位を返す。
    pub(crate) async fn top_n(
        pool: &PgPool,
        scope: ContentScope,
        kind: ScoreKind,
        limit: usize,
    ) -> Result<Vec<RankedContent>> {
        let metadata = scope
            .content_types()
            .iter()
            .map(|content_type| {
                let tables = tables_for(*content_type);
                format!(
                    "SELECT id::text AS content_id, '{label}'::text AS content_type, title, {ts} AS created_at FROM {content}",
                    label = content_type.as_str(),
                    ts = tables.timestamp,
                    content = tables.content,
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ALL ");
        let (primary, secondary) = match kind {
            ScoreKind::Hot => ("hot_score", "trending_score"),
            ScoreKind::Trending => ("trending_score", "hot_score"),
        };
        let sql = format!(
            r"
            SELECT s.content_id, s.content_type, s.hot_score, s.trending_score, s.velocity_score,
                   s.engagement_score, s.recency_score, s.quality_score, s.calculated_at,
                   c.title, c.created_at AS content_created_at
            FROM trending_scores s
            JOIN ({metadata}) c
              ON c.content_id = s.content_id AND c.content_type = s.content_type
            ORDER BY s.{primary} DESC, s.{secondary} DESC, s.content_id ASC
            LIMIT $1
            "
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(pool)
            .await
            .context("failed to fetch ranked trending_scores")?;

        let mut ranked = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_type: String = row.try_get("content_type")?;
            let content_type = ContentType::parse(&raw_type)
                .ok_or_else(|| anyhow!("unknown content_type in trending_scores: {raw_type}"))?;
            ranked.push(RankedContent {
                score: TrendingScore {
                    content_id: row.try_get("content_id")?,
                    content_type,
                    hot_score: row.try_get("hot_score")?,
                    trending_score: row.try_get("trending_score")?,
                    velocity_score: row.try_get("velocity_score")?,
                    engagement_score: row.try_get("engagement_score")?,
                    recency_score: row.try_get("recency_score")?,
                    quality_score: row.try_get("quality_score")?,
                    calculated_at: row.try_get("calculated_at")?,
                },
                title: row.try_get("title")?,
                created_at: row.try_get("content_created_at")?,
            });
        }

        Ok(ranked)
    }
}
