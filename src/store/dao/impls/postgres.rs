//! Postgres DAO implementation
//!
//! A single pool-backed type implementing both the signal source and the
//! score store; each trait method delegates to the query helpers.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::ranking::{ContentItem, ContentScope, ContentType, RankedContent, ScoreKind, TrendingScore};
use crate::store::dao::content::ContentQueries;
use crate::store::dao::scores::ScoreQueries;
use crate::store::dao::traits::{ScoreStore, SignalSource};
use crate::store::models::EngagementCounts;

#[derive(Debug, Clone)]
pub struct PgTrendingDao {
    pool: PgPool,
}

impl PgTrendingDao {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SignalSource for PgTrendingDao {
    async fn fetch_candidates(
        &self,
        content_type: ContentType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>> {
        ContentQueries::fetch_candidates(&self.pool, content_type, since).await
    }

    async fn fetch_engagement(
        &self,
        content_type: ContentType,
        content_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, EngagementCounts>> {
        ContentQueries::fetch_engagement(&self.pool, content_type, content_ids, since).await
    }
}

#[async_trait]
impl ScoreStore for PgTrendingDao {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("trending database is unreachable")?;
        Ok(())
    }

    async fn upsert_scores(&self, records: &[TrendingScore]) -> Result<u64> {
        ScoreQueries::upsert_scores(&self.pool, records).await
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        ScoreQueries::prune_older_than(&self.pool, cutoff).await
    }

    async fn top_n(
        &self,
        scope: ContentScope,
        kind: ScoreKind,
        limit: usize,
    ) -> Result<Vec<RankedContent>> {
        ScoreQueries::top_n(&self.pool, scope, kind, limit).await
    }
}
