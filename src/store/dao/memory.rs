//! In-memory DAO used by tests and local dry runs.
//!
//! Holds content, engagement events and the score table in process memory and
//! supports fault injection (failing/slow/corrupt signal chunks, unreachable
//! store) so orchestrator failure paths can be exercised without Postgres.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ranking::{ContentItem, ContentScope, ContentType, RankedContent, ScoreKind, TrendingScore};
use crate::store::dao::traits::{ScoreStore, SignalSource};
use crate::store::models::EngagementCounts;

type Key = (ContentType, String);

#[derive(Debug, Clone)]
struct EngagementEvent {
    content_type: ContentType,
    content_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    contents: BTreeMap<Key, ContentItem>,
    likes: Vec<EngagementEvent>,
    comments: Vec<EngagementEvent>,
    scores: BTreeMap<Key, TrendingScore>,
}

#[derive(Debug, Default)]
struct Faults {
    candidates: HashSet<ContentType>,
    engagement: HashSet<String>,
    delays: HashMap<String, Duration>,
    overrides: HashMap<String, EngagementCounts>,
    omitted: HashSet<String>,
    store: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryTrendingDao {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    engagement_calls: AtomicUsize,
}

impl InMemoryTrendingDao {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_content(&self, item: ContentItem) {
        self.state()
            .contents
            .insert((item.content_type, item.id.clone()), item);
    }

    pub fn remove_content(&self, content_type: ContentType, content_id: &str) {
        self.state()
            .contents
            .remove(&(content_type, content_id.to_string()));
    }

    pub fn record_like(&self, content_type: ContentType, content_id: &str, at: DateTime<Utc>) {
        self.state().likes.push(EngagementEvent {
            content_type,
            content_id: content_id.to_string(),
            created_at: at,
        });
    }

    pub fn record_comment(&self, content_type: ContentType, content_id: &str, at: DateTime<Utc>) {
        self.state().comments.push(EngagementEvent {
            content_type,
            content_id: content_id.to_string(),
            created_at: at,
        });
    }

    /// Candidate enumeration for `content_type` fails.
    pub fn fail_candidates_for(&self, content_type: ContentType) {
        self.faults().candidates.insert(content_type);
    }

    /// Any engagement chunk containing `content_id` fails.
    pub fn fail_engagement_for(&self, content_id: &str) {
        self.faults().engagement.insert(content_id.to_string());
    }

    /// Any engagement chunk containing `content_id` is delayed by `delay`.
    pub fn delay_engagement_for(&self, content_id: &str, delay: Duration) {
        self.faults().delays.insert(content_id.to_string(), delay);
    }

    /// Engagement answer for `content_id` is replaced with `counts`.
    pub fn override_engagement(&self, content_id: &str, counts: EngagementCounts) {
        self.faults()
            .overrides
            .insert(content_id.to_string(), counts);
    }

    /// Engagement answer leaves `content_id` out.
    pub fn omit_engagement_for(&self, content_id: &str) {
        self.faults().omitted.insert(content_id.to_string());
    }

    /// Every score-store operation fails.
    pub fn fail_store(&self) {
        self.faults().store = true;
    }

    /// Number of `fetch_engagement` calls served so far.
    #[must_use]
    pub fn engagement_calls(&self) -> usize {
        self.engagement_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn scores(&self) -> Vec<TrendingScore> {
        self.state().scores.values().cloned().collect()
    }

    #[must_use]
    pub fn score(&self, content_type: ContentType, content_id: &str) -> Option<TrendingScore> {
        self.state()
            .scores
            .get(&(content_type, content_id.to_string()))
            .cloned()
    }

    fn ensure_store_available(&self) -> Result<()> {
        if self.faults().store {
            bail!("score store is unavailable");
        }
        Ok(())
    }
}

fn count_events(
    events: &[EngagementEvent],
    content_type: ContentType,
    content_id: &str,
    since: Option<DateTime<Utc>>,
) -> i64 {
    let count = events
        .iter()
        .filter(|e| e.content_type == content_type && e.content_id == content_id)
        .filter(|e| since.is_none_or(|since| e.created_at >= since))
        .count();
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[async_trait]
impl SignalSource for InMemoryTrendingDao {
    async fn fetch_candidates(
        &self,
        content_type: ContentType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>> {
        if self.faults().candidates.contains(&content_type) {
            bail!("candidate query for {content_type} failed");
        }

        let mut items: Vec<ContentItem> = self
            .state()
            .contents
            .values()
            .filter(|item| item.content_type == content_type)
            .filter(|item| !item.is_hidden && item.created_at >= since)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn fetch_engagement(
        &self,
        content_type: ContentType,
        content_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, EngagementCounts>> {
        self.engagement_calls.fetch_add(1, Ordering::SeqCst);

        let (delay, failing) = {
            let faults = self.faults();
            let delay = content_ids
                .iter()
                .filter_map(|id| faults.delays.get(id).copied())
                .max();
            let failing = content_ids.iter().find(|id| faults.engagement.contains(*id)).cloned();
            (delay, failing)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(id) = failing {
            bail!("engagement aggregate failed for chunk containing {id}");
        }

        let mut counts: HashMap<String, EngagementCounts> = {
            let state = self.state();
            content_ids
                .iter()
                .map(|id| {
                    let counts = EngagementCounts {
                        recent_likes: count_events(&state.likes, content_type, id, Some(since)),
                        recent_comments: count_events(&state.comments, content_type, id, Some(since)),
                        total_comments: count_events(&state.comments, content_type, id, None),
                    };
                    (id.clone(), counts)
                })
                .collect()
        };

        let faults = self.faults();
        for (id, override_counts) in &faults.overrides {
            if let Some(entry) = counts.get_mut(id) {
                *entry = *override_counts;
            }
        }
        counts.retain(|id, _| !faults.omitted.contains(id));
        Ok(counts)
    }
}

#[async_trait]
impl ScoreStore for InMemoryTrendingDao {
    async fn ping(&self) -> Result<()> {
        self.ensure_store_available()
    }

    async fn upsert_scores(&self, records: &[TrendingScore]) -> Result<u64> {
        self.ensure_store_available()?;
        let mut state = self.state();
        for record in records {
            state
                .scores
                .insert((record.content_type, record.content_id.clone()), record.clone());
        }
        Ok(records.len() as u64)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.ensure_store_available()?;
        let mut state = self.state();
        let before = state.scores.len();
        state.scores.retain(|_, score| score.calculated_at >= cutoff);
        Ok((before - state.scores.len()) as u64)
    }

    async fn top_n(
        &self,
        scope: ContentScope,
        kind: ScoreKind,
        limit: usize,
    ) -> Result<Vec<RankedContent>> {
        self.ensure_store_available()?;
        let state = self.state();
        let mut scores: Vec<&TrendingScore> = state
            .scores
            .values()
            .filter(|score| scope.includes(score.content_type))
            .collect();
        scores.sort_by(|a, b| kind.compare(a, b));

        Ok(scores
            .into_iter()
            .filter_map(|score| {
                state
                    .contents
                    .get(&(score.content_type, score.content_id.clone()))
                    .map(|content| RankedContent {
                        score: score.clone(),
                        title: content.title.clone(),
                        created_at: content.created_at,
                    })
            })
            .take(limit)
            .collect())
    }
}
