//! Batch orchestrator for one ranking run.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    observability::metrics::Metrics,
    store::{
        dao::{ScoreStore, SignalSource},
        models::EngagementCounts,
    },
    util::time::Clock,
};

use super::calculator::score_item;
use super::error::{InvalidSignal, RankingError, SignalError};
use super::types::{
    ContentItem, ContentScope, ContentType, EngagementWindow, RunSummary, ScoreKind,
    TrendingScore,
};

/// 実行パラメータ。
#[derive(Debug, Clone, PartialEq)]
pub struct RankingSettings {
    /// 候補とするコンテンツの作成/公開からの期間
    pub candidate_window: chrono::Duration,
    /// hot スコア用の直近エンゲージメント集計期間
    pub engagement_window: chrono::Duration,
    /// これより古い `calculated_at` の行は実行開始時に削除される
    pub retention: chrono::Duration,
    pub signal_batch_size: NonZeroUsize,
    pub signal_concurrency: NonZeroUsize,
    pub signal_timeout: Duration,
    pub upsert_batch_size: NonZeroUsize,
    pub summary_top_n: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            candidate_window: chrono::Duration::days(7),
            engagement_window: chrono::Duration::hours(24),
            retention: chrono::Duration::hours(24),
            signal_batch_size: NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN),
            signal_concurrency: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            signal_timeout: Duration::from_secs(10),
            upsert_batch_size: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
            summary_top_n: 10,
        }
    }
}

impl From<&Config> for RankingSettings {
    fn from(config: &Config) -> Self {
        Self {
            candidate_window: config.candidate_window(),
            engagement_window: config.engagement_window(),
            retention: config.retention(),
            signal_batch_size: config.signal_batch_size(),
            signal_concurrency: config.signal_concurrency(),
            signal_timeout: config.signal_timeout(),
            upsert_batch_size: config.upsert_batch_size(),
            summary_top_n: 10,
        }
    }
}

/// Result of scoring one content type.
#[derive(Debug, Default)]
struct ScoredBatch {
    records: Vec<TrendingScore>,
    candidates: usize,
    skipped: usize,
}

struct ChunkOutcome {
    items: Vec<ContentItem>,
    result: Result<HashMap<String, EngagementCounts>, SignalError>,
}

/// シグナル取得 → スコア計算 → 永続化を1回分実行するオーケストレーター。
pub struct RankingOrchestrator {
    settings: RankingSettings,
    source: Arc<dyn SignalSource>,
    store: Arc<dyn ScoreStore>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
}

impl RankingOrchestrator {
    #[must_use]
    pub fn new(
        settings: RankingSettings,
        source: Arc<dyn SignalSource>,
        store: Arc<dyn ScoreStore>,
        metrics: Arc<Metrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            source,
            store,
            metrics,
            clock,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    /// スコープ内の全コンテンツ種別についてスコアを計算し、保存する。
    ///
    /// 1. `now - retention` より古い行を削除
    /// 2. 種別ごとに候補を取得し、チャンク単位でエンゲージメントを集計
    /// 3. スコア計算
    /// 4. チャンク単位で upsert
    ///
    /// シグナル取得の失敗はそのチャンク（またはアイテム）をスキップするだけで、
    /// 実行は継続する。候補取得・削除・upsert の失敗とキャンセルは致命的。
    ///
    /// # Errors
    /// 上記の致命的な失敗で [`RankingError`] を返す。
    pub async fn run(
        &self,
        run_id: Uuid,
        scope: ContentScope,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RankingError> {
        let now = self.clock.now();
        ensure_active(cancel)?;

        let cutoff = window_start(now, self.settings.retention);
        let pruned = self
            .store
            .prune_older_than(cutoff)
            .await
            .map_err(RankingError::Prune)?;
        self.metrics.scores_pruned.inc_by(as_metric(pruned));
        debug!(%run_id, pruned, cutoff = %cutoff.to_rfc3339(), "pruned stale trending scores");

        let mut records = Vec::new();
        let mut candidates = 0;
        let mut skipped = 0;
        for &content_type in scope.content_types() {
            ensure_active(cancel)?;
            let batch = self
                .score_content_type(run_id, content_type, now, cancel)
                .await?;
            info!(
                %run_id,
                content_type = %content_type,
                candidates = batch.candidates,
                scored = batch.records.len(),
                skipped = batch.skipped,
                "scored content type"
            );
            candidates += batch.candidates;
            skipped += batch.skipped;
            records.extend(batch.records);
        }
        self.metrics.last_run_candidates.set(as_metric(candidates));

        let written = self.persist(&records, cancel).await?;
        self.metrics.scores_upserted.inc_by(as_metric(written));

        let processed = records.len();
        let top_n = self.settings.summary_top_n;
        Ok(RunSummary {
            run_id,
            scope,
            calculated_at: now,
            processed_count: processed,
            skipped_count: skipped,
            pruned_count: pruned,
            top_trending: ScoreKind::Trending.top(&records, top_n),
            top_hot: ScoreKind::Hot.top(&records, top_n),
            message: format!(
                "Calculated trending scores for {processed} items ({skipped} skipped)"
            ),
        })
    }

    async fn score_content_type(
        &self,
        run_id: Uuid,
        content_type: ContentType,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ScoredBatch, RankingError> {
        let since = window_start(now, self.settings.candidate_window);
        let fetched = self
            .source
            .fetch_candidates(content_type, since)
            .await
            .map_err(|source| RankingError::CandidateFetch {
                content_type,
                source,
            })?;

        let fetched_count = fetched.len();
        let candidates: Vec<ContentItem> = fetched
            .into_iter()
            .filter(|item| !item.is_hidden && item.created_at >= since)
            .collect();
        if candidates.len() < fetched_count {
            debug!(
                %run_id,
                content_type = %content_type,
                dropped = fetched_count - candidates.len(),
                "dropped hidden or out-of-window candidates"
            );
        }

        let mut batch = ScoredBatch {
            candidates: candidates.len(),
            ..ScoredBatch::default()
        };
        if candidates.is_empty() {
            return Ok(batch);
        }

        let engagement_since = window_start(now, self.settings.engagement_window);
        let chunks: Vec<Vec<ContentItem>> = candidates
            .chunks(self.settings.signal_batch_size.get())
            .map(<[ContentItem]>::to_vec)
            .collect();
        let mut outcomes = futures::stream::iter(chunks)
            .map(|items| self.fetch_chunk(content_type, engagement_since, items))
            .buffer_unordered(self.settings.signal_concurrency.get());

        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RankingError::Cancelled),
                next = outcomes.next() => match next {
                    Some(outcome) => outcome,
                    None => break,
                },
            };
            self.absorb_chunk(run_id, content_type, now, outcome, &mut batch);
        }

        Ok(batch)
    }

    async fn fetch_chunk(
        &self,
        content_type: ContentType,
        since: DateTime<Utc>,
        items: Vec<ContentItem>,
    ) -> ChunkOutcome {
        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let timeout = self.settings.signal_timeout;
        let timer = self.metrics.signal_fetch_duration.start_timer();
        let result = match tokio::time::timeout(
            timeout,
            self.source.fetch_engagement(content_type, &ids, since),
        )
        .await
        {
            Ok(Ok(counts)) => Ok(counts),
            Ok(Err(error)) => Err(SignalError::Source(error)),
            Err(_) => Err(SignalError::Timeout(timeout)),
        };
        timer.observe_duration();
        ChunkOutcome { items, result }
    }

    fn absorb_chunk(
        &self,
        run_id: Uuid,
        content_type: ContentType,
        now: DateTime<Utc>,
        outcome: ChunkOutcome,
        batch: &mut ScoredBatch,
    ) {
        let mut counts = match outcome.result {
            Ok(counts) => counts,
            Err(error) => {
                warn!(
                    %run_id,
                    content_type = %content_type,
                    items = outcome.items.len(),
                    error = %error,
                    "skipping items whose engagement signals could not be fetched"
                );
                self.metrics.signal_chunks_failed.inc();
                self.metrics.items_skipped.inc_by(as_metric(outcome.items.len()));
                batch.skipped += outcome.items.len();
                return;
            }
        };

        for item in outcome.items {
            let window = counts
                .remove(&item.id)
                .ok_or(InvalidSignal::Missing)
                .and_then(EngagementWindow::try_from);
            match window {
                Ok(window) => {
                    batch.records.push(score_item(&item, &window, now));
                    self.metrics.items_scored.inc();
                }
                Err(error) => {
                    warn!(
                        %run_id,
                        content_type = %content_type,
                        content_id = %item.id,
                        error = %error,
                        "skipping item with invalid engagement signals"
                    );
                    self.metrics.items_skipped.inc();
                    batch.skipped += 1;
                }
            }
        }
    }

    /// チャンクごとに upsert する。チャンク間のトランザクションは張らない。
    async fn persist(
        &self,
        records: &[TrendingScore],
        cancel: &CancellationToken,
    ) -> Result<u64, RankingError> {
        let mut written = 0;
        for chunk in records.chunks(self.settings.upsert_batch_size.get()) {
            ensure_active(cancel)?;
            written += self
                .store
                .upsert_scores(chunk)
                .await
                .map_err(RankingError::Upsert)?;
        }
        Ok(written)
    }
}

/// `now - window`。表現できない過去に達する場合は最小時刻で打ち止める。
fn window_start(now: DateTime<Utc>, window: chrono::Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), RankingError> {
    if cancel.is_cancelled() {
        Err(RankingError::Cancelled)
    } else {
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_metric<T: TryInto<u64>>(value: T) -> f64 {
    value.try_into().map_or(f64::MAX, |v: u64| v as f64)
}
