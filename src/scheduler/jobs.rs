use std::sync::Arc;
use std::time::Duration;

use prometheus::HistogramTimer;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    observability::metrics::Metrics,
    ranking::{ContentScope, RankingError, RankingOrchestrator, RunSummary},
};

/// 実行のきっかけ。ログとメトリクスのラベルに使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

impl RunTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunTrigger::Manual => "manual",
            RunTrigger::Scheduled => "scheduled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobContext {
    pub run_id: Uuid,
    pub scope: ContentScope,
    pub trigger: RunTrigger,
}

impl JobContext {
    #[must_use]
    pub fn new(scope: ContentScope, trigger: RunTrigger) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            scope,
            trigger,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a ranking run is already in progress")]
    Busy,
    #[error("ranking run exceeded its deadline of {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Run(#[from] RankingError),
}

/// 実行中ゲージと所要時間を保持する。`run_job` の future が途中で破棄されても
/// `Drop` でゲージを戻し、中断された実行として記録する。
struct RunGuard {
    metrics: Arc<Metrics>,
    run_id: Uuid,
    token: CancellationToken,
    timer: Option<HistogramTimer>,
    finished: bool,
}

impl RunGuard {
    fn start(metrics: Arc<Metrics>, run_id: Uuid, token: CancellationToken) -> Self {
        metrics.active_runs.inc();
        let timer = metrics.run_duration.start_timer();
        Self {
            metrics,
            run_id,
            token,
            timer: Some(timer),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(timer) = self.timer.take() {
            timer.observe_duration();
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.metrics.active_runs.dec();
        if !self.finished {
            self.token.cancel();
            if let Some(timer) = self.timer.take() {
                timer.observe_duration();
            }
            self.metrics.runs_failed.inc();
            tracing::warn!(run_id = %self.run_id, "ranking job aborted before completion");
        }
    }
}

/// 同時に高々1つのランキング実行を許可するスケジューラ。
#[derive(Clone)]
pub struct Scheduler {
    orchestrator: Arc<RankingOrchestrator>,
    run_lock: Arc<Mutex<()>>,
    run_timeout: Duration,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        orchestrator: Arc<RankingOrchestrator>,
        run_timeout: Duration,
        shutdown: CancellationToken,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            orchestrator,
            run_lock: Arc::new(Mutex::new(())),
            run_timeout,
            shutdown,
            metrics,
        }
    }

    /// 1回分のランキング実行。別の実行が進行中なら即座に [`SchedulerError::Busy`]。
    ///
    /// # Errors
    /// 実行中の重複、期限切れ、または実行自体の致命的エラー。
    pub async fn run_job(&self, context: JobContext) -> Result<RunSummary, SchedulerError> {
        let Ok(_lock) = self.run_lock.try_lock() else {
            self.metrics.runs_rejected.inc();
            tracing::warn!(
                run_id = %context.run_id,
                trigger = context.trigger.as_str(),
                "rejecting ranking run because another run is active"
            );
            return Err(SchedulerError::Busy);
        };

        tracing::info!(
            run_id = %context.run_id,
            scope = context.scope.as_str(),
            trigger = context.trigger.as_str(),
            "running ranking job"
        );

        let token = self.shutdown.child_token();
        let mut guard = RunGuard::start(Arc::clone(&self.metrics), context.run_id, token.clone());
        let outcome = tokio::time::timeout(
            self.run_timeout,
            self.orchestrator.run(context.run_id, context.scope, &token),
        )
        .await;
        guard.finish();

        let result = match outcome {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(error)) => Err(SchedulerError::Run(error)),
            Err(_) => {
                token.cancel();
                Err(SchedulerError::TimedOut(self.run_timeout))
            }
        };

        match &result {
            Ok(summary) => {
                self.metrics.runs_completed.inc();
                tracing::info!(
                    run_id = %context.run_id,
                    processed = summary.processed_count,
                    skipped = summary.skipped_count,
                    pruned = summary.pruned_count,
                    "ranking job completed"
                );
            }
            Err(error) => {
                self.metrics.runs_failed.inc();
                tracing::error!(run_id = %context.run_id, error = %error, "ranking job failed");
            }
        }
        result
    }

    /// Whether a run currently holds the lock.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{ContentItem, ContentType, RankingSettings};
    use crate::store::dao::{InMemoryTrendingDao, ScoreStore, SignalSource};
    use crate::util::time::FixedClock;
    use chrono::{TimeZone, Utc};

    fn scheduler_with(dao: &Arc<InMemoryTrendingDao>, run_timeout: Duration) -> Scheduler {
        let metrics = Metrics::unregistered();
        let orchestrator = RankingOrchestrator::new(
            RankingSettings::default(),
            Arc::clone(dao) as Arc<dyn SignalSource>,
            Arc::clone(dao) as Arc<dyn ScoreStore>,
            Arc::clone(&metrics),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 11, 8, 12, 0, 0).unwrap())),
        );
        Scheduler::new(
            Arc::new(orchestrator),
            run_timeout,
            CancellationToken::new(),
            metrics,
        )
    }

    fn seed(dao: &InMemoryTrendingDao, id: &str) {
        dao.insert_content(ContentItem {
            id: id.to_string(),
            content_type: ContentType::NewsArticle,
            title: Some(id.to_string()),
            created_at: Utc.with_ymd_and_hms(2025, 11, 8, 10, 0, 0).unwrap(),
            view_count: 100,
            like_count: 10,
            is_hidden: false,
        });
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected_as_busy() {
        let dao = Arc::new(InMemoryTrendingDao::new());
        seed(&dao, "slow");
        dao.delay_engagement_for("slow", Duration::from_millis(200));
        let scheduler = scheduler_with(&dao, Duration::from_secs(5));

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler
                    .run_job(JobContext::new(ContentScope::All, RunTrigger::Manual))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = scheduler
            .run_job(JobContext::new(ContentScope::All, RunTrigger::Manual))
            .await;
        assert!(matches!(second, Err(SchedulerError::Busy)));

        let first = first.await.expect("join");
        assert_eq!(first.expect("first run succeeds").processed_count, 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn run_exceeding_deadline_times_out() {
        let dao = Arc::new(InMemoryTrendingDao::new());
        seed(&dao, "stuck");
        dao.delay_engagement_for("stuck", Duration::from_secs(2));
        let scheduler = scheduler_with(&dao, Duration::from_millis(100));

        let result = scheduler
            .run_job(JobContext::new(ContentScope::News, RunTrigger::Scheduled))
            .await;

        assert!(matches!(result, Err(SchedulerError::TimedOut(_))));
        assert!(dao.scores().is_empty());
    }

    #[tokio::test]
    async fn fatal_run_error_is_wrapped() {
        let dao = Arc::new(InMemoryTrendingDao::new());
        dao.fail_store();
        let scheduler = scheduler_with(&dao, Duration::from_secs(5));

        let result = scheduler
            .run_job(JobContext::new(ContentScope::All, RunTrigger::Manual))
            .await;

        assert!(matches!(
            result,
            Err(SchedulerError::Run(RankingError::Prune(_)))
        ));
    }

    #[tokio::test]
    async fn dropped_run_releases_active_gauge_and_counts_failure() {
        let dao = Arc::new(InMemoryTrendingDao::new());
        seed(&dao, "slow");
        dao.delay_engagement_for("slow", Duration::from_millis(500));
        let scheduler = scheduler_with(&dao, Duration::from_secs(5));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            scheduler.run_job(JobContext::new(ContentScope::All, RunTrigger::Manual)),
        )
        .await;

        assert!(abandoned.is_err());
        assert!(scheduler.metrics.active_runs.get().abs() < f64::EPSILON);
        assert!((scheduler.metrics.runs_failed.get() - 1.0).abs() < f64::EPSILON);
        assert!(scheduler.metrics.runs_completed.get().abs() < f64::EPSILON);
        assert!(!scheduler.is_running());
        assert!(dao.scores().is_empty());
    }

    #[tokio::test]
    async fn completed_run_leaves_gauge_at_zero() {
        let dao = Arc::new(InMemoryTrendingDao::new());
        seed(&dao, "quick");
        let scheduler = scheduler_with(&dao, Duration::from_secs(5));

        scheduler
            .run_job(JobContext::new(ContentScope::All, RunTrigger::Manual))
            .await
            .expect("run succeeds");

        assert!(scheduler.metrics.active_runs.get().abs() < f64::EPSILON);
        assert!((scheduler.metrics.runs_completed.get() - 1.0).abs() < f64::EPSILON);
        assert!(scheduler.metrics.runs_failed.get().abs() < f64::EPSILON);
    }
}
