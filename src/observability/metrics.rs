/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, HistogramOpts, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub runs_completed: Counter,
    pub runs_failed: Counter,
    pub runs_rejected: Counter,
    pub items_scored: Counter,
    pub items_skipped: Counter,
    pub scores_upserted: Counter,
    pub scores_pruned: Counter,
    pub signal_chunks_failed: Counter,

    // ヒストグラム
    pub run_duration: Histogram,
    pub signal_fetch_duration: Histogram,

    // ゲージ
    pub active_runs: Gauge,
    pub last_run_candidates: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名メトリクスが既に登録済みの場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            runs_completed: register_counter_with_registry!(
                "trending_runs_completed_total",
                "Total number of ranking runs completed",
                registry
            )?,
            runs_failed: register_counter_with_registry!(
                "trending_runs_failed_total",
                "Total number of ranking runs that failed fatally",
                registry
            )?,
            runs_rejected: register_counter_with_registry!(
                "trending_runs_rejected_total",
                "Run requests rejected because another run was active",
                registry
            )?,
            items_scored: register_counter_with_registry!(
                "trending_items_scored_total",
                "Total number of content items scored",
                registry
            )?,
            items_skipped: register_counter_with_registry!(
                "trending_items_skipped_total",
                "Content items skipped because their signals could not be fetched",
                registry
            )?,
            scores_upserted: register_counter_with_registry!(
                "trending_scores_upserted_total",
                "Rows written to trending_scores",
                registry
            )?,
            scores_pruned: register_counter_with_registry!(
                "trending_scores_pruned_total",
                "Stale rows deleted from trending_scores",
                registry
            )?,
            signal_chunks_failed: register_counter_with_registry!(
                "trending_signal_chunks_failed_total",
                "Engagement aggregate chunks that failed or timed out",
                registry
            )?,
            run_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "trending_run_duration_seconds",
                    "Wall time of a ranking run"
                )
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
                registry
            )?,
            signal_fetch_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "trending_signal_fetch_duration_seconds",
                    "Latency of one engagement aggregate chunk"
                )
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
                registry
            )?,
            active_runs: register_gauge_with_registry!(
                "trending_active_runs",
                "Number of ranking runs in progress",
                registry
            )?,
            last_run_candidates: register_gauge_with_registry!(
                "trending_last_run_candidates",
                "Candidate items considered by the most recent run",
                registry
            )?,
        })
    }

    /// 独立したレジストリでメトリクスを作る。テストやツール用。
    ///
    /// # Panics
    /// 新規レジストリへの登録は衝突しないため、パニックしない想定。
    #[must_use]
    pub fn unregistered() -> Arc<Self> {
        let registry = Registry::new();
        Arc::new(Self::new(&registry).expect("fresh registry accepts all metrics"))
    }
}
