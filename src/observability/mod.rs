pub mod metrics;
pub(crate) mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;
use crate::config::Config;

/// Telemetry（メトリクスとトレーシング）を管理する構造体。
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// 新しいTelemetryインスタンスを作成し、トレーシングとメトリクスを初期化する。
    ///
    /// OTLP の送信先とサンプリング比率は検証済みの [`Config`] から受け取る。
    ///
    /// # Errors
    /// トレーシングの初期化やメトリクス登録に失敗した場合はエラーを返す。
    pub fn new(config: &Config) -> Result<Self> {
        tracing::init(config.otel_exporter_endpoint(), config.otel_sampling_ratio())?;
        Self::metrics_only()
    }

    /// トレーシングには触れず、メトリクスだけを初期化する。
    ///
    /// # Errors
    /// メトリクス登録に失敗した場合はエラーを返す。
    pub fn metrics_only() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);
        Ok(Self { registry, metrics })
    }

    /// メトリクスへのアクセスを提供する。
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[must_use]
    pub fn metrics_arc(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// 準備完了プローブを記録する。
    pub fn record_ready_probe(&self) {
        ::tracing::debug!("service ready probe recorded");
    }

    /// ライブプローブを記録する。
    pub fn record_live_probe(&self) {
        ::tracing::debug!("service live probe");
    }

    /// 手動実行の呼び出しを記録する。
    pub fn record_manual_run_invocation(&self) {
        ::tracing::info!("manual ranking run invoked");
    }

    /// Prometheusメトリクスをレンダリングする。
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metrics() {
        let telemetry = Telemetry::metrics_only().expect("telemetry");
        telemetry.metrics().runs_completed.inc();
        let body = telemetry.render_prometheus();
        assert!(body.contains("trending_runs_completed_total 1"));
    }
}
