use std::time::Duration;

use chrono::Utc;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::ranking::ContentScope;
use crate::scheduler::{
    IntervalCadence, JobContext, RunTrigger, Scheduler, SchedulerError,
};

/// 一定間隔でランキング実行を起動するデーモンを生成する。
///
/// `shutdown` がキャンセルされると待機中でもループを抜ける。
pub fn spawn_interval_daemon(
    scheduler: Scheduler,
    cadence: IntervalCadence,
    scope: ContentScope,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    IntervalDaemon {
        scheduler,
        cadence,
        scope,
        shutdown,
    }
    .spawn()
}

struct IntervalDaemon {
    scheduler: Scheduler,
    cadence: IntervalCadence,
    scope: ContentScope,
    shutdown: CancellationToken,
}

impl IntervalDaemon {
    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        loop {
            let now = Utc::now();
            let next = self.cadence.next_run_from(now);
            let wait = duration_until(next, now);
            info!(
                next_run_utc = %next.to_rfc3339(),
                wait_seconds = wait.as_secs(),
                scope = self.scope.as_str(),
                "scheduled ranking run"
            );

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("interval daemon stopping");
                    return;
                }
                () = sleep(wait) => {}
            }

            let context = JobContext::new(self.scope, RunTrigger::Scheduled);
            let run_id = context.run_id;
            match self.scheduler.run_job(context).await {
                Ok(summary) => info!(
                    %run_id,
                    processed = summary.processed_count,
                    "scheduled ranking run completed"
                ),
                Err(SchedulerError::Busy) => {
                    warn!(%run_id, "skipping scheduled run because a run is already active");
                }
                Err(err) => error!(%run_id, error = %err, "scheduled ranking run failed"),
            }

            // 境界ちょうどに終わった場合に同じ境界で再実行しないよう 1 秒進める
            tokio::select! {
                () = self.shutdown.cancelled() => return,
                () = sleep(Duration::from_secs(1)) => {}
            }
        }
    }
}

fn duration_until(next: chrono::DateTime<Utc>, now: chrono::DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_targets_wait_zero() {
        let now = Utc::now();
        assert_eq!(duration_until(now - chrono::Duration::seconds(5), now), Duration::ZERO);
        assert_eq!(
            duration_until(now + chrono::Duration::seconds(5), now),
            Duration::from_secs(5)
        );
    }
}
