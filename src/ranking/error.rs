use std::time::Duration;

use thiserror::Error;

use super::types::ContentType;

/// 実行全体を中断させる致命的なエラー。
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("failed to prune stale trending scores")]
    Prune(#[source] anyhow::Error),
    #[error("failed to fetch {content_type} candidates")]
    CandidateFetch {
        content_type: ContentType,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to upsert trending scores")]
    Upsert(#[source] anyhow::Error),
    #[error("ranking run was cancelled")]
    Cancelled,
}

/// シグナル取得の失敗。該当チャンクのアイテムだけをスキップする。
#[derive(Debug, Error)]
pub(crate) enum SignalError {
    #[error("engagement fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("engagement fetch failed: {0:#}")]
    Source(anyhow::Error),
}

/// Per-item signal problems.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSignal {
    #[error("engagement signals missing from adapter response")]
    Missing,
    #[error("negative {field} count: {value}")]
    Negative { field: &'static str, value: i64 },
}
