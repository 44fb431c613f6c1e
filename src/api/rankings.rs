use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    app::AppState,
    ranking::{ContentScope, RankedContent, ScoreKind},
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RankingQuery {
    scope: Option<String>,
    kind: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RankingResponse {
    scope: ContentScope,
    kind: ScoreKind,
    items: Vec<RankedContent>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, PartialEq, Eq)]
struct ValidatedQuery {
    scope: ContentScope,
    kind: ScoreKind,
    limit: usize,
}

fn validate(query: RankingQuery) -> Result<ValidatedQuery, String> {
    let scope = match query.scope.as_deref() {
        None => ContentScope::default(),
        Some(raw) => ContentScope::parse(raw).ok_or_else(|| format!("unknown scope: {raw}"))?,
    };
    let kind = match query.kind.as_deref() {
        None => ScoreKind::default(),
        Some(raw) => ScoreKind::parse(raw).ok_or_else(|| format!("unknown kind: {raw}"))?,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(ValidatedQuery {
        scope,
        kind,
        limit: usize::try_from(limit).unwrap_or(1),
    })
}

/// 保存済みスコアから上位 N 件を返す。
pub(crate) async fn list(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Response {
    let query = match validate(query) {
        Ok(query) => query,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response();
        }
    };

    match state
        .store()
        .top_n(query.scope, query.kind, query.limit)
        .await
    {
        Ok(items) => Json(RankingResponse {
            scope: query.scope,
            kind: query.kind,
            items,
        })
        .into_response(),
        Err(err) => {
            error!(error = %format!("{err:#}"), "failed to load rankings");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to load rankings".to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn query(scope: Option<&str>, kind: Option<&str>, limit: Option<i64>) -> RankingQuery {
        RankingQuery {
            scope: scope.map(str::to_string),
            kind: kind.map(str::to_string),
            limit,
        }
    }

    #[test]
    fn defaults_to_all_trending_twenty() {
        let validated = validate(RankingQuery::default()).unwrap();
        assert_eq!(
            validated,
            ValidatedQuery {
                scope: ContentScope::All,
                kind: ScoreKind::Trending,
                limit: 20,
            }
        );
    }

    #[rstest]
    #[case(Some(0), 1)]
    #[case(Some(-5), 1)]
    #[case(Some(42), 42)]
    #[case(Some(1_000), 100)]
    fn limit_is_clamped(#[case] limit: Option<i64>, #[case] expected: usize) {
        let validated = validate(query(None, Some("hot"), limit)).unwrap();
        assert_eq!(validated.limit, expected);
        assert_eq!(validated.kind, ScoreKind::Hot);
    }

    #[rstest]
    #[case(Some("videos"), None)]
    #[case(None, Some("coldest"))]
    fn unknown_values_are_rejected(#[case] scope: Option<&str>, #[case] kind: Option<&str>) {
        assert!(validate(query(scope, kind, None)).is_err());
    }
}
