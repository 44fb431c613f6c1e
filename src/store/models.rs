use crate::ranking::{EngagementWindow, InvalidSignal};

/// シグナルソースから返る生の集計値（`COUNT(*)` は bigint）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementCounts {
    pub recent_likes: i64,
    pub recent_comments: i64,
    pub total_comments: i64,
}

impl EngagementCounts {
    #[must_use]
    pub fn new(recent_likes: i64, recent_comments: i64, total_comments: i64) -> Self {
        Self {
            recent_likes,
            recent_comments,
            total_comments,
        }
    }
}

impl TryFrom<EngagementCounts> for EngagementWindow {
    type Error = InvalidSignal;

    fn try_from(counts: EngagementCounts) -> Result<Self, Self::Error> {
        Ok(Self {
            recent_likes: non_negative("recent_likes", counts.recent_likes)?,
            recent_comments: non_negative("recent_comments", counts.recent_comments)?,
            total_comments: non_negative("total_comments", counts.total_comments)?,
        })
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, InvalidSignal> {
    u64::try_from(value).map_err(|_| InvalidSignal::Negative { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_non_negative_counts() {
        let window = EngagementWindow::try_from(EngagementCounts::new(3, 1, 9)).unwrap();
        assert_eq!(window.recent_likes, 3);
        assert_eq!(window.recent_comments, 1);
        assert_eq!(window.total_comments, 9);
    }

    #[test]
    fn rejects_negative_counts() {
        let err = EngagementWindow::try_from(EngagementCounts::new(1, -2, 0)).unwrap_err();
        assert_eq!(
            err,
            InvalidSignal::Negative {
                field: "recent_comments",
                value: -2
            }
        );
    }
}
