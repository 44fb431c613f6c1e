/// スコア計算と上位抽出の性能ベンチマーク。
use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use trending_worker::ranking::{
    ContentItem, ContentType, EngagementWindow, ScoreKind, TrendingScore, score_item,
};

fn synthetic_items(count: usize) -> Vec<(ContentItem, EngagementWindow)> {
    let now = Utc.with_ymd_and_hms(2025, 11, 8, 12, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let i = i as u64;
            let content_type = if i % 3 == 0 {
                ContentType::CommunityPost
            } else {
                ContentType::NewsArticle
            };
            let item = ContentItem {
                id: format!("content-{i}"),
                content_type,
                title: None,
                created_at: now - Duration::minutes((i * 37 % 10_080) as i64),
                view_count: i * 13 % 5_000,
                like_count: i * 7 % 400,
                is_hidden: false,
            };
            let window = EngagementWindow {
                recent_likes: i % 50,
                recent_comments: i % 11,
                total_comments: i % 90,
            };
            (item, window)
        })
        .collect()
}

fn bench_score_items(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2025, 11, 8, 12, 0, 0).unwrap();
    let items = synthetic_items(10_000);
    c.bench_function("score_items_10k", |b| {
        b.iter(|| {
            let scores: Vec<TrendingScore> = items
                .iter()
                .map(|(item, window)| score_item(item, window, now))
                .collect();
            black_box(scores.len());
        });
    });
}

fn bench_top_n(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2025, 11, 8, 12, 0, 0).unwrap();
    let scores: Vec<TrendingScore> = synthetic_items(10_000)
        .iter()
        .map(|(item, window)| score_item(item, window, now))
        .collect();
    c.bench_function("top_10_of_10k", |b| {
        b.iter(|| {
            let top = ScoreKind::Trending.top(&scores, 10);
            black_box(top.len());
        });
    });
}

criterion_group!(benches, bench_score_items, bench_top_n);
criterion_main!(benches);
