use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use market::{MarketError, SnapshotCache, SnapshotCacheConfig};

use mock_feed::{MockFeed, asset};

fn cache_over(feed: &Arc<MockFeed>) -> SnapshotCache {
    SnapshotCache::new(feed.clone(), SnapshotCacheConfig::default())
}

#[tokio::test(start_paused = true)]
async fn reads_within_ttl_do_not_refetch() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
    let cache = cache_over(&feed);

    let first = cache.get_snapshot().await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(999))]));
    let second = cache.get_snapshot().await.unwrap();

    tokio::time::advance(Duration::from_secs(29)).await;
    let third = cache.get_snapshot().await.unwrap();

    assert_eq!(feed.snapshot_calls(), 1);
    assert_eq!(*first, *second);
    assert_eq!(*first, *third);
    assert_eq!(third[0].current_price, dec!(100));
}

#[tokio::test(start_paused = true)]
async fn expired_snapshot_is_refetched() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
    let cache = cache_over(&feed);

    cache.get_snapshot().await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(105))]));
    let refreshed = cache.get_snapshot().await.unwrap();

    assert_eq!(feed.snapshot_calls(), 2);
    assert_eq!(refreshed[0].current_price, dec!(105));
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_after_ttl_serves_previous_value() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100)), asset("ethereum", dec!(10))]));
    let cache = cache_over(&feed);

    let before = cache.get_snapshot().await.unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;
    feed.set_snapshot(Err(MarketError::UpstreamUnavailable("503".into())));
    let after = cache.get_snapshot().await.unwrap();

    assert_eq!(*before, *after);
    assert_eq!(feed.snapshot_calls(), 2);

    // The stale value does not become fresh: the next read tries again.
    cache.get_snapshot().await.unwrap();
    assert_eq!(feed.snapshot_calls(), 3);
}

#[tokio::test]
async fn cold_failure_propagates_upstream_error() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Err(MarketError::UpstreamUnavailable("connection refused".into())));
    let cache = cache_over(&feed);

    let err = cache.get_snapshot().await.unwrap_err();
    assert!(matches!(err, MarketError::UpstreamUnavailable(_)));
    assert!(cache.age().is_none());
}

#[tokio::test]
async fn cold_schema_failure_is_reported_as_schema_error() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Err(MarketError::InvalidUpstreamSchema("object".into())));
    let cache = cache_over(&feed);

    let err = cache.get_snapshot().await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidUpstreamSchema(_)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_refresh_issues_exactly_one_fetch() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
    feed.set_delay(Duration::from_millis(250));
    let cache = Arc::new(cache_over(&feed));

    let readers = (0..16).map(|_| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_snapshot().await })
    });

    let results = futures::future::join_all(readers).await;

    assert_eq!(feed.snapshot_calls(), 1);
    for r in results {
        assert_eq!(r.unwrap().unwrap()[0].asset_id, "bitcoin");
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_reads_at_expiry_issue_one_refetch() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
    let cache = Arc::new(cache_over(&feed));

    cache.get_snapshot().await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(105))]));
    feed.set_delay(Duration::from_millis(250));

    let readers = (0..16).map(|_| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_snapshot().await })
    });

    let results = futures::future::join_all(readers).await;

    assert_eq!(feed.snapshot_calls(), 2);
    for r in results {
        assert_eq!(r.unwrap().unwrap()[0].current_price, dec!(105));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallel_cold_reads_on_many_workers_fetch_once() {
    for _ in 0..200 {
        let feed = Arc::new(MockFeed::default());
        feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
        let cache = Arc::new(SnapshotCache::new(
            feed.clone(),
            SnapshotCacheConfig {
                ttl: Duration::from_secs(3600),
                fetch_timeout: Duration::from_secs(5),
            },
        ));
        let start = Arc::new(Barrier::new(8));

        let readers = (0..8).map(|_| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            tokio::spawn(async move {
                start.wait().await;
                cache.get_snapshot().await
            })
        });

        for r in futures::future::join_all(readers).await {
            assert!(r.unwrap().is_ok());
        }
        assert_eq!(feed.snapshot_calls(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallel_reads_after_expiry_refetch_once() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
    let cache = Arc::new(SnapshotCache::new(
        feed.clone(),
        SnapshotCacheConfig {
            ttl: Duration::from_millis(100),
            fetch_timeout: Duration::from_secs(5),
        },
    ));

    cache.get_snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    feed.set_delay(Duration::from_millis(50));

    let start = Arc::new(Barrier::new(8));
    let readers = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        let start = Arc::clone(&start);
        tokio::spawn(async move {
            start.wait().await;
            cache.get_snapshot().await
        })
    });

    for r in futures::future::join_all(readers).await {
        assert!(r.unwrap().is_ok());
    }
    assert_eq!(feed.snapshot_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_waiters_share_a_failed_refresh() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Err(MarketError::UpstreamUnavailable("502".into())));
    feed.set_delay(Duration::from_millis(250));
    let cache = Arc::new(cache_over(&feed));

    let readers = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_snapshot().await })
    });

    let results = futures::future::join_all(readers).await;

    assert_eq!(feed.snapshot_calls(), 1);
    for r in results {
        assert!(matches!(
            r.unwrap(),
            Err(MarketError::UpstreamUnavailable(_))
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_times_out_as_unavailable() {
    let feed = Arc::new(MockFeed::default());
    feed.set_snapshot(Ok(vec![asset("bitcoin", dec!(100))]));
    feed.set_delay(Duration::from_secs(30));
    let cache = SnapshotCache::new(
        feed.clone(),
        SnapshotCacheConfig {
            ttl: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
        },
    );

    let err = cache.get_snapshot().await.unwrap_err();
    assert!(matches!(err, MarketError::UpstreamUnavailable(_)));
}
