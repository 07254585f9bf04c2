use std::time::Duration;

use tokio::time::Instant;

/// A cached value and the moment it was fetched.
///
/// An entry past its TTL is no longer served as fresh but stays around as
/// the fallback until a fetch succeeds and replaces it.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn freshness_is_strictly_less_than_ttl() {
        let ttl = Duration::from_secs(60);
        let entry = CacheEntry::new(7u32);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(entry.is_fresh(ttl));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!entry.is_fresh(ttl));
        assert_eq!(entry.value, 7);
    }
}
