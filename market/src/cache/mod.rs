mod detail;
mod entry;
mod snapshot;

pub use detail::{DetailCache, DetailCacheConfig};
pub use entry::CacheEntry;
pub use snapshot::{Snapshot, SnapshotCache, SnapshotCacheConfig};
