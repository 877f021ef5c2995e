// Query cache module.
// Client-side request cache with de-duplicated fetches, key invalidation and garbage collection.

pub mod cache;
pub mod clock;
pub mod entry;
pub mod key;
pub mod subscription;

pub use cache::QueryCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{DEFAULT_GC_TIME, DEFAULT_STALE_TIME, QueryOptions, QuerySnapshot, QueryStatus};
pub use key::{KeyPart, QueryKey};
pub use subscription::Subscription;
