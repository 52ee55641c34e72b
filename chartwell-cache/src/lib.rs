//! CHARTWELL Cache - Response Caching
//!
//! Two composable layers plus a key builder:
//!
//! - [`LruCache`]: capacity-bounded, evicts the least recently touched entry.
//!   A read is a touch.
//! - [`TtlCache`]: wraps an `LruCache` and expires entries lazily on read
//!   once their age exceeds the per-entry time-to-live.
//! - [`fingerprint`]: deterministic cache key for an outbound request.
//!
//! Both caches take `&mut self`; callers that share one across tasks wrap it
//! in a mutex.

pub mod fingerprint;
pub mod lru;
pub mod stats;
pub mod ttl;

pub use fingerprint::{fingerprint, FingerprintInput};
pub use self::lru::LruCache;
pub use stats::CacheStats;
pub use ttl::{TtlCache, TtlEntry};
