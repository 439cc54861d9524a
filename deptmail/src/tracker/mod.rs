//! Open-tracking counter service.
//!
//! Two handlers share an explicitly constructed [`TrackerState`]:
//! - `record_open`: atomically bumps the open counter and returns the pixel
//! - `get_open_count`: reads the counter without touching it
//!
//! ## Architecture
//!
//! ```text
//! Mail client → GET /open.png → record_open → CounterStore::increment + BlobStore::fetch
//! deptmail view-count → GET /count → get_open_count → CounterStore::get
//! ```
//!
//! Opens are counted in aggregate. Every fetch of the pixel counts, and the
//! endpoint is unauthenticated.

pub mod blob;
pub mod client;
pub mod handlers;
pub mod store;

pub use blob::{BlobStore, BuiltinPixelStore, DirBlobStore, TRANSPARENT_PIXEL_PNG};
pub use client::{endpoint_url, pixel_url, ClientError, TrackerClient, COUNT_PATH, OPEN_PATH};
pub use handlers::{get_open_count, health, record_open, router, TrackerResponse, TrackerState};
pub use store::{CounterStore, MemoryCounterStore, RedisCounterStore, StorageError};
