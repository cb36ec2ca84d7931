//! # Incremental Activity Sync
//!
//! Keeps per-(username, repository) activity totals current by fetching only
//! what changed since the last stored watermark.
//!
//! * [`filter`] selects a user's items inside a time bound.
//! * [`engine`] decides between cached, incremental and full syncs and owns
//!   the ordering of fetch, persistence and the watermark write.
//! * [`locks`] serializes calls for the same pair within the process.

pub mod clock;
pub mod engine;
pub mod filter;
pub mod locks;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use engine::{SyncEngine, SyncPlan};
pub use filter::{Bound, FilteredActivity, filter_activity, retain_unseen};
pub use locks::KeyedLocks;
pub use types::{ActivityTotals, Markers, SyncKey, SyncMode, SyncOutcome};
