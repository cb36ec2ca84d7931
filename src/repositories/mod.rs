//! # Repository Layer
//!
//! SeaORM-backed persistence for watermarks and raw activity items. The sync
//! engine only sees the [`WatermarkStore`] and [`ActivitySink`] traits.

pub mod activity;
pub mod watermark;

pub use activity::{ActivityRepository, ActivitySink, StoredCounts};
pub use watermark::{Watermark, WatermarkRepository, WatermarkStore, WatermarkUpdate};
