//! Application layer - ingestion use cases
//!
//! Channel runs, the link-health sweep, the image cleanup sweep and the
//! operator reports, all driven through an [`IngestContext`].

pub mod context;
pub mod errors;
pub mod image_cleanup;
pub mod images;
pub mod link_health;
pub mod normalizer;
pub mod pipeline;
pub mod reconciler;
pub mod registry;
pub mod reports;

// Re-export commonly used items
pub use context::IngestContext;
pub use errors::{IngestError, IngestResult};
pub use image_cleanup::{CleanupSummary, ImageCleanup};
pub use images::ImageMirror;
pub use link_health::{HealthSweepSummary, HealthVerdict, LinkHealthChecker};
pub use normalizer::{NormalizeError, normalize};
pub use pipeline::{ChannelRunSummary, ChannelRunner};
pub use reconciler::{CatalogReconciler, ReconcileOutcome};
pub use registry::AdapterRegistry;
