//! # Simple logging listener for debugging and demos.
//!
//! [`LogWriter`] writes every lifecycle event through `tracing::info!`.
//!
//! ## Output format
//! ```text
//! INFO hookvisor: [before_save] collection=users entity=app::User id=Some(String("u-1")) seq=3
//! INFO hookvisor: [after_load] collection=users entity=app::User id=Some(String("u-1")) seq=7
//! ```
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use hookvisor::{Config, Lifecycle, LogWriter};
//! let lifecycle = Lifecycle::builder(Config::default())
//!     .with_listener(Arc::new(LogWriter))
//!     .build()
//!     .unwrap();
//! ```

use async_trait::async_trait;
use tracing::info;

use crate::error::CallbackError;
use crate::events::LifecycleEvent;
use crate::listeners::Listen;

/// Logging listener.
///
/// Enabled via the `logging` feature. Not intended for production use; implement
/// a custom [`Listen`] for audit trails or metrics.
pub struct LogWriter;

#[async_trait]
impl Listen for LogWriter {
    async fn on_event(&self, e: &LifecycleEvent) -> Result<(), CallbackError> {
        info!(
            target: "hookvisor",
            "[{}] collection={} entity={} id={:?} seq={}",
            e.phase,
            e.collection,
            e.entity_type,
            e.document_id(),
            e.seq
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
