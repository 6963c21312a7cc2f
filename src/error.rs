//! Error types used by the pipeline, its callbacks, and the persistence driver.
//!
//! - [`RegistryError`]: rejected registrations and type declarations (setup time).
//! - [`BuildError`]: why [`LifecycleBuilder::build`](crate::LifecycleBuilder::build) failed.
//! - [`ExecutorError`]: no async runtime could drive the work.
//! - [`CallbackError`]: failures raised by a single callback or listener.
//! - [`ChainError`]: why an invocation chain aborted.
//! - [`PublishError`]: aggregated listener failures from the event bus.
//! - [`OperationError`]: failures of a [`Template`](crate::Template) operation.
//!
//! Every enum provides `as_label` (stable snake_case) for logs/metrics.

use std::fmt;

use thiserror::Error;

use crate::core::Phase;
use crate::entity::EntityType;

/// # Errors raised while building the registry or the type hierarchy.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same callback identity is already bound to this phase.
    #[error("callback {callback:?} is already registered for {phase}")]
    DuplicateBinding {
        /// Phase of the rejected registration.
        phase: Phase,
        /// Callback identity (name).
        callback: String,
    },

    /// A type declaration would make callback specificity ambiguous.
    #[error("ambiguous declaration {entity_type} -> {supertype}: {reason}")]
    ResolutionAmbiguity {
        /// Concrete entity type being declared.
        entity_type: EntityType,
        /// Supertype that could not be ranked.
        supertype: EntityType,
        /// Short explanation.
        reason: &'static str,
    },

    /// The callback is typed for a bound that the registration bound does not imply.
    #[error("callback {callback:?} is typed for {declared} but registered under {registered}")]
    BoundMismatch {
        /// Callback identity (name).
        callback: String,
        /// Bound the callback's typed view requires.
        declared: EntityType,
        /// Bound given at registration.
        registered: EntityType,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use hookvisor::{Phase, RegistryError};
    ///
    /// let err = RegistryError::DuplicateBinding { phase: Phase::BeforeSave, callback: "audit".into() };
    /// assert_eq!(err.as_label(), "registry_duplicate_binding");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::DuplicateBinding { .. } => "registry_duplicate_binding",
            RegistryError::ResolutionAmbiguity { .. } => "registry_resolution_ambiguity",
            RegistryError::BoundMismatch { .. } => "registry_bound_mismatch",
        }
    }
}

/// No tokio runtime could be found or started to drive pipeline work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("executor: {0}")]
pub struct ExecutorError(pub String);

impl ExecutorError {
    pub fn as_label(&self) -> &'static str {
        "executor_unavailable"
    }
}

/// # Errors returned from [`LifecycleBuilder::build`](crate::LifecycleBuilder::build).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A registration or type declaration was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Fire-and-forget delivery needs a runtime to spawn listener workers on.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl BuildError {
    /// Returns the label of the underlying error.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::Registry(e) => e.as_label(),
            BuildError::Executor(e) => e.as_label(),
        }
    }
}

/// # Errors raised by a callback body or event listener.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback refused the entity (e.g. validation).
    #[error("vetoed: {reason}")]
    Vetoed {
        /// Why the entity was rejected.
        reason: String,
    },

    /// The callback failed while doing its work.
    #[error("failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The entity could not be viewed as the callback's bound.
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        /// Type the callback is bound to.
        expected: EntityType,
        /// Concrete type in the snapshot.
        actual: EntityType,
    },

    /// The snapshot carries no entity at this phase.
    #[error("no entity in snapshot at {phase}")]
    MissingEntity {
        /// Phase being run.
        phase: Phase,
    },

    /// The callback panicked; the panic was caught.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl CallbackError {
    /// Shorthand for [`CallbackError::Vetoed`].
    pub fn veto(reason: impl Into<String>) -> Self {
        CallbackError::Vetoed {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CallbackError::Fail`].
    pub fn fail(error: impl fmt::Display) -> Self {
        CallbackError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CallbackError::Vetoed { .. } => "callback_vetoed",
            CallbackError::Fail { .. } => "callback_failed",
            CallbackError::TypeMismatch { .. } => "callback_type_mismatch",
            CallbackError::MissingEntity { .. } => "callback_missing_entity",
            CallbackError::Panicked { .. } => "callback_panicked",
        }
    }

    /// Returns true when the entity was deliberately rejected.
    pub fn is_veto(&self) -> bool {
        matches!(self, CallbackError::Vetoed { .. })
    }
}

/// # Reasons an invocation chain aborts.
///
/// The chain never swallows a callback error and never rolls back callbacks that
/// already completed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A callback failed; no later callback ran.
    #[error("callback {callback:?} failed at {phase}: {cause}")]
    CallbackFailure {
        /// Phase being run.
        phase: Phase,
        /// Identity of the failing callback.
        callback: String,
        /// What the callback reported.
        #[source]
        cause: CallbackError,
    },

    /// The chain was cancelled before all callbacks started.
    #[error("chain cancelled at {phase} after {completed} callback(s)")]
    Cancelled {
        /// Phase being run.
        phase: Phase,
        /// Number of callbacks that completed before cancellation.
        completed: usize,
    },

    /// The snapshot does not have the shape the phase requires.
    #[error("snapshot at {phase} has no {missing}")]
    MalformedSnapshot {
        /// Phase being run.
        phase: Phase,
        /// `"entity"` or `"document"`.
        missing: &'static str,
    },

    /// The blocking strategy could not drive the chain.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl ChainError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use hookvisor::{ChainError, Phase};
    ///
    /// let err = ChainError::Cancelled { phase: Phase::AfterSave, completed: 2 };
    /// assert_eq!(err.as_label(), "chain_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ChainError::CallbackFailure { .. } => "chain_callback_failure",
            ChainError::Cancelled { .. } => "chain_cancelled",
            ChainError::MalformedSnapshot { .. } => "chain_malformed_snapshot",
            ChainError::Executor(_) => "chain_executor_unavailable",
        }
    }

    /// Phase the chain was running, when it got far enough to run one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ChainError::CallbackFailure { phase, .. }
            | ChainError::Cancelled { phase, .. }
            | ChainError::MalformedSnapshot { phase, .. } => Some(*phase),
            ChainError::Executor(_) => None,
        }
    }

    /// Identity of the failing callback, if a callback failed.
    pub fn callback(&self) -> Option<&str> {
        match self {
            ChainError::CallbackFailure { callback, .. } => Some(callback),
            _ => None,
        }
    }
}

/// One listener failure collected by the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Listener name.
    pub listener: &'static str,
    /// Phase of the event being delivered.
    pub phase: Phase,
    /// What the listener reported.
    pub error: CallbackError,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener {:?} failed at {}: {}",
            self.listener, self.phase, self.error
        )
    }
}

/// # Errors returned from [`EventBus::publish`](crate::EventBus::publish).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// One or more listeners failed; all matching listeners still ran.
    #[error("{} listener(s) failed: {}", failures.len(), join(failures))]
    Listeners {
        /// Failures in delivery order.
        failures: Vec<ListenerFailure>,
    },

    /// The blocking strategy could not drive delivery; no listener ran.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Listeners { .. } => "publish_listener_failures",
            PublishError::Executor(_) => "publish_executor_unavailable",
        }
    }

    pub fn failures(&self) -> &[ListenerFailure] {
        match self {
            PublishError::Listeners { failures } => failures,
            PublishError::Executor(_) => &[],
        }
    }
}

fn join(failures: &[ListenerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Document codec failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("codec: {0}")]
pub struct CodecError(pub String);

/// Store driver failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("store: {0}")]
pub struct StoreError(pub String);

/// # Errors produced by a [`Template`](crate::Template) operation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OperationError {
    /// A lifecycle chain aborted; the operation did not complete.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Entity/document conversion failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The store rejected the read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The converted entity is not of the requested type.
    #[error("expected {expected}, found {actual}")]
    UnexpectedType {
        /// Requested type.
        expected: EntityType,
        /// Type found in the snapshot.
        actual: EntityType,
    },
}

impl OperationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationError::Chain(e) => e.as_label(),
            OperationError::Codec(_) => "operation_codec",
            OperationError::Store(_) => "operation_store",
            OperationError::UnexpectedType { .. } => "operation_unexpected_type",
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_error_accessors() {
        let err = ChainError::CallbackFailure {
            phase: Phase::BeforeSave,
            callback: "validate".into(),
            cause: CallbackError::veto("name is empty"),
        };
        assert_eq!(err.phase(), Some(Phase::BeforeSave));
        assert_eq!(err.callback(), Some("validate"));
        assert_eq!(
            err.to_string(),
            "callback \"validate\" failed at before_save: vetoed: name is empty"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_publish_error_message_lists_failures() {
        let err = PublishError::Listeners {
            failures: vec![
                ListenerFailure {
                    listener: "a",
                    phase: Phase::AfterLoad,
                    error: CallbackError::fail("x"),
                },
                ListenerFailure {
                    listener: "b",
                    phase: Phase::AfterLoad,
                    error: CallbackError::fail("y"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 listener(s) failed"));
        assert!(msg.contains("\"a\"") && msg.contains("\"b\""));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_operation_error_label_delegates_to_chain() {
        let err: OperationError = ChainError::Cancelled {
            phase: Phase::AfterSave,
            completed: 0,
        }
        .into();
        assert_eq!(err.as_label(), "chain_cancelled");
    }

    #[test]
    fn test_build_error_label_delegates() {
        let err: BuildError = ExecutorError("no runtime".into()).into();
        assert_eq!(err.as_label(), "executor_unavailable");
        assert_eq!(err.to_string(), "executor: no runtime");

        let err: BuildError = RegistryError::DuplicateBinding {
            phase: Phase::BeforeSave,
            callback: "audit".into(),
        }
        .into();
        assert_eq!(err.as_label(), "registry_duplicate_binding");

        let err: ChainError = ExecutorError("no runtime".into()).into();
        assert_eq!(err.phase(), None);
        assert_eq!(err.as_label(), "chain_executor_unavailable");
    }

    #[test]
    fn test_panic_message() {
        let p: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }
}
