//! # Lifecycle checkpoints.
//!
//! ```text
//! write:  BeforeConvert ──► [encode] ──► BeforeSave ──► [store write] ──► AfterSave
//! read:   [store read] ──► AfterLoad ──► [decode] ──► AfterConvert
//! ```
//!
//! `AfterLoad` and `AfterConvert` are *observational*: they can be switched off
//! globally with [`Config::observe_reads`](crate::Config::observe_reads) to bound
//! overhead on large result sets. The write phases always run.

use std::fmt;

/// Named checkpoint in the conversion/persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Entity about to be converted into a document.
    BeforeConvert,
    /// Entity and its document about to be written.
    BeforeSave,
    /// Write acknowledged by the store.
    AfterSave,
    /// Raw document read from the store, before conversion.
    AfterLoad,
    /// Document converted into an entity.
    AfterConvert,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Phase; 5] = [
        Phase::BeforeConvert,
        Phase::BeforeSave,
        Phase::AfterSave,
        Phase::AfterLoad,
        Phase::AfterConvert,
    ];

    /// Dense index (`0..5`) for per-phase tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Phase::BeforeConvert => 0,
            Phase::BeforeSave => 1,
            Phase::AfterSave => 2,
            Phase::AfterLoad => 3,
            Phase::AfterConvert => 4,
        }
    }

    /// Single-bit mask, used by listener filters.
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << self.index()
    }

    /// Read-side phases that can be disabled by configuration.
    #[inline]
    pub fn is_observational(self) -> bool {
        matches!(self, Phase::AfterLoad | Phase::AfterConvert)
    }

    #[inline]
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Phase::BeforeConvert | Phase::BeforeSave | Phase::AfterSave
        )
    }

    #[inline]
    pub fn is_read(self) -> bool {
        !self.is_write()
    }

    /// The snapshot must carry an entity at this phase.
    #[inline]
    pub fn requires_entity(self) -> bool {
        !matches!(self, Phase::AfterLoad)
    }

    /// The snapshot must carry a document at this phase.
    #[inline]
    pub fn requires_document(self) -> bool {
        !matches!(self, Phase::BeforeConvert)
    }

    /// Next checkpoint of the same operation, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::BeforeConvert => Some(Phase::BeforeSave),
            Phase::BeforeSave => Some(Phase::AfterSave),
            Phase::AfterLoad => Some(Phase::AfterConvert),
            Phase::AfterSave | Phase::AfterConvert => None,
        }
    }

    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::BeforeConvert => "before_convert",
            Phase::BeforeSave => "before_save",
            Phase::AfterSave => "after_save",
            Phase::AfterLoad => "after_load",
            Phase::AfterConvert => "after_convert",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
