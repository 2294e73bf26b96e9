//! The host's scripting runtime, seen from the consumer loop.
//!
//! Only the call boundary is modelled. A production implementation wraps
//! the host's own object model; tests use an in-memory project.

use std::path::Path;

use thiserror::Error;

/// Opaque handle to a project item (folder or footage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u64);

#[derive(Debug, Error)]
pub enum HostError {
    #[error("script error: {0}")]
    Script(String),

    #[error("import of {path} failed: {message}")]
    Import { path: String, message: String },

    #[error("no active composition or timeline")]
    NoActiveSession,

    #[error("invalid queue entry: {0}")]
    InvalidEntry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait HostRuntime {
    /// The active document reports a non-empty user selection
    fn has_active_selection(&self) -> bool;

    /// There is an active timeline/composition to append to
    fn has_active_timeline(&self) -> bool;

    fn begin_undo_group(&mut self, name: &str);
    fn end_undo_group(&mut self);

    /// Look up an organizational folder by name
    fn find_bin(&self, name: &str) -> Option<ItemId>;
    fn create_bin(&mut self, name: &str) -> Result<ItemId, HostError>;

    /// Footage previously imported from `path`, if any
    fn find_media(&self, path: &Path) -> Option<ItemId>;
    fn import_media(&mut self, path: &Path, bin: ItemId) -> Result<ItemId, HostError>;

    fn append_to_timeline(&mut self, media: ItemId) -> Result<(), HostError>;

    /// Evaluate raw scripting source in the host
    fn eval_script(&mut self, code: &str) -> Result<(), HostError>;
}
