//! Saving a `FileState` for later operations, and restoring it.
//!
//! Only the filename and the annotations survive; paths, transform outputs
//! and errors are ephemeral. A restored state is outer-joined against the
//! versions configured *now*: persisted ids that are no longer configured are
//! dropped, new ids start empty.

mod restore;
mod save;
mod types;

pub use restore::restore;
pub use save::save;
pub use types::{AssignKeys, PersistError, Persisted, PersistedFile, RestoreInput, SaveFormat};
