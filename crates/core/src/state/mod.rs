//! State carried through a single orchestrator call.
//!
//! A [`FileState`] is created fresh for every operation (store, delete,
//! retrieve, url, regenerate). It owns one [`VersionState`] per configured
//! version and accumulates per-version [`StageError`]s. Successfully produced
//! version data is never discarded because a sibling version failed.

mod error;
mod file;
mod source;
mod version;

pub use error::{Stage, StageError};
pub use file::FileState;
pub use source::Source;
pub use version::{Assigns, VersionId, VersionState};
