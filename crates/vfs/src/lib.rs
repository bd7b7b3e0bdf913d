//! In-memory, version-tracked virtual filesystem shared by every agent in a
//! run. Paths are opaque keys; there is no directory tree to create, delete,
//! or watch — only the flat namespace of paths that have ever been written.

pub mod diff;
pub mod store;
pub mod types;

pub use diff::unified_line_diff;
pub use store::{Vfs, VfsChange};
pub use types::{FileVersion, VFSFile, VfsKind};
