//! Host identity and filesystem access.
//!
//! - [`HostContext`] - invoking user, home directory, and privilege level,
//!   resolved once at start and read-only afterwards
//! - [`FileSystem`] - the filesystem operations steps are allowed to perform

pub mod context;
pub mod fs;

pub use context::{parse_passwd_entry, HostContext, PasswdEntry};
pub use fs::{DirOutcome, FileSystem, HostFileSystem};
