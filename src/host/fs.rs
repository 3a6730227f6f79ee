//! Filesystem accessor.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Outcome of an idempotent directory creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirOutcome {
    Created,
    AlreadyExisted,
}

/// Filesystem operations available to provisioning steps.
pub trait FileSystem {
    /// Create `path` and its parents. An existing directory is not an error.
    fn create_dir_all(&self, path: &Path) -> io::Result<DirOutcome>;

    /// Copy a file, overwriting the destination.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Write a file, replacing any previous content.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Add execute permission for owner, group, and others.
    fn set_executable(&self, path: &Path) -> io::Result<()>;

    /// Change ownership of `path` itself, never of a symlink's target.
    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs`.
///
/// An optional root re-anchors every absolute path, so a plan that
/// targets `/home/alice` can be exercised inside a scratch directory.
#[derive(Debug, Clone, Default)]
pub struct HostFileSystem {
    root: Option<PathBuf>,
}

impl HostFileSystem {
    /// Operate on the real filesystem.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Operate beneath `root`.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Map a logical path to the path actually touched.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            None => path.to_path_buf(),
            Some(root) => {
                let relative: PathBuf = path
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_) | Component::CurDir))
                    .collect();
                root.join(relative)
            }
        }
    }
}

/// Fail when `target` is a symbolic link. Steps running as root inside a
/// user's home must not be redirected elsewhere by a planted link.
fn refuse_symlink(target: &Path, path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.file_type().is_symlink() => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a symbolic link", path.display()),
        )),
        _ => Ok(()),
    }
}

impl FileSystem for HostFileSystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<DirOutcome> {
        let target = self.resolve(path);
        refuse_symlink(&target, path)?;
        if target.is_dir() {
            return Ok(DirOutcome::AlreadyExisted);
        }
        if target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", path.display()),
            ));
        }
        fs::create_dir_all(&target)?;
        Ok(DirOutcome::Created)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let target = self.resolve(to);
        refuse_symlink(&target, to)?;
        fs::copy(self.resolve(from), target).map(|_| ())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        refuse_symlink(&target, path)?;
        fs::write(target, contents)
    }

    #[cfg(unix)]
    fn set_executable(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let target = self.resolve(path);
        refuse_symlink(&target, path)?;
        let mut perms = fs::metadata(&target)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(&target, perms)
    }

    #[cfg(not(unix))]
    fn set_executable(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        std::os::unix::fs::lchown(self.resolve(path), Some(uid), Some(gid))
    }

    #[cfg(not(unix))]
    fn set_owner(&self, _path: &Path, _uid: u32, _gid: u32) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rooted_paths_are_reanchored() {
        let fs = HostFileSystem::rooted("/tmp/sandbox");
        assert_eq!(
            fs.resolve(Path::new("/home/alice/.config")),
            PathBuf::from("/tmp/sandbox/home/alice/.config")
        );
        assert_eq!(
            fs.resolve(Path::new("/../etc/passwd")),
            PathBuf::from("/tmp/sandbox/etc/passwd")
        );
    }

    #[test]
    fn unrooted_paths_pass_through() {
        let fs = HostFileSystem::new();
        assert_eq!(fs.resolve(Path::new("/etc/xdg")), PathBuf::from("/etc/xdg"));
    }

    #[test]
    fn create_dir_all_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let fs = HostFileSystem::rooted(temp.path());
        let dir = Path::new("/home/alice/.config/openbox");

        assert_eq!(fs.create_dir_all(dir).unwrap(), DirOutcome::Created);
        assert_eq!(fs.create_dir_all(dir).unwrap(), DirOutcome::AlreadyExisted);
        assert!(temp.path().join("home/alice/.config/openbox").is_dir());
    }

    #[test]
    fn create_dir_all_rejects_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("occupied"), "x").unwrap();
        let fs = HostFileSystem::rooted(temp.path());

        assert!(fs.create_dir_all(Path::new("/occupied")).is_err());
    }

    #[test]
    fn write_replaces_content() {
        let temp = TempDir::new().unwrap();
        let fs = HostFileSystem::rooted(temp.path());
        let path = Path::new("/file.txt");

        fs.write(path, b"first\n").unwrap();
        fs.write(path, b"second\n").unwrap();

        let content = std::fs::read_to_string(temp.path().join("file.txt")).unwrap();
        assert_eq!(content, "second\n");
    }

    #[test]
    fn copy_reads_from_rooted_source() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("etc/xdg/openbox")).unwrap();
        std::fs::write(temp.path().join("etc/xdg/openbox/rc.xml"), "<openbox_config/>").unwrap();
        let fs = HostFileSystem::rooted(temp.path());

        fs.copy(
            Path::new("/etc/xdg/openbox/rc.xml"),
            Path::new("/rc.xml"),
        )
        .unwrap();

        assert!(temp.path().join("rc.xml").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn planted_symlink_is_never_followed() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        std::fs::write(&outside, "untouched").unwrap();
        std::fs::create_dir_all(temp.path().join("etc/xdg/openbox")).unwrap();
        std::fs::write(temp.path().join("etc/xdg/openbox/rc.xml"), "<openbox_config/>").unwrap();
        std::fs::create_dir_all(temp.path().join("home/alice")).unwrap();
        symlink(&outside, temp.path().join("home/alice/.chrome-remote-desktop-session")).unwrap();
        symlink(&outside, temp.path().join("home/alice/rc.xml")).unwrap();
        symlink(temp.path(), temp.path().join("home/alice/.config")).unwrap();
        let fs = HostFileSystem::rooted(temp.path());

        let session = Path::new("/home/alice/.chrome-remote-desktop-session");
        let err = fs.write(session, b"exec openbox-session\n").unwrap_err();
        assert!(err.to_string().contains("symbolic link"));
        assert!(fs.set_executable(session).is_err());
        assert!(fs
            .copy(
                Path::new("/etc/xdg/openbox/rc.xml"),
                Path::new("/home/alice/rc.xml")
            )
            .is_err());
        assert!(fs.create_dir_all(Path::new("/home/alice/.config")).is_err());

        assert_eq!(std::fs::read_to_string(&outside).unwrap(), "untouched");
    }

    #[cfg(unix)]
    #[test]
    fn set_owner_changes_the_link_itself() {
        use std::os::unix::fs::{symlink, MetadataExt};

        let temp = TempDir::new().unwrap();
        // dangling: following the link would fail with NotFound
        symlink(temp.path().join("missing"), temp.path().join("link")).unwrap();
        let fs = HostFileSystem::rooted(temp.path());
        let meta = std::fs::symlink_metadata(temp.path().join("link")).unwrap();

        fs.set_owner(Path::new("/link"), meta.uid(), meta.gid()).unwrap();

        assert!(!temp.path().join("missing").exists());
    }

    #[cfg(unix)]
    #[test]
    fn set_executable_adds_owner_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let fs = HostFileSystem::rooted(temp.path());
        let path = Path::new("/script");
        fs.write(path, b"exec true\n").unwrap();

        fs.set_executable(path).unwrap();

        let mode = std::fs::metadata(temp.path().join("script"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o100, 0);
    }
}
