//! Invoking-user resolution.

use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};
use crate::shell::{is_elevated, CommandExecutor, CommandOptions};

/// Identity of the user the desktop is being provisioned for.
///
/// Resolved once before any step runs and passed explicitly to everything
/// that needs it. Nothing reads the process environment after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    user: Option<String>,
    home: Option<PathBuf>,
    /// Numeric user id of the invoking user.
    pub uid: u32,
    /// Primary group id of the invoking user.
    pub gid: u32,
    /// Whether the process runs with root privileges.
    pub elevated: bool,
}

/// One parsed line of the passwd database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// Parse a `name:passwd:uid:gid:gecos:home:shell` line.
pub fn parse_passwd_entry(line: &str) -> Option<PasswdEntry> {
    let fields: Vec<&str> = line.trim_end().split(':').collect();
    if fields.len() < 7 {
        return None;
    }
    let home = fields[5];
    if fields[0].is_empty() || home.is_empty() {
        return None;
    }
    Some(PasswdEntry {
        name: fields[0].to_string(),
        uid: fields[2].parse().ok()?,
        gid: fields[3].parse().ok()?,
        home: PathBuf::from(home),
    })
}

impl HostContext {
    /// Build a context from known values.
    ///
    /// Ids default to those of the current process and the context is not
    /// elevated.
    pub fn new(user: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        let (uid, gid) = current_ids();
        Self {
            user: Some(user.into()).filter(|u: &String| !u.is_empty()),
            home: Some(home.into()).filter(|h: &PathBuf| !h.as_os_str().is_empty()),
            uid,
            gid,
            elevated: false,
        }
    }

    /// A context whose identity could not be resolved.
    pub fn unresolved() -> Self {
        let (uid, gid) = current_ids();
        Self {
            user: None,
            home: None,
            uid,
            gid,
            elevated: is_elevated(),
        }
    }

    /// Set the privilege level.
    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Drop the home directory, as if it could not be resolved.
    pub fn without_home(mut self) -> Self {
        self.home = None;
        self
    }

    /// Resolve the invoking user from the process environment.
    ///
    /// `SUDO_USER` wins over `USER` so that `sudo deskprov` provisions the
    /// desktop for the person who typed it, not for root. The home
    /// directory comes from the passwd database (`getent passwd`); `HOME`
    /// is only trusted when the process was not started through sudo.
    pub fn resolve(executor: &dyn CommandExecutor) -> Self {
        Self::resolve_with(executor, |key| std::env::var(key).ok(), is_elevated())
    }

    /// Resolution with an explicit environment lookup.
    pub fn resolve_with(
        executor: &dyn CommandExecutor,
        env: impl Fn(&str) -> Option<String>,
        elevated: bool,
    ) -> Self {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let sudo_user = non_empty("SUDO_USER");
        let via_sudo = sudo_user.is_some();
        let user = sudo_user.or_else(|| non_empty("USER"));

        let entry = user
            .as_deref()
            .and_then(|name| lookup_passwd(executor, name));

        let home = match &entry {
            Some(e) => Some(e.home.clone()),
            None if !via_sudo => non_empty("HOME").map(PathBuf::from),
            None => None,
        };

        let (uid, gid) = entry
            .as_ref()
            .map(|e| (e.uid, e.gid))
            .unwrap_or_else(current_ids);

        tracing::debug!(
            "resolved host context: user={:?} home={:?} uid={} gid={} elevated={}",
            user,
            home,
            uid,
            gid,
            elevated
        );

        Self {
            user,
            home,
            uid,
            gid,
            elevated,
        }
    }

    /// The invoking user's login name.
    pub fn user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| ProvisionError::MissingIdentity {
                what: "user name".to_string(),
            })
    }

    /// The invoking user's home directory.
    pub fn home(&self) -> Result<&Path> {
        self.home
            .as_deref()
            .ok_or_else(|| ProvisionError::MissingIdentity {
                what: "home directory".to_string(),
            })
    }

    /// Check that identity is complete and usable.
    pub fn validate(&self) -> Result<()> {
        self.user()?;
        let home = self.home()?;
        if !home.is_absolute() {
            return Err(ProvisionError::MissingIdentity {
                what: format!("absolute home directory (got '{}')", home.display()),
            });
        }
        Ok(())
    }

    /// Whether `path` lies inside the invoking user's home directory.
    pub fn owns_path(&self, path: &Path) -> bool {
        self.home.as_deref().is_some_and(|home| path.starts_with(home))
    }
}

fn lookup_passwd(executor: &dyn CommandExecutor, user: &str) -> Option<PasswdEntry> {
    let result = executor
        .run(
            "getent",
            &["passwd".to_string(), user.to_string()],
            &CommandOptions::default(),
        )
        .ok()?;
    if !result.success {
        return None;
    }
    result
        .stdout
        .lines()
        .filter_map(parse_passwd_entry)
        .find(|e| e.name == user)
}

fn current_ids() -> (u32, u32) {
    #[cfg(unix)]
    {
        // SAFETY: getuid()/getgid() cannot fail and touch no memory
        unsafe { (libc::getuid(), libc::getgid()) }
    }

    #[cfg(not(unix))]
    {
        (0, 0)
    }
}
