//! Single-writer lock on a working tree

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Lock file name inside the git directory
pub const LOCK_FILE: &str = "sprout.lock";

/// Exclusive claim on a working tree, released on drop
///
/// Every branch switch, file write and commit made by the workflow happens
/// while one of these is held.
#[derive(Debug)]
pub struct WorkingTreeLock {
    path: PathBuf,
}

impl WorkingTreeLock {
    /// Create the lock file inside `git_dir`, failing if a live process holds it
    ///
    /// A lock left behind by a process that no longer exists is removed and
    /// taken over.
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let path = git_dir.join(LOCK_FILE);

        let mut file = match create_lock_file(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match std::fs::read_to_string(&path) {
                    Ok(contents) if is_stale(&contents) => {
                        tracing::warn!(
                            path = %path.display(),
                            holder = contents.trim(),
                            "Removing stale working tree lock"
                        );
                        match std::fs::remove_file(&path) {
                            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                                return Err(Error::Io(e))
                            }
                            _ => {}
                        }
                        create_lock_file(&path).map_err(|e| locked_or_io(&path, e))?
                    }
                    _ => return Err(locked(&path)),
                }
            }
            other => other.map_err(|e| locked_or_io(&path, e))?,
        };

        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "Acquired working tree lock");

        Ok(Self { path })
    }

    /// Location of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn create_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn locked(path: &Path) -> Error {
    Error::Locked(format!(
        "{} exists; another sprout process is using this working tree. \
         Remove the file if that process is gone.",
        path.display()
    ))
}

fn locked_or_io(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::AlreadyExists {
        locked(path)
    } else {
        Error::Io(e)
    }
}

/// Whether the lock file names a process that has exited
///
/// An empty file is never stale: the holder may not have written its pid yet.
fn is_stale(contents: &str) -> bool {
    match contents.trim().parse::<u32>() {
        Ok(pid) => pid != std::process::id() && !process_alive(pid),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for WorkingTreeLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release working tree lock");
        } else {
            tracing::debug!(path = %self.path.display(), "Released working tree lock");
        }
    }
}
