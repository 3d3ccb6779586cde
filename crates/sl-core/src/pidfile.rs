//! PID file utilities for single-instance management
//!
//! Prevents two agents from racing the same configuration and screen-share
//! port.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::config;

/// Default PID file name
const PID_FILE_NAME: &str = "agent.pid";

/// Get the default PID file path
pub fn default_pid_path() -> PathBuf {
    config::default_config_dir().join(PID_FILE_NAME)
}

/// Read the PID from the PID file
///
/// Returns `Ok(Some(pid))` if the file exists and contains a valid PID,
/// `Ok(None)` if the file doesn't exist, or an error if the file is malformed.
pub fn read_pid_file(path: &Path) -> io::Result<Option<u32>> {
    match fs::File::open(path) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let pid = contents
                .trim()
                .parse::<u32>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(Some(pid))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write the current process PID to the PID file
///
/// Creates parent directories if they don't exist.
pub fn write_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", pid)?;
    Ok(())
}

/// Remove the PID file
///
/// Returns `Ok(())` even if the file doesn't exist.
pub fn remove_pid_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Check if a process with the given PID is still alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) probes for existence; EPERM means it exists but we
    // cannot signal it
    unsafe {
        let result = libc::kill(pid as libc::pid_t, 0);
        if result == 0 {
            return true;
        }
        let err = std::io::Error::last_os_error();
        err.raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(windows)]
pub fn is_process_alive(pid: u32) -> bool {
    use std::ptr;
    use windows_sys::Win32::Foundation::{CloseHandle, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle == INVALID_HANDLE_VALUE || handle == ptr::null_mut() {
            return false;
        }
        CloseHandle(handle);
        true
    }
}

/// Guard that removes the PID file when dropped
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    /// Write the PID file and return a guard that cleans it up
    ///
    /// Fails if another live agent already holds the PID file; a PID file
    /// left behind by a dead process is overwritten.
    pub fn acquire(path: PathBuf, pid: u32) -> io::Result<Self> {
        if let Some(existing) = read_pid_file(&path).unwrap_or(None) {
            if existing != pid && is_process_alive(existing) {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("another agent is already running (pid {})", existing),
                ));
            }
        }
        write_pid_file(&path, pid)?;
        Ok(Self { path })
    }

    /// Acquire the guard at the default path
    pub fn acquire_default(pid: u32) -> io::Result<Self> {
        Self::acquire(default_pid_path(), pid)
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_pid_file(&self.path) {
            tracing::warn!("Failed to remove PID file {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_nonexistent_pid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pid");
        assert!(read_pid_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_pid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pid");

        write_pid_file(&path, 12345).unwrap();
        assert_eq!(read_pid_file(&path).unwrap(), Some(12345));
    }

    #[test]
    fn test_remove_nonexistent_pid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.pid");
        remove_pid_file(&path).unwrap();
    }

    #[test]
    fn test_guard_removes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guard.pid");

        {
            let _guard = PidFileGuard::acquire(path.clone(), std::process::id()).unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_guard_rejects_live_process() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("busy.pid");

        // PID 1 is always alive on Unix; on Windows the system process is
        let live_pid = if cfg!(unix) { 1 } else { 4 };
        write_pid_file(&path, live_pid).unwrap();

        let result = PidFileGuard::acquire(path.clone(), std::process::id());
        assert!(result.is_err());
    }

    #[test]
    fn test_guard_overwrites_stale_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stale.pid");

        write_pid_file(&path, 999999999).unwrap();
        let guard = PidFileGuard::acquire(path.clone(), std::process::id());
        assert!(guard.is_ok());
    }
}
