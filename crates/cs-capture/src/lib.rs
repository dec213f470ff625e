//! Standard output capture
//!
//! A [`CaptureScope`] points file descriptor 1 at an anonymous temporary
//! file and restores the original descriptor when it is finished or dropped.
//! Everything written to stdout in between, by Rust or by C stdio, ends up
//! in the scope's buffer.
//!
//! Descriptor 1 is process-wide state: at most one scope may be active in
//! the whole process. A second [`CaptureScope::begin`] fails with
//! [`CaptureError::AlreadyActive`] until the first one ends.
//!
//! Redirection works on POSIX descriptors, so only unix targets are supported.

#[cfg(not(unix))]
compile_error!("cs-capture redirects POSIX file descriptors and supports unix targets only");

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};

use cs_core::error::CaptureError;
use once_cell::sync::OnceCell;

static ACTIVE: AtomicBool = AtomicBool::new(false);
static INIT: OnceCell<()> = OnceCell::new();

/// Make sure descriptor 1 is open so it can be redirected and restored.
///
/// A process started with stdout closed gets the null device instead.
/// Idempotent.
pub fn init() -> Result<(), CaptureError> {
    INIT.get_or_try_init(|| {
        // SAFETY: F_GETFD only queries the descriptor table.
        if unsafe { libc::fcntl(libc::STDOUT_FILENO, libc::F_GETFD) } == -1 {
            let null = OpenOptions::new().write(true).open("/dev/null")?;
            // SAFETY: both descriptors are valid.
            if unsafe { libc::dup2(null.as_raw_fd(), libc::STDOUT_FILENO) } == -1 {
                return Err(CaptureError::Io(io::Error::last_os_error()));
            }
            tracing::debug!(target: "capture", "stdout was closed, attached the null device");
        }
        Ok(())
    })
    .map(|_| ())
}

/// Whether a capture scope is active anywhere in the process
pub fn is_active() -> bool {
    ACTIVE.load(Ordering::Acquire)
}

/// An active stdout redirection
#[derive(Debug)]
pub struct CaptureScope {
    /// Duplicate of the original stdout, `None` once restored
    saved: Option<OwnedFd>,
    sink: File,
}

impl CaptureScope {
    /// Start redirecting stdout
    #[doc(alias = "begin_capture")]
    pub fn begin() -> Result<Self, CaptureError> {
        init()?;
        if ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::AlreadyActive);
        }

        match Self::redirect() {
            Ok(scope) => {
                cs_core::capture_trace!("Capture started");
                Ok(scope)
            }
            Err(e) => {
                ACTIVE.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn redirect() -> Result<Self, CaptureError> {
        flush_stdio();
        let sink = tempfile::tempfile()?;

        // SAFETY: descriptor 1 is open (see `init`).
        let saved = unsafe { libc::dup(libc::STDOUT_FILENO) };
        if saved == -1 {
            return Err(CaptureError::Io(io::Error::last_os_error()));
        }
        // SAFETY: `saved` is a fresh descriptor nothing else owns.
        let saved = unsafe { OwnedFd::from_raw_fd(saved) };

        // SAFETY: both descriptors are valid.
        if unsafe { libc::dup2(sink.as_raw_fd(), libc::STDOUT_FILENO) } == -1 {
            return Err(CaptureError::Io(io::Error::last_os_error()));
        }

        Ok(Self {
            saved: Some(saved),
            sink,
        })
    }

    /// Restore stdout and return everything written while the scope was active
    #[doc(alias = "end_capture")]
    pub fn finish(mut self) -> Result<Vec<u8>, CaptureError> {
        self.restore()?;

        let mut captured = Vec::new();
        self.sink.seek(SeekFrom::Start(0))?;
        self.sink.read_to_end(&mut captured)?;
        cs_core::capture_trace!("Capture finished, {} bytes", captured.len());
        Ok(captured)
    }

    fn restore(&mut self) -> Result<(), CaptureError> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        flush_stdio();
        // SAFETY: both descriptors are valid.
        let rc = unsafe { libc::dup2(saved.as_raw_fd(), libc::STDOUT_FILENO) };
        ACTIVE.store(false, Ordering::Release);
        if rc == -1 {
            return Err(CaptureError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(target: "capture", "Failed to restore stdout: {}", e);
        }
    }
}

/// Push pending Rust and C stdio output to the current descriptor 1
fn flush_stdio() {
    let _ = io::stdout().flush();
    // SAFETY: fflush(NULL) flushes every open C output stream.
    unsafe { libc::fflush(std::ptr::null_mut()) };
}
