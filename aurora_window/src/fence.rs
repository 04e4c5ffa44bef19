//! Fence descriptor utilities
//!
//! A fence is an OS-level one-shot synchronization primitive represented by
//! a file descriptor. Throughout the workspace a fence is carried as an
//! `OwnedFd` (or `Option<OwnedFd>` where "no fence" is a valid state), so
//! ownership is single-holder at all times: dropping the value closes the
//! descriptor exactly once, and passing it by value transfers ownership.
//!
//! A fence has signalled once its descriptor polls readable.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use rustix::event::{poll, PollFd, PollFlags};
use rustix::io::Errno;

use crate::error::{WindowError, WindowResult};

fn io_error(errno: Errno) -> WindowError {
    WindowError::Io(errno.raw_os_error())
}

/// Duplicate a fence descriptor.
///
/// Returns an independent descriptor for the same underlying fence. The
/// argument is borrowed; the caller keeps ownership of the original. Fails
/// only with a host-resource error, in which case callers are expected to
/// fall back to a synchronous [`wait_forever`] on the original.
pub fn dup(fence: BorrowedFd<'_>) -> WindowResult<OwnedFd> {
    rustix::io::dup(fence).map_err(io_error)
}

/// Block until the fence signals.
///
/// The descriptor is borrowed and stays open; interrupted waits are
/// retried.
pub fn wait_forever(fence: BorrowedFd<'_>) -> WindowResult<()> {
    loop {
        let mut fds = [PollFd::new(&fence, PollFlags::IN)];
        match poll(&mut fds, -1) {
            Ok(_) => return Ok(()),
            Err(Errno::INTR) => continue,
            Err(errno) => return Err(io_error(errno)),
        }
    }
}

/// Block until the fence signals, then close it.
///
/// Takes ownership of the descriptor; it is closed whether or not the wait
/// succeeds.
pub fn wait_forever_and_close(fence: OwnedFd) -> WindowResult<()> {
    wait_forever(fence.as_fd())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
