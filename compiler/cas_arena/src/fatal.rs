//! Process-terminating failure path.

use std::fmt;

/// Log `message` and abort the process.
///
/// Used for conditions the storage layer cannot recover from: the arena
/// failing to grow, or its free indices disagreeing with each other. The
/// compiler cannot keep going without somewhere to put its output, and
/// unwinding through half-updated allocator state would only hide the
/// corruption.
#[cold]
#[inline(never)]
pub fn fatal(message: fmt::Arguments<'_>) -> ! {
    tracing::error!("{message}");
    eprintln!("fatal: {message}");
    std::process::abort()
}
