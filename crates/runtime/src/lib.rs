//! Runtime verification library for fault-injection hardening.
//!
//! This crate is linked into hardened binaries and provides the
//! verification primitives the transformed IR calls: type-dispatched value
//! comparison, branch-condition verification, checksum tracking over
//! (address, size) regions, CFI-target verification, fault logging with
//! severities, memory bounds checks, return-address protection, hardware
//! I/O validation, and timing-noise injection. All entry points use C
//! linkage (see [`abi`]).
//!
//! # Lifecycle
//!
//! The process-wide [`RuntimeContext`] moves Uninitialized → Active on
//! first use and Active → ShuttingDown at process exit via an atexit hook,
//! printing final statistics if any verification ran. On a detected
//! mismatch, the configured [`ErrorMode`] decides what happens next:
//! `Abort` (default) terminates immediately, `LogOnly` records and
//! continues, `AttemptCorrect` is a declared-but-unfinished stub that
//! behaves like `LogOnly`.
//!
//! # Thread safety
//!
//! The shared context sits behind a mutex, so the entry points may be
//! called from any thread of the hardened program. Note that the
//! return-address stack is a single process-wide LIFO: interleaved
//! protected calls from multiple threads will be treated as one nesting
//! and degrade to assume-OK warnings rather than reliable verification.

pub mod abi;
pub mod checksum;
pub mod context;
pub mod retaddr;

pub use checksum::{ChecksumTable, ChecksumVerdict, MAX_CHECKSUM_ENTRIES};
pub use context::{
    with_context, ErrorMode, FaultSeverity, RuntimeContext, RuntimeState, RuntimeStats,
};
pub use retaddr::{RetAddrVerdict, ReturnAddrStack, MAX_RETURN_ADDRS};

/// Snapshot of the process-wide counters.
pub fn stats_snapshot() -> RuntimeStats {
    with_context(|ctx| ctx.stats())
}

/// Set the process-wide error mode.
pub fn set_error_mode(mode: ErrorMode) {
    with_context(|ctx| ctx.set_error_mode(mode));
}
