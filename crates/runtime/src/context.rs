//! Runtime context: statistics, error mode, and the verification state
//! machine.
//!
//! The context moves Uninitialized → Active on first use (zeroing counters
//! and registering the shutdown hook) and Active → ShuttingDown at process
//! exit, printing final statistics if any verification ran.
//!
//! The process-wide instance lives behind a mutex so the verification
//! entry points may be called from any thread of the hardened program; the
//! logical state machine is unchanged from a single-threaded embedding.

use std::sync::Mutex;

use crate::checksum::{ChecksumTable, ChecksumVerdict, UpdateOutcome};
use crate::retaddr::{RetAddrVerdict, ReturnAddrStack};

/// Response policy for a detected mismatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Print full detail and terminate immediately (default).
    Abort = 0,
    /// Print detail and continue with the possibly corrupted value.
    LogOnly = 1,
    /// Declared but unfinished: logs that correction is unavailable and
    /// continues. Do not rely on any corrective behavior.
    AttemptCorrect = 2,
}

impl ErrorMode {
    pub fn from_raw(raw: i32) -> Option<ErrorMode> {
        match raw {
            0 => Some(ErrorMode::Abort),
            1 => Some(ErrorMode::LogOnly),
            2 => Some(ErrorMode::AttemptCorrect),
            _ => None,
        }
    }
}

/// Fault severity for the logging entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FaultSeverity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Critical = 3,
}

impl FaultSeverity {
    /// Out-of-range raw values clamp to `Warning`.
    pub fn from_raw(raw: i32) -> FaultSeverity {
        match raw {
            0 => FaultSeverity::Info,
            2 => FaultSeverity::Error,
            3 => FaultSeverity::Critical,
            _ => FaultSeverity::Warning,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FaultSeverity::Info => "INFO",
            FaultSeverity::Warning => "WARNING",
            FaultSeverity::Error => "ERROR",
            FaultSeverity::Critical => "CRITICAL",
        }
    }
}

/// Lifecycle of the runtime context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    Active,
    ShuttingDown,
}

/// Running verification counters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub verifications_performed: u64,
    pub mismatches_detected: u64,
    pub int32_verifications: u64,
    pub int64_verifications: u64,
    pub pointer_verifications: u64,
    pub branch_verifications: u64,
    pub checksum_verifications: u64,
    pub checksum_failures: u64,
}

impl RuntimeStats {
    pub const fn zeroed() -> Self {
        RuntimeStats {
            verifications_performed: 0,
            mismatches_detected: 0,
            int32_verifications: 0,
            int64_verifications: 0,
            pointer_verifications: 0,
            branch_verifications: 0,
            checksum_verifications: 0,
            checksum_failures: 0,
        }
    }
}

/// The runtime verification context.
#[derive(Debug)]
pub struct RuntimeContext {
    state: RuntimeState,
    mode: ErrorMode,
    stats: RuntimeStats,
    checksums: ChecksumTable,
    return_addrs: ReturnAddrStack,
}

impl RuntimeContext {
    pub const fn new() -> Self {
        RuntimeContext {
            state: RuntimeState::Uninitialized,
            mode: ErrorMode::Abort,
            stats: RuntimeStats::zeroed(),
            checksums: ChecksumTable::new(),
            return_addrs: ReturnAddrStack::new(),
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.mode
    }

    pub fn set_error_mode(&mut self, mode: ErrorMode) {
        self.mode = mode;
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    /// Transition Uninitialized → Active: zero all state, default mode.
    pub fn activate(&mut self) {
        self.stats = RuntimeStats::zeroed();
        self.checksums.reset();
        self.return_addrs.reset();
        self.mode = ErrorMode::Abort;
        self.state = RuntimeState::Active;
    }

    /// Transition to ShuttingDown, printing final statistics if any
    /// verification ran.
    pub fn shutdown(&mut self) {
        if self.state == RuntimeState::ShuttingDown {
            return;
        }
        self.state = RuntimeState::ShuttingDown;
        if self.stats.verifications_performed > 0 {
            self.print_stats();
        }
    }

    pub fn print_stats(&self) {
        let s = &self.stats;
        eprintln!();
        eprintln!("========================================");
        eprintln!("FI Hardening Runtime Statistics");
        eprintln!("========================================");
        eprintln!("Total verifications:     {}", s.verifications_performed);
        eprintln!("Mismatches detected:     {}", s.mismatches_detected);
        eprintln!("  Int32 verifications:   {}", s.int32_verifications);
        eprintln!("  Int64 verifications:   {}", s.int64_verifications);
        eprintln!("  Pointer verifications: {}", s.pointer_verifications);
        eprintln!("  Branch verifications:  {}", s.branch_verifications);
        eprintln!("  Checksum verifications:{}", s.checksum_verifications);
        eprintln!("  Checksum failures:     {}", s.checksum_failures);
        if s.verifications_performed > 0 {
            let rate =
                s.mismatches_detected as f64 / s.verifications_performed as f64 * 100.0;
            eprintln!("Mismatch rate:           {rate:.4}%");
        }
        eprintln!("========================================");
        eprintln!();
    }

    /// Print the mismatch diagnostic block and apply the error-mode policy.
    ///
    /// The diagnostic always prints regardless of mode; only the subsequent
    /// action differs. `Abort` does not return.
    fn handle_mismatch(&mut self, kind: &str, location: &str, details: &str) {
        self.stats.mismatches_detected += 1;

        eprintln!();
        eprintln!("[FI MISMATCH DETECTED]");
        eprintln!("Type:     {kind}");
        eprintln!("Location: {location}");
        eprintln!("Details:  {details}");
        eprintln!();

        match self.mode {
            ErrorMode::Abort => {
                eprintln!("Aborting due to fault injection detection!");
                std::process::abort();
            }
            ErrorMode::LogOnly => {
                eprintln!("Continuing execution (log mode)");
            }
            ErrorMode::AttemptCorrect => {
                // No correction logic exists; behaves as LogOnly.
                eprintln!("Correction requested but not implemented; continuing");
            }
        }
    }

    pub fn verify_i32(&mut self, value: i32, expected: i32, location: &str) {
        self.stats.verifications_performed += 1;
        self.stats.int32_verifications += 1;
        if value != expected {
            let details = format!("int32 mismatch: got {value}, expected {expected}");
            self.handle_mismatch("int32", location, &details);
        }
    }

    pub fn verify_i64(&mut self, value: i64, expected: i64, location: &str) {
        self.stats.verifications_performed += 1;
        self.stats.int64_verifications += 1;
        if value != expected {
            let details = format!("int64 mismatch: got {value}, expected {expected}");
            self.handle_mismatch("int64", location, &details);
        }
    }

    pub fn verify_ptr(&mut self, ptr: usize, expected: usize, location: &str) {
        self.stats.verifications_performed += 1;
        self.stats.pointer_verifications += 1;
        if ptr != expected {
            let details = format!("pointer mismatch: got {ptr:#x}, expected {expected:#x}");
            self.handle_mismatch("pointer", location, &details);
        }
    }

    pub fn verify_branch(&mut self, condition: i32, expected: i32, location: &str) {
        self.stats.verifications_performed += 1;
        self.stats.branch_verifications += 1;
        if condition != expected {
            let details = format!(
                "branch condition mismatch: got {condition}, expected {expected}"
            );
            self.handle_mismatch("branch", location, &details);
        }
    }

    pub fn verify_cfi(&mut self, target: usize, expected: usize, location: &str) {
        self.stats.verifications_performed += 1;
        if target != expected {
            let details = format!(
                "CFI violation: target {target:#x}, expected {expected:#x} at {location}"
            );
            self.handle_mismatch("cfi", "indirect_call", &details);
        }
    }

    pub fn checksum_update(&mut self, addr: usize, size: usize, bytes: &[u8]) {
        if self.checksums.update(addr, size, bytes) == UpdateOutcome::TableFull {
            eprintln!("[FI-Runtime] Warning: checksum table full, ignoring update");
        }
    }

    /// Verify a region's checksum. Returns `true` when the region is intact
    /// or untracked (assume-OK).
    pub fn checksum_verify(&mut self, addr: usize, size: usize, bytes: &[u8]) -> bool {
        self.stats.verifications_performed += 1;
        self.stats.checksum_verifications += 1;

        match self.checksums.verify(addr, size, bytes) {
            ChecksumVerdict::Match => true,
            ChecksumVerdict::Unknown => {
                eprintln!(
                    "[FI-Runtime] Warning: no checksum entry for {addr:#x} (size {size})"
                );
                true
            }
            ChecksumVerdict::Mismatch { stored, computed } => {
                self.stats.checksum_failures += 1;
                let details = format!(
                    "memory corruption at {addr:#x}: checksum {computed:08x}, expected {stored:08x}"
                );
                self.handle_mismatch("checksum", "memory_region", &details);
                false
            }
        }
    }

    pub fn log_fault(&mut self, message: &str, severity: FaultSeverity) {
        eprintln!("[FI-Runtime] [{}] {message}", severity.label());
        if severity >= FaultSeverity::Error {
            self.stats.mismatches_detected += 1;
        }
    }

    /// Returns `true` when `ptr` lies within `[base, base + size)`.
    pub fn check_bounds(&mut self, ptr: usize, base: usize, size: usize) -> bool {
        self.stats.verifications_performed += 1;
        let end = base.saturating_add(size);
        if ptr < base || ptr >= end {
            let details = format!(
                "bounds check failed: ptr {ptr:#x} outside [{base:#x}, {end:#x})"
            );
            self.handle_mismatch("bounds", "memory_access", &details);
            return false;
        }
        true
    }

    pub fn protect_return_addr(&mut self, addr: usize) {
        if !self.return_addrs.push(addr) {
            eprintln!("[FI-Runtime] Warning: return address protection table full");
        }
    }

    /// Returns `true` when the address matches the saved one, or when the
    /// stack is empty (assume-OK, indicates a protect/verify imbalance).
    pub fn verify_return_addr(&mut self, addr: usize) -> bool {
        self.stats.verifications_performed += 1;
        match self.return_addrs.pop_and_check(addr) {
            RetAddrVerdict::Match => true,
            RetAddrVerdict::Empty => {
                eprintln!("[FI-Runtime] Warning: no saved return address to verify");
                true
            }
            RetAddrVerdict::Mismatch { saved } => {
                let details = format!(
                    "return address corrupted: current {addr:#x}, expected {saved:#x}"
                );
                self.handle_mismatch("return_addr", "stack", &details);
                false
            }
        }
    }

    /// Validate a value read from a hardware register. Mismatches are
    /// logged at warning level rather than dispatched through the error
    /// mode: I/O values are expected to be noisy.
    pub fn validate_hardware_io(&mut self, addr: usize, actual: i32, expected: i32) {
        self.stats.verifications_performed += 1;
        if actual != expected && expected != 0 {
            let details = format!(
                "hardware I/O unexpected: addr {addr:#x}, value {actual}, expected {expected}"
            );
            self.log_fault(&details, FaultSeverity::Warning);
        }
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide context instance.
static CONTEXT: Mutex<RuntimeContext> = Mutex::new(RuntimeContext::new());

/// Run `f` against the process-wide context, activating it on first use.
///
/// Activation registers the atexit shutdown hook so final statistics print
/// at process exit, matching a C constructor/destructor pair.
pub fn with_context<R>(f: impl FnOnce(&mut RuntimeContext) -> R) -> R {
    let mut ctx = CONTEXT.lock().unwrap_or_else(|e| e.into_inner());
    if ctx.state() == RuntimeState::Uninitialized {
        ctx.activate();
        // Safety: registering an extern "C" hook with no preconditions.
        unsafe {
            libc::atexit(shutdown_hook);
        }
    }
    f(&mut ctx)
}

extern "C" fn shutdown_hook() {
    let mut ctx = CONTEXT.lock().unwrap_or_else(|e| e.into_inner());
    ctx.shutdown();
}
