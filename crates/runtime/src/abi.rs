//! C ABI entry points called from instrumented code.
//!
//! Every function here uses C linkage and C-compatible types so the
//! transformed IR can call them with no knowledge of any source-language
//! ABI beyond the C calling convention. Names must stay in sync with the
//! transformation engine's runtime-call table.
//!
//! # Safety
//!
//! These functions are invoked from hardened binaries with raw pointers
//! the instrumentation produced. Location and message strings must be
//! null or NUL-terminated; region pointers must be readable for the given
//! size. Null pointers and zero sizes are tolerated and degrade to no-ops
//! or warnings, never to crashes.

use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};

use libc::{c_char, c_void};

use crate::context::{with_context, ErrorMode, FaultSeverity, RuntimeStats};

/// Decode an optional C string; null becomes "unknown".
fn location(loc: *const c_char) -> String {
    if loc.is_null() {
        return "unknown".to_string();
    }
    // Safety: non-null per the module contract, NUL-terminated by the
    // instrumentation (string literals in the emitted IR).
    unsafe { CStr::from_ptr(loc) }.to_string_lossy().into_owned()
}

/// Read a tracked region's bytes, or None when the region is unreadable by
/// construction (null / empty).
unsafe fn region_bytes<'a>(addr: *const c_void, size: usize) -> Option<&'a [u8]> {
    if addr.is_null() || size == 0 {
        return None;
    }
    Some(std::slice::from_raw_parts(addr as *const u8, size))
}

#[no_mangle]
pub extern "C" fn fi_verify_int32(value: i32, expected: i32, loc: *const c_char) {
    let loc = location(loc);
    with_context(|ctx| ctx.verify_i32(value, expected, &loc));
}

#[no_mangle]
pub extern "C" fn fi_verify_int64(value: i64, expected: i64, loc: *const c_char) {
    let loc = location(loc);
    with_context(|ctx| ctx.verify_i64(value, expected, &loc));
}

#[no_mangle]
pub extern "C" fn fi_verify_pointer(
    ptr: *const c_void,
    expected: *const c_void,
    loc: *const c_char,
) {
    let loc = location(loc);
    with_context(|ctx| ctx.verify_ptr(ptr as usize, expected as usize, &loc));
}

#[no_mangle]
pub extern "C" fn fi_verify_branch(condition: i32, expected: i32, loc: *const c_char) {
    let loc = location(loc);
    with_context(|ctx| ctx.verify_branch(condition, expected, &loc));
}

#[no_mangle]
pub extern "C" fn fi_checksum_update(addr: *const c_void, size: usize) {
    // Safety: region readable per the module contract.
    let Some(bytes) = (unsafe { region_bytes(addr, size) }) else {
        return;
    };
    with_context(|ctx| ctx.checksum_update(addr as usize, size, bytes));
}

#[no_mangle]
pub extern "C" fn fi_checksum_verify(addr: *const c_void, size: usize) -> i32 {
    // Safety: region readable per the module contract.
    let Some(bytes) = (unsafe { region_bytes(addr, size) }) else {
        return 1;
    };
    let ok = with_context(|ctx| ctx.checksum_verify(addr as usize, size, bytes));
    i32::from(ok)
}

#[no_mangle]
pub extern "C" fn fi_verify_cfi(
    target: *const c_void,
    expected: *const c_void,
    loc: *const c_char,
) {
    let loc = location(loc);
    with_context(|ctx| ctx.verify_cfi(target as usize, expected as usize, &loc));
}

#[no_mangle]
pub extern "C" fn fi_log_fault(message: *const c_char, severity: i32) {
    let message = location(message);
    let severity = FaultSeverity::from_raw(severity);
    with_context(|ctx| ctx.log_fault(&message, severity));
}

#[no_mangle]
pub extern "C" fn fi_check_bounds(ptr: *const c_void, base: *const c_void, size: usize) -> i32 {
    let ok = with_context(|ctx| ctx.check_bounds(ptr as usize, base as usize, size));
    i32::from(ok)
}

#[no_mangle]
pub extern "C" fn fi_protect_return_addr(addr_location: *mut *const c_void) {
    if addr_location.is_null() {
        return;
    }
    // Safety: non-null slot pointer produced by the instrumentation.
    let addr = unsafe { *addr_location } as usize;
    with_context(|ctx| ctx.protect_return_addr(addr));
}

#[no_mangle]
pub extern "C" fn fi_verify_return_addr(addr_location: *mut *const c_void) -> i32 {
    if addr_location.is_null() {
        return 1;
    }
    // Safety: non-null slot pointer produced by the instrumentation.
    let addr = unsafe { *addr_location } as usize;
    let ok = with_context(|ctx| ctx.verify_return_addr(addr));
    i32::from(ok)
}

#[no_mangle]
pub extern "C" fn fi_validate_hardware_io(addr: *const c_void, expected: i32) {
    if addr.is_null() {
        return;
    }
    // Safety: hardware register address readable per the module contract.
    // Volatile: the whole point is to observe the device value.
    let actual = unsafe { std::ptr::read_volatile(addr as *const i32) };
    with_context(|ctx| ctx.validate_hardware_io(addr as usize, actual, expected));
}

/// Mixing state for the timing-noise generator.
static NOISE_STATE: AtomicU64 = AtomicU64::new(0x9E37_79B9_7F4A_7C15);

#[no_mangle]
pub extern "C" fn fi_add_timing_noise() {
    let raw = NOISE_STATE.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed);
    let mixed = (raw ^ (raw >> 31)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    let spins = (mixed >> 60) as u32; // 0..16
    for i in 0..spins {
        std::hint::black_box(i);
    }
}

#[no_mangle]
pub extern "C" fn fi_runtime_init() {
    with_context(|ctx| ctx.activate());
}

#[no_mangle]
pub extern "C" fn fi_runtime_shutdown() {
    with_context(|ctx| ctx.shutdown());
}

#[no_mangle]
pub extern "C" fn fi_runtime_print_stats() {
    with_context(|ctx| ctx.print_stats());
}

#[no_mangle]
pub extern "C" fn fi_set_error_mode(mode: i32) {
    match ErrorMode::from_raw(mode) {
        Some(mode) => with_context(|ctx| ctx.set_error_mode(mode)),
        None => eprintln!("[FI-Runtime] Warning: ignoring unknown error mode {mode}"),
    }
}

#[no_mangle]
pub extern "C" fn fi_get_error_mode() -> i32 {
    with_context(|ctx| ctx.error_mode()) as i32
}

/// Copy the current counters into `out`. Returns 1 on success, 0 when
/// `out` is null.
#[no_mangle]
pub extern "C" fn fi_get_stats(out: *mut RuntimeStats) -> i32 {
    if out.is_null() {
        return 0;
    }
    let snapshot = with_context(|ctx| ctx.stats());
    // Safety: non-null, caller-provided stats struct.
    unsafe {
        *out = snapshot;
    }
    1
}
