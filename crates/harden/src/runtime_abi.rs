//! The runtime library's call surface, as seen by the transformation.
//!
//! Names must stay in sync with the `runtime` crate's C ABI exports. The
//! classifier also consults this table to avoid re-instrumenting the
//! verification calls the pass itself inserts.

use ir::Type;

pub const VERIFY_INT32: &str = "fi_verify_int32";
pub const VERIFY_INT64: &str = "fi_verify_int64";
pub const VERIFY_POINTER: &str = "fi_verify_pointer";
pub const VERIFY_BRANCH: &str = "fi_verify_branch";
pub const CHECKSUM_UPDATE: &str = "fi_checksum_update";
pub const CHECKSUM_VERIFY: &str = "fi_checksum_verify";
pub const VERIFY_CFI: &str = "fi_verify_cfi";
pub const LOG_FAULT: &str = "fi_log_fault";
pub const CHECK_BOUNDS: &str = "fi_check_bounds";
pub const PROTECT_RETURN_ADDR: &str = "fi_protect_return_addr";
pub const VERIFY_RETURN_ADDR: &str = "fi_verify_return_addr";
pub const VALIDATE_HARDWARE_IO: &str = "fi_validate_hardware_io";
pub const ADD_TIMING_NOISE: &str = "fi_add_timing_noise";

/// Severity argument of the fault logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Critical = 3,
}

/// Check if `name` is one of the runtime library's own entry points.
pub fn is_runtime_fn(name: &str) -> bool {
    matches!(
        name,
        VERIFY_INT32
            | VERIFY_INT64
            | VERIFY_POINTER
            | VERIFY_BRANCH
            | CHECKSUM_UPDATE
            | CHECKSUM_VERIFY
            | VERIFY_CFI
            | LOG_FAULT
            | CHECK_BOUNDS
            | PROTECT_RETURN_ADDR
            | VERIFY_RETURN_ADDR
            | VALIDATE_HARDWARE_IO
            | ADD_TIMING_NOISE
    )
}

/// Check if `name` is a compiler intrinsic rather than a real call target.
pub fn is_intrinsic(name: &str) -> bool {
    name.starts_with("llvm.")
}

/// The typed value-verification primitive for a type, if one exists.
///
/// Only 32-bit integers, 64-bit integers, and pointers have dedicated
/// primitives; other types are not verified (a known limitation).
pub fn verify_fn_for(ty: Type) -> Option<&'static str> {
    match ty {
        Type::I32 => Some(VERIFY_INT32),
        Type::I64 => Some(VERIFY_INT64),
        Type::Ptr => Some(VERIFY_POINTER),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_fn_table() {
        assert!(is_runtime_fn("fi_verify_int32"));
        assert!(is_runtime_fn("fi_add_timing_noise"));
        assert!(!is_runtime_fn("fi_something_else"));
        assert!(!is_runtime_fn("printf"));
    }

    #[test]
    fn test_intrinsics() {
        assert!(is_intrinsic("llvm.dbg.value"));
        assert!(!is_intrinsic("malloc"));
    }

    #[test]
    fn test_type_dispatch() {
        assert_eq!(verify_fn_for(Type::I32), Some(VERIFY_INT32));
        assert_eq!(verify_fn_for(Type::I64), Some(VERIFY_INT64));
        assert_eq!(verify_fn_for(Type::Ptr), Some(VERIFY_POINTER));
        assert_eq!(verify_fn_for(Type::I8), None);
        assert_eq!(verify_fn_for(Type::F64), None);
    }
}
