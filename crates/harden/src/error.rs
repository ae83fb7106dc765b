//! Error types for the hardening pass.

use thiserror::Error;

/// Errors surfaced by the transformation entry points.
#[derive(Debug, Error)]
pub enum HardenError {
    #[error("invalid hardening level {0} (expected 0-3)")]
    InvalidLevel(u32),

    #[error(
        "IR verification failed for function '{function}' after hardening: {}",
        format_errors(errors)
    )]
    VerificationFailed {
        function: String,
        errors: Vec<ir::VerifyError>,
    },
}

fn format_errors(errors: &[ir::VerifyError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
