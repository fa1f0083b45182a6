// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::{Result, StylizeError};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a codec call, turning a panic inside it into `InternalPanic`.
///
/// Third-party decoders and encoders are the only code that may panic on
/// hostile input; everything else propagates errors.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(StylizeError::internal_panic(format!(
                "{stage}: panicked: {detail}"
            )))
        }
    }
}
