//! Identifier of one batch run.
//!
//! Every process gets a ULID on first access. It tags log lines and the
//! written result document so a pairing can be traced to the run that
//! produced it.

use once_cell::sync::Lazy;
use ulid::Ulid;

static RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// The process-level run ID. Same value for the whole process lifetime.
#[inline]
pub fn get() -> &'static str {
    &RUN_ID
}
