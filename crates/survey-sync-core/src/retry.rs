//! Transient-versus-permanent classification of publish failures.
//!
//! Typed timeouts from the broker client are always transient. For
//! everything else the rendered error text is scanned for the usual
//! transport-failure indicators; anything that does not match is treated as
//! permanent and dropped after logging. Transformer failures never reach
//! this classifier; malformed or orphaned input cannot be fixed by
//! redelivery.

use crate::publisher::PublishError;

/// Substrings that mark a broker failure as worth retrying.
const TRANSIENT_INDICATORS: [&str; 4] = ["timeout", "connection", "unavailable", "deadline"];

/// Whether a publish failure is transient (retry) or permanent (drop).
#[must_use]
pub fn is_transient(err: &PublishError) -> bool {
    match err {
        PublishError::Timeout { .. } => true,
        PublishError::Encode(_) => false,
        PublishError::Broker { message, .. } => TRANSIENT_INDICATORS
            .iter()
            .any(|indicator| message.contains(indicator)),
    }
}
