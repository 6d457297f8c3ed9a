//! Per-notification processing context.
//!
//! The original service stashed authorization and principal attributes in an
//! ambient context that every layer reached into. Here the context is an
//! explicit value threaded through the handler chain, so tests can construct
//! exactly the context they need and nothing reads global state.

use std::collections::HashMap;

/// Fallback token attached to messages that were not triggered by a caller,
/// i.e. everything originating from the change feed.
pub const SERVICE_IDENTITY_TOKEN: &str = "Bearer survey-service";

/// Correlation context for one notification's processing pass.
#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    /// Authorization (or impersonation) token to forward downstream, when
    /// the triggering request carried one.
    pub authorization: Option<String>,
    /// Principal the work is performed on behalf of, when known.
    pub principal: Option<String>,
}

impl ProcessingContext {
    /// Builds the correlation-header block carried by every outbound
    /// message: the context's token (falling back to the service identity)
    /// plus an on-behalf-of principal when one is known.
    #[must_use]
    pub fn message_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "authorization".to_string(),
            self.authorization
                .clone()
                .unwrap_or_else(|| SERVICE_IDENTITY_TOKEN.to_string()),
        );
        if let Some(principal) = &self.principal {
            headers.insert("x-on-behalf-of".to_string(), principal.clone());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_fall_back_to_service_identity() {
        let headers = ProcessingContext::default().message_headers();
        assert_eq!(
            headers.get("authorization").map(String::as_str),
            Some(SERVICE_IDENTITY_TOKEN)
        );
        assert!(!headers.contains_key("x-on-behalf-of"));
    }

    #[test]
    fn headers_carry_token_and_principal() {
        let ctx = ProcessingContext {
            authorization: Some("Bearer abc".to_string()),
            principal: Some("user@example.org".to_string()),
        };
        let headers = ctx.message_headers();
        assert_eq!(
            headers.get("authorization").map(String::as_str),
            Some("Bearer abc")
        );
        assert_eq!(
            headers.get("x-on-behalf-of").map(String::as_str),
            Some("user@example.org")
        );
    }
}
