//! Shared types for the HTTP API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::{Role, SortOrder};

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    pub fn open_db(&self) -> Result<rusqlite::Connection, ApiError> {
        Ok(self.core.open_db()?)
    }
}

// ═══════════════════════════════════════════════════════════
// Caller context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated staff member, injected into request extensions by the
/// auth middleware after token lookup.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub staff_id: Uuid,
    pub role: Role,
}

impl CallerContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Listing queries: shared search/sort/page handling
// ═══════════════════════════════════════════════════════════

/// `ceil(total / page_size)`, using `default_size` when the request sets none.
pub fn total_pages_with(total: u64, page_size: Option<u32>, default_size: u32) -> u64 {
    let size = u64::from(page_size.filter(|s| *s > 0).unwrap_or(default_size).max(1));
    total.div_ceil(size)
}

/// `desc` (any case) sorts descending; anything else ascending.
pub fn sort_order(value: Option<&str>) -> SortOrder {
    match value {
        Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
        _ => SortOrder::Asc,
    }
}

/// Body returned by every `DELETE` endpoint.
#[derive(Debug, serde::Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: Uuid,
}

pub fn check_page_size(page_size: Option<u32>) -> Result<(), ApiError> {
    if page_size == Some(0) {
        return Err(ApiError::BadRequest("page_size must be at least 1".into()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Bearer tokens
// ═══════════════════════════════════════════════════════════

/// Hash a bearer token string using SHA-256, hex encoded for storage.
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex() {
        let a = hash_token("secret");
        assert_eq!(a, hash_token("secret"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, hash_token("secret2"));
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn only_admin_passes_admin_check() {
        let admin = CallerContext { staff_id: Uuid::new_v4(), role: Role::Admin };
        let staff = CallerContext { staff_id: Uuid::new_v4(), role: Role::Staff };
        assert!(admin.require_admin().is_ok());
        assert!(matches!(staff.require_admin(), Err(ApiError::Forbidden)));
    }
}
