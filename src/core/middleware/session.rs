//! Admin session management.
//!
//! Opaque random tokens held server-side in a concurrent map. Admin keys are
//! kept only as SHA-256 digests and compared in constant time.

use crate::config::{NexusError, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use papaya::HashMap;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::{Choice, ConstantTimeEq};
use tracing::{debug, info};

pub const SESSION_COOKIE_NAME: &str = "nexus_admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub token: String,
    pub created_at: u64,
    pub origin_ip: String,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub struct SessionStore {
    sessions: HashMap<String, AdminSession>,
    key_digests: Vec<Vec<u8>>,
    ttl_secs: u64,
}

impl SessionStore {
    #[must_use]
    pub fn new(admin_keys: &[String], ttl_secs: u64) -> Self {
        let key_digests = admin_keys
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| Sha256::digest(k.as_bytes()).to_vec())
            .collect();

        Self {
            sessions: HashMap::new(),
            key_digests,
            ttl_secs,
        }
    }

    #[must_use]
    pub const fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn key_matches(&self, presented: &str) -> bool {
        let digest = Sha256::digest(presented.as_bytes());
        let mut matched = Choice::from(0);
        for known in &self.key_digests {
            matched |= known.as_slice().ct_eq(digest.as_slice());
        }
        bool::from(matched)
    }

    const fn is_expired(&self, session: &AdminSession, now: u64) -> bool {
        now.saturating_sub(session.created_at) >= self.ttl_secs
    }

    /// Exchanges a valid admin key for a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when `presented_key` is empty or unknown.
    pub fn authenticate(&self, presented_key: &str, origin_ip: &str) -> Result<AdminSession> {
        if presented_key.is_empty() || !self.key_matches(presented_key) {
            info!(client_ip = %origin_ip, action = "DENY", "Admin key rejected");
            return Err(NexusError::Forbidden("Invalid admin key.".to_string()));
        }

        let session = AdminSession {
            token: generate_session_id(),
            created_at: now_secs(),
            origin_ip: origin_ip.to_string(),
        };
        self.sessions
            .pin()
            .insert(session.token.clone(), session.clone());

        info!(client_ip = %origin_ip, "Admin session created");
        Ok(session)
    }

    /// Looks up a live session. Expired sessions are evicted on lookup.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the token is absent, unknown or expired.
    pub fn validate(&self, token: Option<&str>) -> Result<AdminSession> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Err(NexusError::Unauthorized);
        };

        let sessions = self.sessions.pin();
        let Some(session) = sessions.get(token) else {
            return Err(NexusError::Unauthorized);
        };

        if self.is_expired(session, now_secs()) {
            debug!(client_ip = %session.origin_ip, "Admin session expired");
            sessions.remove(token);
            return Err(NexusError::Unauthorized);
        }

        Ok(session.clone())
    }

    /// Removes `token`. Returns whether a session was removed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.pin().remove(token).is_some()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        let now = now_secs();
        self.sessions
            .pin()
            .iter()
            .filter(|(_, s)| !self.is_expired(s, now))
            .count()
    }

    pub fn purge_expired(&self) {
        let now = now_secs();
        self.sessions.pin().retain(|_, s| !self.is_expired(s, now));
    }
}

#[must_use]
pub fn generate_session_id() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

#[must_use]
pub fn format_set_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly{secure_flag}; SameSite=Strict; Path=/; Max-Age={max_age}")
}

#[must_use]
pub fn format_clear_cookie(name: &str, secure: bool) -> String {
    format_set_cookie(name, "", 0, secure)
}

/// Finds cookie `name` in a `Cookie` request header value.
#[must_use]
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|cookie| {
        let (k, v) = cookie.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}
