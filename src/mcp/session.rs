// src/mcp/session.rs
// Capability Negotiation & Session Store (SPEC_FULL §4.I). Grounded in the
// teacher's `ipc/handler.rs` connection bookkeeping (per-connection id,
// last-activity tracking) and `mcp/mod.rs`'s capability-advertisement
// handshake, generalized into an explicit store with expiry and a
// background reaper instead of an in-process connection map.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// The capability set a session is anonymous and unauthenticated but still
/// permitted to use.
pub const BASIC_CAPABILITY: &str = "basic";

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub client_name: String,
    pub client_version: String,
    pub capabilities: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub auth_context: Option<Value>,
}

impl Session {
    /// Capability negotiation intersects what the client asked for with
    /// what the server actually supports; a client asking for nothing (or
    /// nothing the server recognizes) still gets `basic`.
    fn negotiate(requested: &[String], supported: &HashSet<String>) -> HashSet<String> {
        let mut granted: HashSet<String> =
            requested.iter().filter(|c| supported.contains(c.as_str())).cloned().collect();
        granted.insert(BASIC_CAPABILITY.to_string());
        granted
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.contains(cap)
    }
}

/// Tracks live sessions and reaps ones that have gone quiet past the
/// configured timeout. `now` is always supplied by the caller rather than
/// read internally, keeping this deterministic and independent of wall
/// clock access inside the store itself.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    supported_capabilities: HashSet<String>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(supported_capabilities: HashSet<String>, timeout: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), supported_capabilities, timeout }
    }

    pub fn create_session(
        &self,
        client_name: impl Into<String>,
        client_version: impl Into<String>,
        requested_capabilities: &[String],
        auth_context: Option<Value>,
        now: DateTime<Utc>,
    ) -> Session {
        let id = Uuid::new_v4().to_string();
        let capabilities = Session::negotiate(requested_capabilities, &self.supported_capabilities);
        let session = Session {
            id: id.clone(),
            client_name: client_name.into(),
            client_version: client_version.into(),
            capabilities,
            created_at: now,
            last_seen_at: now,
            auth_context,
        };
        self.sessions.write().expect("session store lock poisoned").insert(id, session.clone());
        session
    }

    /// The capabilities this server supports, for the negotiation response.
    pub fn supported_capabilities(&self) -> &HashSet<String> {
        &self.supported_capabilities
    }

    /// Look up a session, touching its last-seen timestamp. Returns
    /// `SessionExpired` for both a missing id and one that has aged out,
    /// so callers cannot distinguish "never existed" from "expired" (the
    /// wire contract treats them identically).
    pub fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<Session> {
        let mut sessions = self.sessions.write().expect("session store lock poisoned");
        let entry = sessions.get_mut(id).ok_or(AppError::SessionExpired)?;
        if now.signed_duration_since(entry.last_seen_at).to_std().unwrap_or(Duration::ZERO) > self.timeout {
            sessions.remove(id);
            return Err(AppError::SessionExpired);
        }
        entry.last_seen_at = now;
        Ok(entry.clone())
    }

    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions.write().expect("session store lock poisoned").remove(id).is_some()
    }

    /// Remove every session whose last activity is older than the
    /// configured timeout relative to `now`. Returns the count reaped.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().expect("session store lock poisoned");
        let before = sessions.len();
        sessions
            .retain(|_, s| now.signed_duration_since(s.last_seen_at).to_std().unwrap_or(Duration::ZERO) <= self.timeout);
        before - sessions.len()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().expect("session store lock poisoned").len()
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().expect("session store lock poisoned").values().cloned().collect()
    }
}
