//! Short-lived storage for OAuth state, PKCE verifiers and fresh credentials.
//!
//! Entries expire after a fixed TTL. Expired entries are invisible to reads
//! and dropped by [`PendingStore::purge_expired`], which the server runs on
//! an interval.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tether_core::{IntegrationType, OrgId, UserId};
use tokio::sync::RwLock;

/// What a pending entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    State,
    Verifier,
    Credentials,
}

impl PendingKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Verifier => "verifier",
            Self::Credentials => "credentials",
        }
    }
}

/// Identifies one pending entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub kind: PendingKind,
    pub integration_type: IntegrationType,
    pub org_id: OrgId,
    pub user_id: UserId,
}

impl PendingKey {
    /// Creates a key.
    #[must_use]
    pub fn new(
        kind: PendingKind,
        integration_type: IntegrationType,
        org_id: OrgId,
        user_id: UserId,
    ) -> Self {
        Self {
            kind,
            integration_type,
            org_id,
            user_id,
        }
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}:{}:{}",
            self.integration_type,
            self.kind.as_str(),
            self.org_id,
            self.user_id
        )
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// In-memory pending-entry store shared by all handlers.
#[derive(Debug, Clone)]
pub struct PendingStore {
    entries: Arc<RwLock<HashMap<PendingKey, Entry>>>,
    ttl: TimeDelta,
}

impl PendingStore {
    /// Creates an empty store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Creates a store from a TTL in seconds.
    #[must_use]
    pub fn with_ttl_seconds(seconds: u64) -> Self {
        let ttl = i64::try_from(seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self::new(ttl)
    }

    /// Stores `value`, replacing any previous entry for `key`.
    pub async fn put(&self, key: PendingKey, value: String) {
        self.put_at(key, value, Utc::now()).await;
    }

    pub(crate) async fn put_at(&self, key: PendingKey, value: String, now: DateTime<Utc>) {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        tracing::debug!(key = %key, %expires_at, "storing pending entry");
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    /// Reads an unexpired entry.
    pub async fn get(&self, key: &PendingKey) -> Option<String> {
        self.get_at(key, Utc::now()).await
    }

    pub(crate) async fn get_at(&self, key: &PendingKey, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Removes an entry, returning it if it had not expired.
    pub async fn take(&self, key: &PendingKey) -> Option<String> {
        self.take_at(key, Utc::now()).await
    }

    pub(crate) async fn take_at(&self, key: &PendingKey, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .write()
            .await
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
    }

    /// Removes an entry.
    pub async fn remove(&self, key: &PendingKey) {
        self.entries.write().await.remove(key);
    }

    /// Drops every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub(crate) async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: PendingKind) -> PendingKey {
        PendingKey::new(
            kind,
            IntegrationType::Hubspot,
            OrgId::new("TestOrg").expect("org"),
            UserId::new("TestUser").expect("user"),
        )
    }

    fn store() -> PendingStore {
        PendingStore::with_ttl_seconds(600)
    }

    #[test]
    fn key_display_matches_namespaced_layout() {
        assert_eq!(
            key(PendingKind::Verifier).to_string(),
            "hubspot_verifier:TestOrg:TestUser"
        );
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = store();
        store.put(key(PendingKind::State), "abc".to_string()).await;

        assert_eq!(
            store.get(&key(PendingKind::State)).await.as_deref(),
            Some("abc")
        );
        assert!(store.get(&key(PendingKind::Verifier)).await.is_none());
    }

    #[tokio::test]
    async fn take_is_one_shot() {
        let store = store();
        store
            .put(key(PendingKind::Credentials), "{}".to_string())
            .await;

        assert!(store.take(&key(PendingKind::Credentials)).await.is_some());
        assert!(store.take(&key(PendingKind::Credentials)).await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let store = store();
        let now = Utc::now();
        store
            .put_at(key(PendingKind::State), "abc".to_string(), now)
            .await;

        let later = now + TimeDelta::seconds(601);
        assert!(store.get_at(&key(PendingKind::State), later).await.is_none());
        assert!(
            store
                .take_at(&key(PendingKind::State), later)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = store();
        let now = Utc::now();
        store
            .put_at(key(PendingKind::State), "old".to_string(), now)
            .await;
        store
            .put_at(
                key(PendingKind::Verifier),
                "new".to_string(),
                now + TimeDelta::seconds(300),
            )
            .await;

        let purged = store
            .purge_expired_at(now + TimeDelta::seconds(700))
            .await;
        assert_eq!(purged, 1);
        assert!(
            store
                .get_at(&key(PendingKind::Verifier), now + TimeDelta::seconds(700))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn put_replaces_previous_value() {
        let store = store();
        store.put(key(PendingKind::State), "first".to_string()).await;
        store
            .put(key(PendingKind::State), "second".to_string())
            .await;

        assert_eq!(
            store.get(&key(PendingKind::State)).await.as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn remove_deletes_entry() {
        let store = store();
        store.put(key(PendingKind::State), "abc".to_string()).await;
        store.remove(&key(PendingKind::State)).await;
        assert!(store.get(&key(PendingKind::State)).await.is_none());
    }
}
