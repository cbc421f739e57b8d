use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::platform::Platform;
use crate::storage::Store;

/// Bumped whenever the persisted envelope changes shape.
pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Settings a user picked in a tool's form before leaving for the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingModalState {
    pub settings: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl PendingModalState {
    pub fn new(settings: BTreeMap<String, Value>) -> Self {
        Self {
            settings,
            timestamp: Utc::now(),
        }
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    expires_at: DateTime<Utc>,
    state: PendingModalState,
}

/// One pending record per platform, last write wins.
pub struct PendingStore {
    store: Arc<Store>,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(store: Arc<Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn save(&self, platform: Platform, state: &PendingModalState) -> Result<()> {
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| state.timestamp.checked_add_signed(ttl))
            .with_context(|| format!("pending: ttl {:?} overflows the expiry time", self.ttl))?;
        let envelope = Envelope {
            version: SCHEMA_VERSION,
            expires_at,
            state: state.clone(),
        };
        let encoded = serde_json::to_string(&envelope).context("pending: encode state")?;
        self.store.set(&platform.return_state_key(), &encoded)?;
        debug!(%platform, "saved pending state");
        Ok(())
    }

    pub fn take(&self, platform: Platform) -> Result<Option<PendingModalState>> {
        self.take_at(platform, Utc::now())
    }

    /// Consumes the record for `platform`. Records from another schema
    /// version, past their expiry, or that fail to decode are deleted and
    /// reported as absent.
    pub fn take_at(
        &self,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingModalState>> {
        let Some(raw) = self.store.take(&platform.return_state_key())? else {
            return Ok(None);
        };
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%platform, error = %err, "discarding unreadable pending state");
                return Ok(None);
            }
        };
        if envelope.version != SCHEMA_VERSION {
            warn!(%platform, version = envelope.version, "discarding pending state from another schema");
            return Ok(None);
        }
        if envelope.expires_at <= now {
            warn!(%platform, expired_at = %envelope.expires_at, "discarding stale pending state");
            return Ok(None);
        }
        Ok(Some(envelope.state))
    }

    pub fn clear(&self, platform: Platform) -> Result<()> {
        self.store.remove(&platform.return_state_key())?;
        Ok(())
    }
}
