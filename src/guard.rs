use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::auth::AuthStatus;
use crate::error::{AuthError, Result};
use crate::platform::Platform;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(2000);

/// Keeps a single-use authorization code from being exchanged twice.
///
/// One record per platform: the identifier last handed to the backend, when
/// that exchange started, and its result once known. An identical
/// identifier is never forwarded again; a completed one replays its cached
/// result instead.
pub struct ExchangeGuard {
    min_interval: Duration,
    records: Mutex<HashMap<Platform, Record>>,
}

struct Record {
    identifier: String,
    started_at: Instant,
    outcome: Option<Result<AuthStatus>>,
}

impl Default for ExchangeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl ExchangeGuard {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn exchange<F>(&self, platform: Platform, identifier: &str, f: F) -> Result<AuthStatus>
    where
        F: FnOnce() -> Result<AuthStatus>,
    {
        self.exchange_at(Instant::now(), platform, identifier, f)
    }

    pub fn exchange_at<F>(
        &self,
        now: Instant,
        platform: Platform,
        identifier: &str,
        f: F,
    ) -> Result<AuthStatus>
    where
        F: FnOnce() -> Result<AuthStatus>,
    {
        {
            let mut records = self.records.lock();
            if let Some(record) = records.get(&platform) {
                if record.identifier == identifier {
                    return match &record.outcome {
                        Some(outcome) => {
                            debug!(%platform, "replaying cached exchange result");
                            outcome.clone()
                        }
                        None => {
                            warn!(%platform, "exchange already in flight");
                            Err(AuthError::InProgress)
                        }
                    };
                }
                if record.outcome.is_none() {
                    warn!(%platform, "another exchange is in flight");
                    return Err(AuthError::InProgress);
                }
                if now.saturating_duration_since(record.started_at) < self.min_interval {
                    warn!(%platform, "exchange attempted inside minimum interval");
                    return Err(AuthError::TooSoon);
                }
            }
            records.insert(
                platform,
                Record {
                    identifier: identifier.to_string(),
                    started_at: now,
                    outcome: None,
                },
            );
        }

        let outcome = f();

        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(&platform) {
            if record.identifier == identifier {
                record.outcome = Some(outcome.clone());
            }
        }
        outcome
    }

    pub fn is_in_flight(&self, platform: Platform) -> bool {
        self.records
            .lock()
            .get(&platform)
            .map(|record| record.outcome.is_none())
            .unwrap_or(false)
    }
}
