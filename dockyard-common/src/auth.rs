//! Inter-node authentication
//!
//! Every master <-> worker call carries two headers: the caller's node id and a token
//! `hex(HMAC-SHA256(secret, "<node_id>:<YYYY-MM-DD HH:MM>"))` stamped with the current
//! UTC minute. All nodes share one cluster secret, read from `NODE_SECRET`.
//!
//! Acceptance depends on the [`VerifyPolicy`]:
//! - `HourStepped` checks the minutes `now - 1h`, `now`, `now + 1h` only. A token is
//!   therefore accepted during the minute it was minted and nowhere else within the hour.
//! - `Sliding` accepts any token minted within `skew_minutes` of `now`, either side.
//!
//! Both policies verify the same token format, so a master and its workers can run
//! different policies without breaking each other.

use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub const NODE_ID_HEADER: &str = "x-node-id";
pub const NODE_TOKEN_HEADER: &str = "x-node-token";

/// Environment variable holding the cluster secret.
pub const SECRET_ENV: &str = "NODE_SECRET";

/// Well-known fallback secret. Only meant for bring-up on a trusted network.
pub const DEFAULT_NODE_SECRET: &str = "dockyard-node-secret-change-in-production";

const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Which minute stamps a verifier accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VerifyPolicy {
    /// Legacy rule: exactly the minutes at `now - 1h`, `now` and `now + 1h`.
    HourStepped,
    /// Every minute in `[now - skew_minutes, now + skew_minutes]`.
    Sliding { skew_minutes: u32 },
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        VerifyPolicy::Sliding { skew_minutes: 2 }
    }
}

impl VerifyPolicy {
    /// Instants whose minute stamp is accepted when verifying at `now`.
    fn candidates(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        match *self {
            VerifyPolicy::HourStepped => (-1..=1).map(|h| now + Duration::hours(h)).collect(),
            VerifyPolicy::Sliding { skew_minutes } => {
                let skew = i64::from(skew_minutes);
                (-skew..=skew).map(|m| now + Duration::minutes(m)).collect()
            }
        }
    }
}

/// Mints and verifies node tokens from the shared cluster secret.
pub struct NodeAuthenticator {
    key: hmac::Key,
    policy: VerifyPolicy,
}

impl fmt::Debug for NodeAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeAuthenticator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl NodeAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>, policy: VerifyPolicy) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref()),
            policy,
        }
    }

    /// Build from `NODE_SECRET`, falling back to [`DEFAULT_NODE_SECRET`] when unset.
    pub fn from_env(policy: VerifyPolicy) -> Self {
        match std::env::var(SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Self::new(secret, policy),
            _ => {
                warn!(
                    "{} is not set, using the built-in default node secret; set it before exposing this node",
                    SECRET_ENV
                );
                Self::new(DEFAULT_NODE_SECRET, policy)
            }
        }
    }

    pub fn policy(&self) -> VerifyPolicy {
        self.policy
    }

    /// Token for `node_id` at the current minute.
    pub fn mint(&self, node_id: &str) -> String {
        self.mint_at(node_id, Utc::now())
    }

    pub fn mint_at(&self, node_id: &str, at: DateTime<Utc>) -> String {
        let tag = hmac::sign(&self.key, signing_input(node_id, at).as_bytes());
        hex::encode(tag.as_ref())
    }

    pub fn verify(&self, node_id: &str, token: &str) -> bool {
        self.verify_at(node_id, token, Utc::now())
    }

    /// Constant-time check of `token` against every candidate minute of the policy.
    pub fn verify_at(&self, node_id: &str, token: &str, now: DateTime<Utc>) -> bool {
        let Ok(presented) = hex::decode(token) else {
            return false;
        };

        self.policy.candidates(now).into_iter().any(|instant| {
            hmac::verify(&self.key, signing_input(node_id, instant).as_bytes(), &presented).is_ok()
        })
    }
}

/// Compares a presented shared key with the expected one without leaking where they
/// differ. Both sides are hashed first, so lengths do not leak either.
pub fn keys_match(presented: &str, expected: &str) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, b"dockyard-key-compare");
    let tag = hmac::sign(&key, expected.as_bytes());
    hmac::verify(&key, presented.as_bytes(), tag.as_ref()).is_ok()
}

fn signing_input(node_id: &str, at: DateTime<Utc>) -> String {
    format!("{}:{}", node_id, at.format(MINUTE_FORMAT))
}
