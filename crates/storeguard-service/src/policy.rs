//! Action kinds and their limiting policies.
//!
//! The table is built once at startup and only read afterwards, so it is
//! shared across request handlers without any locking.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

const MINUTE: Duration = Duration::from_secs(60);

/// Longest window or block an override may configure (one year).
pub const MAX_POLICY_SECS: u64 = 365 * 24 * 60 * 60;

/// Closed set of operations protected by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Login,
    Register,
    EmailVerification,
    PasswordReset,
    Contact,
    Checkout,
    ImageUpload,
    General,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        Self::Login,
        Self::Register,
        Self::EmailVerification,
        Self::PasswordReset,
        Self::Contact,
        Self::Checkout,
        Self::ImageUpload,
        Self::General,
    ];

    /// Wire name, as used in configuration and URL paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::EmailVerification => "emailVerification",
            Self::PasswordReset => "passwordReset",
            Self::Contact => "contact",
            Self::Checkout => "checkout",
            Self::ImageUpload => "imageUpload",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ServiceError::UnknownActionKind(s.to_string()))
    }
}

/// Limiting parameters for one action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Attempts allowed per window; the next one triggers a block.
    pub max_attempts: u32,
    /// Length of the counting window.
    pub window: Duration,
    /// How long a block lasts once entered.
    pub block_duration: Duration,
}

impl Policy {
    pub const fn new(max_attempts: u32, window: Duration, block_duration: Duration) -> Self {
        Self {
            max_attempts,
            window,
            block_duration,
        }
    }

    const fn minutes(max_attempts: u32, window_minutes: u32, block_minutes: u32) -> Self {
        Self::new(
            max_attempts,
            Duration::from_secs(window_minutes as u64 * MINUTE.as_secs()),
            Duration::from_secs(block_minutes as u64 * MINUTE.as_secs()),
        )
    }
}

/// Mapping from action kind to policy.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<ActionKind, Policy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PolicyTable {
    /// The production thresholds for every action kind.
    pub fn defaults() -> Self {
        Self::empty()
            .with_policy(ActionKind::Login, Policy::minutes(5, 15, 30))
            .with_policy(ActionKind::Register, Policy::minutes(3, 60, 60))
            .with_policy(ActionKind::EmailVerification, Policy::minutes(5, 60, 60))
            .with_policy(ActionKind::PasswordReset, Policy::minutes(3, 60, 60))
            .with_policy(ActionKind::Contact, Policy::minutes(5, 60, 60))
            .with_policy(ActionKind::Checkout, Policy::minutes(10, 5, 15))
            .with_policy(ActionKind::ImageUpload, Policy::minutes(20, 60, 30))
            .with_policy(ActionKind::General, Policy::minutes(100, 1, 5))
    }

    /// A table with no registered kinds.
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// Registers (or replaces) the policy for `kind`.
    #[must_use]
    pub fn with_policy(mut self, kind: ActionKind, policy: Policy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Applies configuration overrides on top of the current table.
    #[must_use]
    pub fn apply_overrides(mut self, overrides: &[PolicyOverride]) -> Self {
        for o in overrides {
            tracing::info!(
                action = %o.kind,
                max_attempts = o.policy.max_attempts,
                window_secs = o.policy.window.as_secs(),
                block_secs = o.policy.block_duration.as_secs(),
                "Policy override applied"
            );
            self.policies.insert(o.kind, o.policy);
        }
        self
    }

    pub fn lookup(&self, kind: ActionKind) -> ServiceResult<Policy> {
        self.policies
            .get(&kind)
            .copied()
            .ok_or_else(|| ServiceError::UnknownActionKind(kind.to_string()))
    }

    /// Registered kinds, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = ActionKind> + '_ {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| self.policies.contains_key(kind))
    }
}

/// A policy replacement supplied through configuration.
///
/// Format: `kind:max_attempts:window_secs:block_secs`, e.g. `login:5:900:1800`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyOverride {
    pub kind: ActionKind,
    pub policy: Policy,
}

impl FromStr for PolicyOverride {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [kind, max, window, block] = parts.as_slice() else {
            return Err(ServiceError::InvalidPolicy(format!(
                "expected kind:max:window_secs:block_secs, got '{s}'"
            )));
        };

        let kind: ActionKind = kind.parse()?;
        let number = |field: &str, raw: &str| -> ServiceResult<u64> {
            let value: u64 = raw
                .parse()
                .map_err(|_| ServiceError::InvalidPolicy(format!("{field} '{raw}' is not a number")))?;
            if value == 0 {
                return Err(ServiceError::InvalidPolicy(format!("{field} must be positive")));
            }
            Ok(value)
        };

        let max_attempts = u32::try_from(number("max_attempts", max)?)
            .map_err(|_| ServiceError::InvalidPolicy(format!("max_attempts '{max}' too large")))?;
        let span = |field: &str, raw: &str| -> ServiceResult<Duration> {
            let secs = number(field, raw)?;
            if secs > MAX_POLICY_SECS {
                return Err(ServiceError::InvalidPolicy(format!(
                    "{field} '{raw}' exceeds {MAX_POLICY_SECS}"
                )));
            }
            Ok(Duration::from_secs(secs))
        };
        let window = span("window_secs", window)?;
        let block_duration = span("block_secs", block)?;

        Ok(Self {
            kind,
            policy: Policy::new(max_attempts, window, block_duration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_kind() {
        let table = PolicyTable::defaults();
        for kind in ActionKind::ALL {
            assert!(table.lookup(kind).is_ok(), "{kind} missing");
        }
        assert_eq!(table.kinds().count(), ActionKind::ALL.len());
    }

    #[test]
    fn default_thresholds() {
        let table = PolicyTable::defaults();
        let login = table.lookup(ActionKind::Login).unwrap();
        assert_eq!(login.max_attempts, 5);
        assert_eq!(login.window, Duration::from_secs(15 * 60));
        assert_eq!(login.block_duration, Duration::from_secs(30 * 60));

        let checkout = table.lookup(ActionKind::Checkout).unwrap();
        assert_eq!(checkout.max_attempts, 10);
        assert_eq!(checkout.window, Duration::from_secs(5 * 60));
        assert_eq!(checkout.block_duration, Duration::from_secs(15 * 60));

        let general = table.lookup(ActionKind::General).unwrap();
        assert_eq!(general.max_attempts, 100);
        assert_eq!(general.window, Duration::from_secs(60));
    }

    #[test]
    fn unregistered_kind_fails() {
        let table = PolicyTable::empty().with_policy(ActionKind::Login, Policy::minutes(1, 1, 1));
        let err = table.lookup(ActionKind::Contact).unwrap_err();
        assert!(matches!(err, ServiceError::UnknownActionKind(k) if k == "contact"));
    }

    #[test]
    fn action_kind_wire_names() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert_eq!(
            serde_json::to_string(&ActionKind::PasswordReset).unwrap(),
            "\"passwordReset\""
        );
        assert!(matches!(
            "Login".parse::<ActionKind>(),
            Err(ServiceError::UnknownActionKind(_))
        ));
    }

    #[test]
    fn parse_override() {
        let o: PolicyOverride = "contact:2:60:120".parse().unwrap();
        assert_eq!(o.kind, ActionKind::Contact);
        assert_eq!(o.policy.max_attempts, 2);
        assert_eq!(o.policy.window, Duration::from_secs(60));
        assert_eq!(o.policy.block_duration, Duration::from_secs(120));

        let table = PolicyTable::defaults().apply_overrides(&[o]);
        assert_eq!(table.lookup(ActionKind::Contact).unwrap().max_attempts, 2);
    }

    #[test]
    fn reject_bad_overrides() {
        assert!(matches!(
            "contact:2:60".parse::<PolicyOverride>(),
            Err(ServiceError::InvalidPolicy(_))
        ));
        assert!(matches!(
            "contact:0:60:60".parse::<PolicyOverride>(),
            Err(ServiceError::InvalidPolicy(_))
        ));
        assert!(matches!(
            "contact:x:60:60".parse::<PolicyOverride>(),
            Err(ServiceError::InvalidPolicy(_))
        ));
        assert!(matches!(
            "wishlist:1:60:60".parse::<PolicyOverride>(),
            Err(ServiceError::UnknownActionKind(_))
        ));
    }

    #[test]
    fn reject_overlong_durations() {
        for raw in [
            "login:5:18446744073709551615:60",
            "login:5:60:18446744073709551615",
            "login:5:31536001:60",
        ] {
            assert!(
                matches!(raw.parse::<PolicyOverride>(), Err(ServiceError::InvalidPolicy(_))),
                "{raw}"
            );
        }
        let o: PolicyOverride = format!("login:5:{MAX_POLICY_SECS}:{MAX_POLICY_SECS}")
            .parse()
            .unwrap();
        assert_eq!(o.policy.window.as_secs(), MAX_POLICY_SECS);
    }
}
