//! Engine timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::types::TacticLadder;
use crate::waiting::Poller;

/// How often polls re-check and how the gap grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub interval_ms: u64,
    /// Multiplier applied to the interval after each attempt. 1.0 keeps it fixed.
    pub backoff: f64,
    pub max_interval_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            backoff: 1.0,
            max_interval_ms: 500,
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            backoff: 1.0,
            max_interval_ms: interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Interval following `current`, capped at `max_interval_ms`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let cap = Duration::from_millis(self.max_interval_ms.max(self.interval_ms));
        let grown = (current.as_millis() as f64 * self.backoff.max(1.0)).round() as u64;
        Duration::from_millis(grown).min(cap)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "poll.interval_ms must be greater than zero".into(),
            ));
        }
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "poll.backoff must be >= 1.0, got {}",
                self.backoff
            )));
        }
        Ok(())
    }
}

/// Budgets for one verified action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifiedActionTimeouts {
    pub resolve_ms: u64,
    /// Upper bound for a single tactic attempt.
    pub tactic_ms: u64,
    pub verify_ms: u64,
}

impl Default for VerifiedActionTimeouts {
    fn default() -> Self {
        Self {
            resolve_ms: 5_000,
            tactic_ms: 2_000,
            verify_ms: 3_000,
        }
    }
}

impl VerifiedActionTimeouts {
    pub fn resolve(&self) -> Duration {
        Duration::from_millis(self.resolve_ms)
    }

    pub fn tactic(&self) -> Duration {
        Duration::from_millis(self.tactic_ms)
    }

    pub fn verify(&self) -> Duration {
        Duration::from_millis(self.verify_ms)
    }
}

/// Engine-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll: PollPolicy,
    pub timeouts: VerifiedActionTimeouts,
    /// Delay of every settle-then-native rung. Wins over the value written in `ladder`
    /// once [`EngineConfig::apply_settle`] has run.
    pub settle_ms: u64,
    /// Fraction of a resolution budget handed to the first applicable strategy.
    pub primary_share: f64,
    pub ladder: TacticLadder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let settle_ms = crate::types::DEFAULT_SETTLE_MS;
        Self {
            poll: PollPolicy::default(),
            timeouts: VerifiedActionTimeouts::default(),
            settle_ms,
            primary_share: 0.6,
            ladder: TacticLadder::with_settle(settle_ms),
        }
    }
}

impl EngineConfig {
    pub fn poller(&self) -> Poller {
        Poller::new(self.poll.clone())
    }

    /// Rewrites the ladder's settle rungs to `settle_ms`.
    pub fn apply_settle(&mut self) {
        self.ladder = self.ladder.resettled(self.settle_ms);
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.poll.validate()?;
        if !(self.primary_share > 0.0 && self.primary_share <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "primary_share must be in (0, 1], got {}",
                self.primary_share
            )));
        }
        if self.timeouts.tactic_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "timeouts.tactic_ms must be greater than zero".into(),
            ));
        }
        if self.ladder.tactics().is_empty() {
            return Err(EngineError::InvalidConfig("ladder must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.poll.interval_ms, 250);
        assert_eq!(cfg.timeouts.verify_ms, 3_000);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = PollPolicy {
            interval_ms: 200,
            backoff: 1.5,
            max_interval_ms: 400,
        };
        let second = policy.next_interval(policy.interval());
        assert_eq!(second, Duration::from_millis(300));
        let third = policy.next_interval(second);
        assert_eq!(third, Duration::from_millis(400));
        assert_eq!(policy.next_interval(third), Duration::from_millis(400));
    }

    #[test]
    fn rejects_bad_share_and_interval() {
        let mut cfg = EngineConfig::default();
        cfg.primary_share = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.poll.interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"poll": {"interval_ms": 100}, "primary_share": 0.8}"#).unwrap();
        assert_eq!(cfg.poll.interval_ms, 100);
        assert_eq!(cfg.poll.max_interval_ms, 500);
        assert_eq!(cfg.primary_share, 0.8);
        assert_eq!(cfg.timeouts, VerifiedActionTimeouts::default());
    }

    #[test]
    fn settle_delay_reaches_the_ladder() {
        use crate::types::ActionTactic;

        let mut cfg: EngineConfig = serde_json::from_str(
            r#"{"settle_ms": 750, "ladder": ["synthetic", {"settle_then_native": 100}]}"#,
        )
        .unwrap();
        cfg.apply_settle();
        assert_eq!(
            cfg.ladder.tactics(),
            &[ActionTactic::Synthetic, ActionTactic::SettleThenNative(750)]
        );
    }
}
