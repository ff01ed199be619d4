//! Engine tunables.
//!
//! Every struct here deserializes with defaults, so a settings file only
//! needs to mention what it overrides.

use std::time::Duration;

use serde::Deserialize;

/// Account codes used by the default line builders.
///
/// Defaults follow the stock chart of accounts (`1101` cash, `1201`
/// receivables, `4101` revenue, ...).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostingAccounts {
    pub cash: String,
    pub bank: String,
    /// Tax withheld by customers, claimable later.
    pub prepaid_tax: String,
    pub receivable: String,
    pub inventory: String,
    pub input_tax: String,
    pub payable: String,
    pub output_tax: String,
    /// Target of `close_period`.
    pub retained_earnings: String,
    pub revenue: String,
    pub shipping_revenue: String,
    pub cogs: String,
}

impl Default for PostingAccounts {
    fn default() -> Self {
        Self {
            cash: "1101".to_string(),
            bank: "1102".to_string(),
            prepaid_tax: "1114".to_string(),
            receivable: "1201".to_string(),
            inventory: "1301".to_string(),
            input_tax: "1240".to_string(),
            payable: "2101".to_string(),
            output_tax: "2103".to_string(),
            retained_earnings: "3201".to_string(),
            revenue: "4101".to_string(),
            shipping_revenue: "4102".to_string(),
            cogs: "5101".to_string(),
        }
    }
}

/// Retry policy applied to postings that hit database contention.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
        }
    }
}

impl RetrySettings {
    /// Exponential backoff: `base * 2^attempt`, attempt starting at 0.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub accounts: PostingAccounts,
    pub retry: RetrySettings,
}

/// Background reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    pub interval_secs: u64,
    /// Run `resync` when drift is found. Off unless explicitly enabled.
    pub auto_correct: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            auto_correct: false,
        }
    }
}

impl ReconcilerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let retry = RetrySettings {
            max_attempts: 3,
            base_delay_ms: 10,
        };
        assert_eq!(retry.delay(0), Duration::from_millis(10));
        assert_eq!(retry.delay(1), Duration::from_millis(20));
        assert_eq!(retry.delay(3), Duration::from_millis(80));
    }

    #[test]
    fn reconciler_is_read_only_by_default() {
        let settings = ReconcilerSettings::default();
        assert!(!settings.auto_correct);
        assert_eq!(settings.interval(), Duration::from_secs(300));
    }
}
