//! Percentage stop-loss / take-profit applied by a rule to its own position.

use serde::{Deserialize, Serialize};
use rulebook_core::error::StrategyError;
use rulebook_core::types::PositionSide;

/// Protection levels as percentages of the entry price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Close when price moves this many percent against the position
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    /// Close when price moves this many percent in favour of the position
    #[serde(default)]
    pub take_profit_pct: Option<f64>,
}

impl ProtectionConfig {
    pub fn stop_loss(pct: f64) -> Self {
        Self {
            stop_loss_pct: Some(pct),
            take_profit_pct: None,
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        for (label, pct) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
        ] {
            if let Some(pct) = pct {
                if !(pct > 0.0 && pct < 100.0) {
                    return Err(StrategyError::InvalidConfig(format!(
                        "{} must be in (0, 100), got {}",
                        label, pct
                    )));
                }
            }
        }
        Ok(())
    }

    /// Stop and target prices for a position opened at `entry`.
    pub fn levels(&self, side: PositionSide, entry: f64) -> (Option<f64>, Option<f64>) {
        let sign = match side {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
            PositionSide::Flat => return (None, None),
        };
        let stop = self
            .stop_loss_pct
            .map(|pct| entry * (1.0 - sign * pct / 100.0));
        let target = self
            .take_profit_pct
            .map(|pct| entry * (1.0 + sign * pct / 100.0));
        (stop, target)
    }
}

/// Why protection fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProtectionTrigger {
    StopLoss { level: f64 },
    TakeProfit { level: f64 },
}

/// Tracks the open entry and checks closes against its levels.
#[derive(Debug, Clone, Default)]
pub struct Protection {
    config: ProtectionConfig,
    entry: Option<(PositionSide, f64)>,
}

impl Protection {
    pub fn new(config: ProtectionConfig) -> Self {
        Self {
            config,
            entry: None,
        }
    }

    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    pub fn on_entry(&mut self, side: PositionSide, price: f64) {
        self.entry = (!side.is_flat()).then_some((side, price));
    }

    pub fn on_exit(&mut self) {
        self.entry = None;
    }

    /// Stop and target for the open entry, if any.
    pub fn active_levels(&self) -> (Option<f64>, Option<f64>) {
        match self.entry {
            Some((side, entry)) => self.config.levels(side, entry),
            None => (None, None),
        }
    }

    /// Check a close against the open entry. Stop-loss wins if both fire.
    pub fn check(&self, close: f64) -> Option<ProtectionTrigger> {
        let (side, _) = self.entry?;
        let (stop, target) = self.active_levels();
        let long = side == PositionSide::Long;

        if let Some(level) = stop {
            if (long && close <= level) || (!long && close >= level) {
                return Some(ProtectionTrigger::StopLoss { level });
            }
        }
        if let Some(level) = target {
            if (long && close >= level) || (!long && close <= level) {
                return Some(ProtectionTrigger::TakeProfit { level });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both(stop: f64, take: f64) -> ProtectionConfig {
        ProtectionConfig {
            stop_loss_pct: Some(stop),
            take_profit_pct: Some(take),
        }
    }

    #[test]
    fn test_levels() {
        let cfg = both(2.0, 5.0);
        let (stop, take) = cfg.levels(PositionSide::Long, 100.0);
        assert!((stop.unwrap() - 98.0).abs() < 1e-9);
        assert!((take.unwrap() - 105.0).abs() < 1e-9);

        let (stop, take) = cfg.levels(PositionSide::Short, 100.0);
        assert!((stop.unwrap() - 102.0).abs() < 1e-9);
        assert!((take.unwrap() - 95.0).abs() < 1e-9);

        assert_eq!(cfg.levels(PositionSide::Flat, 100.0), (None, None));
    }

    #[test]
    fn test_long_triggers() {
        let mut protection = Protection::new(both(2.0, 5.0));
        protection.on_entry(PositionSide::Long, 100.0);

        assert_eq!(protection.check(99.0), None);
        assert!(matches!(protection.check(97.5), Some(ProtectionTrigger::StopLoss { .. })));
        assert!(matches!(protection.check(106.0), Some(ProtectionTrigger::TakeProfit { .. })));

        protection.on_exit();
        assert_eq!(protection.check(50.0), None);
    }

    #[test]
    fn test_short_triggers() {
        let mut protection = Protection::new(ProtectionConfig::stop_loss(1.0));
        protection.on_entry(PositionSide::Short, 200.0);

        assert_eq!(protection.check(150.0), None);
        assert!(matches!(protection.check(202.5), Some(ProtectionTrigger::StopLoss { .. })));
    }

    #[test]
    fn test_validate() {
        assert!(ProtectionConfig::default().validate().is_ok());
        assert!(ProtectionConfig::stop_loss(0.0).validate().is_err());
        assert!(both(2.0, 150.0).validate().is_err());
    }
}
