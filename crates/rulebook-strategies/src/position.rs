//! Per-symbol position bookkeeping shared by the rules.
//!
//! Rules decide on a desired exposure ([`Bias`]); the tracker turns that into
//! the signal that moves the current side there, applies protection, and
//! records the new side.

use rulebook_core::types::{Bar, PositionSide, Signal, SignalMetadata, SignalStrength, SignalType};
use tracing::debug;

use crate::protection::{Protection, ProtectionConfig, ProtectionTrigger};

/// Exposure a rule wants after the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bias {
    Long,
    Short,
    Flat,
    /// Keep whatever is open
    Stay,
}

/// What a signal is attached to.
pub(crate) struct SignalContext<'a> {
    pub strategy: &'a str,
    pub symbol: &'a str,
    pub bar: &'a Bar,
    pub indicators: &'a [(&'static str, f64)],
}

impl SignalContext<'_> {
    fn metadata(&self, reason: String) -> SignalMetadata {
        SignalMetadata {
            strategy_name: self.strategy.to_string(),
            indicators: self
                .indicators
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            reason,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PositionTracker {
    side: PositionSide,
    protection: Protection,
}

impl PositionTracker {
    pub fn new(protection: ProtectionConfig) -> Self {
        Self {
            side: PositionSide::Flat,
            protection: Protection::new(protection),
        }
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    /// Close the open position if the bar's close breached a protection level.
    pub fn protect(&mut self, ctx: &SignalContext<'_>) -> Option<Signal> {
        let trigger = self.protection.check(ctx.bar.close)?;
        let close = self.side.close_signal()?;

        let reason = match trigger {
            ProtectionTrigger::StopLoss { level } => {
                format!("Stop-loss hit: close {:.4} beyond {:.4}", ctx.bar.close, level)
            }
            ProtectionTrigger::TakeProfit { level } => {
                format!("Take-profit hit: close {:.4} beyond {:.4}", ctx.bar.close, level)
            }
        };
        Some(self.emit(ctx, close, SignalStrength::Strong, 1.0, reason))
    }

    /// Emit the signal that moves the position toward `bias`, if any.
    ///
    /// Without `allow_short` a short bias only flattens a long.
    pub fn act(
        &mut self,
        ctx: &SignalContext<'_>,
        bias: Bias,
        allow_short: bool,
        strength: SignalStrength,
        confidence: f64,
        reason: String,
    ) -> Option<Signal> {
        let signal_type = match (bias, self.side) {
            (Bias::Stay, _) => return None,
            (Bias::Long, PositionSide::Long) => return None,
            (Bias::Long, _) => SignalType::Buy,
            (Bias::Short, PositionSide::Short) => return None,
            (Bias::Short, _) if allow_short => SignalType::Sell,
            (Bias::Short, side) | (Bias::Flat, side) => side.close_signal()?,
        };
        Some(self.emit(ctx, signal_type, strength, confidence, reason))
    }

    fn emit(
        &mut self,
        ctx: &SignalContext<'_>,
        signal_type: SignalType,
        strength: SignalStrength,
        confidence: f64,
        reason: String,
    ) -> Signal {
        let mut metadata = ctx.metadata(reason);

        self.side = self.side.after(signal_type);
        if signal_type.is_entry() {
            self.protection.on_entry(self.side, ctx.bar.close);
            let (stop_loss, take_profit) = self.protection.active_levels();
            metadata.stop_loss = stop_loss;
            metadata.take_profit = take_profit;
        } else {
            self.protection.on_exit();
        }

        debug!(
            strategy = ctx.strategy,
            symbol = ctx.symbol,
            signal = %signal_type,
            price = ctx.bar.close,
            reason = %metadata.reason,
            "Signal"
        );

        Signal::at_bar(ctx.symbol, signal_type, strength, ctx.bar, confidence, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(bar: &Bar) -> SignalContext<'_> {
        SignalContext {
            strategy: "test",
            symbol: "TEST",
            bar,
            indicators: &[("x", 1.0)],
        }
    }

    fn act(tracker: &mut PositionTracker, bar: &Bar, bias: Bias, allow_short: bool) -> Option<SignalType> {
        tracker
            .act(&ctx(bar), bias, allow_short, SignalStrength::Weak, 0.5, String::new())
            .map(|s| s.signal_type)
    }

    #[test]
    fn test_bias_transitions() {
        let bar = Bar::flat(0, 100.0);
        let mut tracker = PositionTracker::new(ProtectionConfig::default());

        assert_eq!(act(&mut tracker, &bar, Bias::Flat, true), None);
        assert_eq!(act(&mut tracker, &bar, Bias::Long, true), Some(SignalType::Buy));
        assert_eq!(act(&mut tracker, &bar, Bias::Long, true), None);
        assert_eq!(act(&mut tracker, &bar, Bias::Stay, true), None);
        assert_eq!(act(&mut tracker, &bar, Bias::Short, true), Some(SignalType::Sell));
        assert_eq!(tracker.side(), PositionSide::Short);
        assert_eq!(act(&mut tracker, &bar, Bias::Flat, true), Some(SignalType::CloseShort));
        assert!(tracker.side().is_flat());
    }

    #[test]
    fn test_short_bias_without_shorting() {
        let bar = Bar::flat(0, 100.0);
        let mut tracker = PositionTracker::new(ProtectionConfig::default());

        assert_eq!(act(&mut tracker, &bar, Bias::Short, false), None);
        act(&mut tracker, &bar, Bias::Long, false);
        assert_eq!(act(&mut tracker, &bar, Bias::Short, false), Some(SignalType::CloseLong));
        assert!(tracker.side().is_flat());
    }

    #[test]
    fn test_entry_carries_levels_and_protection_fires() {
        let mut tracker = PositionTracker::new(ProtectionConfig::stop_loss(2.0));
        let entry = Bar::flat(0, 100.0);

        let signal = tracker
            .act(&ctx(&entry), Bias::Long, true, SignalStrength::Weak, 0.5, String::new())
            .unwrap();
        assert!((signal.metadata.stop_loss.unwrap() - 98.0).abs() < 1e-9);
        assert_eq!(signal.metadata.indicators.get("x"), Some(&1.0));

        assert!(tracker.protect(&ctx(&Bar::flat(1, 99.0))).is_none());

        let exit = tracker.protect(&ctx(&Bar::flat(2, 97.0))).unwrap();
        assert_eq!(exit.signal_type, SignalType::CloseLong);
        assert!(tracker.side().is_flat());
        assert!(tracker.protect(&ctx(&Bar::flat(3, 90.0))).is_none());
    }
}
