//! Simulated cash account used by the replay engine.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rulebook_core::types::PositionSide;

/// An open position. Quantity is signed: positive long, negative short.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Commission paid when the position was opened
    pub entry_commission: Decimal,
}

impl Holding {
    pub fn side(&self) -> PositionSide {
        if self.quantity > Decimal::ZERO {
            PositionSide::Long
        } else if self.quantity < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }
}

/// A fill produced by the account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub side: PositionSide,
    /// Unsigned
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    /// Set when the fill closed a position
    pub pnl: Option<Decimal>,
}

/// Cash plus marked-to-market holdings.
#[derive(Debug, Clone)]
pub struct Account {
    cash: Decimal,
    commission: Decimal,
    slippage_pct: Decimal,
    holdings: HashMap<String, Holding>,
    marks: HashMap<String, Decimal>,
}

impl Account {
    pub fn new(initial_capital: Decimal, commission: Decimal, slippage_pct: Decimal) -> Self {
        Self {
            cash: initial_capital,
            commission,
            slippage_pct,
            holdings: HashMap::new(),
            marks: HashMap::new(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    pub fn side(&self, symbol: &str) -> PositionSide {
        self.holding(symbol).map_or(PositionSide::Flat, Holding::side)
    }

    pub fn open_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.holdings.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Update the last traded price of `symbol`.
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        self.marks.insert(symbol.to_string(), price);
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.marks.get(symbol).copied()
    }

    /// Cash plus every holding valued at its last mark.
    pub fn equity(&self) -> Decimal {
        self.holdings
            .iter()
            .map(|(symbol, h)| h.quantity * self.marks.get(symbol).copied().unwrap_or(h.entry_price))
            .fold(self.cash, |acc, value| acc + value)
    }

    /// Price after slippage: buying pays up, selling gives up.
    pub fn slipped(&self, price: Decimal, buying: bool) -> Decimal {
        let slip = self.slippage_pct / dec!(100);
        if buying {
            price * (Decimal::ONE + slip)
        } else {
            price * (Decimal::ONE - slip)
        }
    }

    /// Open a position of `quantity` units. Fails if one is already open.
    pub fn open(
        &mut self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
        market_price: Decimal,
    ) -> Option<Fill> {
        let sign = match side {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
            PositionSide::Flat => return None,
        };
        if quantity <= Decimal::ZERO || self.holdings.contains_key(symbol) {
            return None;
        }

        let price = self.slipped(market_price, side == PositionSide::Long);
        self.cash -= sign * quantity * price + self.commission;
        self.holdings.insert(
            symbol.to_string(),
            Holding {
                quantity: sign * quantity,
                entry_price: price,
                entry_commission: self.commission,
            },
        );

        Some(Fill {
            side,
            quantity,
            price,
            commission: self.commission,
            pnl: None,
        })
    }

    /// Close the open position in `symbol`, applying slippage when `slip`.
    pub fn close(&mut self, symbol: &str, market_price: Decimal, slip: bool) -> Option<Fill> {
        let holding = self.holdings.remove(symbol)?;
        let side = holding.side();

        let buying = side == PositionSide::Short;
        let price = if slip {
            self.slipped(market_price, buying)
        } else {
            market_price
        };

        self.cash += holding.quantity * price - self.commission;
        let pnl = holding.quantity * (price - holding.entry_price)
            - holding.entry_commission
            - self.commission;

        Some(Fill {
            side,
            quantity: holding.quantity.abs(),
            price,
            commission: self.commission,
            pnl: Some(pnl),
        })
    }
}
