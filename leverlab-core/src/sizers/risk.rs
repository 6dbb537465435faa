//! Risk-based sizing: size the entry so that hitting the stop loss loses a
//! fixed amount of quote currency per stacked trade.
//!
//! The target loss is `trunc(risk) * total_trades`, where `total_trades`
//! counts this entry. When a position is already open the size is re-solved
//! so that the *combined* position loses exactly that at the stop loss.

use crate::sizers::{EntryAmount, Sizer, SizingContext};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Risk {
    /// Fixed quote amount.
    Amount(f64),
    /// Fraction of current equity.
    PctAccount(f64),
}

#[derive(Debug, Clone)]
pub struct RiskSizer {
    risk: Risk,
}

impl RiskSizer {
    pub fn amount(amount: f64) -> Self {
        Self {
            risk: Risk::Amount(amount),
        }
    }

    pub fn pct_account(pct: f64) -> Self {
        Self {
            risk: Risk::PctAccount(pct),
        }
    }

    /// Loss allowed on the combined position after this entry.
    pub fn target_loss(&self, equity: f64, total_trades: u32) -> f64 {
        let per_trade = match self.risk {
            Risk::Amount(amount) => amount,
            Risk::PctAccount(pct) => equity * pct,
        };
        per_trade.trunc() * f64::from(total_trades)
    }
}

impl Sizer for RiskSizer {
    fn size(&self, ctx: &SizingContext<'_>) -> EntryAmount {
        let Some(sl_price) = ctx.sl_price else {
            return EntryAmount::Usd(0.0);
        };
        let loss = self.target_loss(ctx.equity, ctx.total_trades + 1);
        let fee = ctx.exchange.market_fee_pct;
        let usd = if ctx.is_adding() {
            ctx.direction.entry_size_adding(
                ctx.average_entry,
                ctx.position_size_usd,
                ctx.entry_price,
                sl_price,
                loss,
                fee,
            )
        } else {
            ctx.direction
                .entry_size_flat(ctx.entry_price, sl_price, loss, fee)
        };
        EntryAmount::Usd(usd)
    }

    fn name(&self) -> &str {
        match self.risk {
            Risk::Amount(_) => "RiskAmount",
            Risk::PctAccount(_) => "RiskPctAccount",
        }
    }
}
