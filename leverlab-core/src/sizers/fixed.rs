//! Sizers that do not depend on the stop loss.

use crate::sizers::{EntryAmount, Sizer, SizingContext};

/// Fixed quote amount per entry.
///
/// The amount is capped at what the exchange's max order size buys at the
/// entry price, so an infinite amount enters at that cap.
#[derive(Debug, Clone)]
pub struct AmountSizer {
    amount: f64,
}

impl AmountSizer {
    pub fn new(amount: f64) -> Self {
        Self { amount }
    }
}

impl Sizer for AmountSizer {
    fn size(&self, ctx: &SizingContext<'_>) -> EntryAmount {
        let cap = ctx.exchange.max_asset_size * ctx.entry_price;
        EntryAmount::Usd(self.amount.min(cap))
    }

    fn name(&self) -> &str {
        "Amount"
    }
}

/// A fraction of current equity per entry.
#[derive(Debug, Clone)]
pub struct PctAccountSizer {
    pct: f64,
}

impl PctAccountSizer {
    pub fn new(pct: f64) -> Self {
        Self { pct }
    }
}

impl Sizer for PctAccountSizer {
    fn size(&self, ctx: &SizingContext<'_>) -> EntryAmount {
        EntryAmount::Usd(ctx.equity * self.pct)
    }

    fn name(&self) -> &str {
        "PctAccount"
    }
}

/// The exchange's minimum order size, in asset units.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallestAssetSizer;

impl Sizer for SmallestAssetSizer {
    fn size(&self, ctx: &SizingContext<'_>) -> EntryAmount {
        EntryAmount::Asset(ctx.exchange.min_asset_size)
    }

    fn name(&self) -> &str {
        "SmallestEntrySizeAsset"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Side;
    use crate::settings::ExchangeSettings;

    fn ctx(ex: &ExchangeSettings, position_size_usd: f64) -> SizingContext<'_> {
        SizingContext {
            direction: Side::Long.direction(),
            exchange: ex,
            equity: 2000.0,
            entry_price: 50.0,
            sl_price: None,
            average_entry: if position_size_usd > 0.0 { 50.0 } else { 0.0 },
            position_size_usd,
            position_size_asset: position_size_usd / 50.0,
            total_trades: 0,
        }
    }

    #[test]
    fn amount_is_capped_by_max_asset_size() {
        let ex = ExchangeSettings {
            max_asset_size: 2.0,
            ..ExchangeSettings::default()
        };
        assert_eq!(AmountSizer::new(500.0).size(&ctx(&ex, 0.0)), EntryAmount::Usd(100.0));
        assert_eq!(AmountSizer::new(60.0).size(&ctx(&ex, 0.0)), EntryAmount::Usd(60.0));
    }

    #[test]
    fn infinite_amount_sizes_to_the_cap() {
        let ex = ExchangeSettings {
            max_asset_size: 2.0,
            ..ExchangeSettings::default()
        };
        let sizer = AmountSizer::new(f64::INFINITY);
        assert_eq!(sizer.size(&ctx(&ex, 0.0)), EntryAmount::Usd(100.0));
        assert_eq!(sizer.size(&ctx(&ex, 40.0)), EntryAmount::Usd(100.0));
    }

    #[test]
    fn pct_account_scales_with_equity() {
        let ex = ExchangeSettings::default();
        assert_eq!(PctAccountSizer::new(0.1).size(&ctx(&ex, 0.0)), EntryAmount::Usd(200.0));
    }

    #[test]
    fn smallest_asset_uses_exchange_minimum() {
        let ex = ExchangeSettings::default();
        assert_eq!(
            SmallestAssetSizer.size(&ctx(&ex, 0.0)),
            EntryAmount::Asset(ex.min_asset_size)
        );
    }
}
