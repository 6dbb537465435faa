//! Position sizers — turn a sizing rule into an entry size.
//!
//! A [`Sizer`] only answers "how much?" for one entry. [`PositionSizer`] wraps
//! the sizer chosen by the static settings and applies the exchange rules that
//! are the same for every rule: trade count, tick rounding, size bounds, and
//! merging the entry into an existing position.

pub mod fixed;
pub mod risk;

pub use fixed::{AmountSizer, PctAccountSizer, SmallestAssetSizer};
pub use risk::RiskSizer;

use crate::direction::Direction;
use crate::domain::{round_dp, round_to_step};
use crate::orders::RejectReason;
use crate::settings::{DynamicOrderSettings, ExchangeSettings, SizingMode, StaticOrderSettings};

/// What a sizer asks to buy or sell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryAmount {
    /// Quote currency.
    Usd(f64),
    /// Units of the asset.
    Asset(f64),
}

/// Inputs shared by every sizer for one entry attempt.
#[derive(Clone, Copy)]
pub struct SizingContext<'a> {
    pub direction: &'a dyn Direction,
    pub exchange: &'a ExchangeSettings,
    pub equity: f64,
    pub entry_price: f64,
    pub sl_price: Option<f64>,
    /// Average entry of the open position, 0 when flat.
    pub average_entry: f64,
    /// Size of the open position in quote currency, 0 when flat.
    pub position_size_usd: f64,
    pub position_size_asset: f64,
    /// Entries already stacked into the open position.
    pub total_trades: u32,
}

impl SizingContext<'_> {
    pub fn is_adding(&self) -> bool {
        self.position_size_usd > 0.0
    }
}

/// A single sizing rule.
pub trait Sizer: Send + Sync {
    /// Amount to enter. Non-positive or non-finite results are rejected as too small.
    fn size(&self, ctx: &SizingContext<'_>) -> EntryAmount;

    /// Sizer name for logging
    fn name(&self) -> &str;
}

/// A sized entry merged into the (possibly empty) open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySize {
    pub entry_price: f64,
    pub entry_size_usd: f64,
    pub entry_size_asset: f64,
    pub position_size_usd: f64,
    pub position_size_asset: f64,
    pub average_entry: f64,
    /// Distance of the stop loss from the average entry, as a fraction.
    pub sl_pct: f64,
    /// Loss of the combined position at the stop loss after fees, positive.
    pub possible_loss: f64,
    /// Entries in the position including this one.
    pub total_trades: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingOutcome {
    Sized(EntrySize),
    Rejected(RejectReason),
}

/// The sizer selected by the static settings plus the shared exchange rules.
pub struct PositionSizer {
    sizer: Box<dyn Sizer>,
    max_trades: u32,
}

impl PositionSizer {
    pub fn new(static_os: &StaticOrderSettings, dynamic: &DynamicOrderSettings) -> Self {
        let sizer: Box<dyn Sizer> = match static_os.increase_position_type {
            SizingMode::Amount => Box::new(AmountSizer::new(static_os.size_amount)),
            SizingMode::PctAccount => {
                Box::new(PctAccountSizer::new(dynamic.account_pct_risk_per_trade))
            }
            SizingMode::RiskAmount => Box::new(RiskSizer::amount(static_os.size_amount)),
            SizingMode::RiskPctAccount => {
                Box::new(RiskSizer::pct_account(dynamic.account_pct_risk_per_trade))
            }
            SizingMode::SmallestEntrySizeAsset => Box::new(SmallestAssetSizer),
        };
        Self::with_sizer(sizer, dynamic.max_trades)
    }

    pub fn with_sizer(sizer: Box<dyn Sizer>, max_trades: u32) -> Self {
        Self { sizer, max_trades }
    }

    pub fn name(&self) -> &str {
        self.sizer.name()
    }

    pub fn size(&self, ctx: &SizingContext<'_>) -> SizingOutcome {
        let total_trades = ctx.total_trades + 1;
        if total_trades > self.max_trades {
            return SizingOutcome::Rejected(RejectReason::MaxTrades);
        }

        let ex = ctx.exchange;
        let price = ctx.entry_price;
        let (entry_size_usd, entry_size_asset) = match self.sizer.size(ctx) {
            EntryAmount::Usd(usd) => {
                if !usd.is_finite() || usd <= 0.0 {
                    return SizingOutcome::Rejected(RejectReason::SizeTooSmall);
                }
                let usd = round_dp(usd, 2);
                (usd, round_to_step(usd / price, ex.asset_tick_step))
            }
            EntryAmount::Asset(asset) => {
                if !asset.is_finite() || asset <= 0.0 {
                    return SizingOutcome::Rejected(RejectReason::SizeTooSmall);
                }
                let asset = round_to_step(asset, ex.asset_tick_step);
                (asset * price, asset)
            }
        };

        if entry_size_asset < ex.min_asset_size || entry_size_usd <= 0.0 {
            return SizingOutcome::Rejected(RejectReason::SizeTooSmall);
        }
        if entry_size_asset > ex.max_asset_size {
            return SizingOutcome::Rejected(RejectReason::SizeTooBig);
        }

        let position_size_usd = ctx.position_size_usd + entry_size_usd;
        let position_size_asset = ctx.position_size_asset + entry_size_asset;
        let average_entry = if ctx.is_adding() {
            let avg = position_size_usd
                / (entry_size_usd / price + ctx.position_size_usd / ctx.average_entry);
            round_to_step(avg, ex.price_tick_step)
        } else {
            price
        };

        let (sl_pct, possible_loss) = match ctx.sl_price {
            Some(sl) => (
                round_dp((average_entry - sl).abs() / average_entry, 4),
                loss_at(ctx.direction, average_entry, position_size_usd, sl, ex.market_fee_pct),
            ),
            None => (0.0, 0.0),
        };

        SizingOutcome::Sized(EntrySize {
            entry_price: price,
            entry_size_usd,
            entry_size_asset,
            position_size_usd,
            position_size_asset,
            average_entry,
            sl_pct,
            possible_loss,
            total_trades,
        })
    }
}

/// Loss (positive, truncated to whole quote units) of closing the position at
/// `exit_price` after paying `fee_pct` on both sides.
pub fn loss_at(
    direction: &dyn Direction,
    average_entry: f64,
    position_size_usd: f64,
    exit_price: f64,
    fee_pct: f64,
) -> f64 {
    let coin_size = position_size_usd / average_entry;
    let pnl = direction.pnl(coin_size, average_entry, exit_price);
    let fees = coin_size * average_entry * fee_pct + coin_size * exit_price * fee_pct;
    (-(pnl - fees)).trunc().max(0.0)
}
