//! Time-bucketed aggregation of option samples into chart rows
//!
//! Groups the flat sample stream by exact timestamp (the collector emits aligned
//! timestamps per cycle), merges the three moneyness buckets and the spot price into
//! one row per timestamp, and derives the overlay and reference values the charts use.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use options_data::{OptionSample, OptionType};
use rust_decimal::Decimal;
use tracing::warn;

/// Fractional IV -> percentage
const IV_PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Height of the normalized spot overlay, in IV percentage points
const OVERLAY_SPAN: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Overlay is centred on the average IV
const OVERLAY_HALF_SPAN: Decimal = Decimal::from_parts(25, 0, 0, false, 0);

/// One chart-ready row per distinct sample timestamp
///
/// Premium and IV fields are `None` when no sample of that option type exists for the
/// timestamp. These are gaps in the chart, never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRow {
    pub timestamp: DateTime<Utc>,
    pub spot_price: Decimal,
    pub itm_premium: Option<Decimal>,
    pub atm_premium: Option<Decimal>,
    pub otm_premium: Option<Decimal>,
    /// IV in percent
    pub itm_iv: Option<Decimal>,
    pub atm_iv: Option<Decimal>,
    pub otm_iv: Option<Decimal>,
    /// Spot price rescaled into the IV percentage range
    pub normalized_spot: Option<Decimal>,
}

impl ChartRow {
    fn new(timestamp: DateTime<Utc>, spot_price: Decimal) -> Self {
        Self {
            timestamp,
            spot_price,
            itm_premium: None,
            atm_premium: None,
            otm_premium: None,
            itm_iv: None,
            atm_iv: None,
            otm_iv: None,
            normalized_spot: None,
        }
    }

    /// Merge a sample, with its IV already in percent, into the fields of its option type.
    /// A repeated option type within the same timestamp overwrites the earlier one.
    fn merge(&mut self, sample: &OptionSample, iv: Decimal) {
        let (premium_slot, iv_slot) = match sample.option_type {
            OptionType::Itm => (&mut self.itm_premium, &mut self.itm_iv),
            OptionType::Atm => (&mut self.atm_premium, &mut self.atm_iv),
            OptionType::Otm => (&mut self.otm_premium, &mut self.otm_iv),
        };
        *premium_slot = Some(sample.premium);
        *iv_slot = Some(iv);
    }

    pub fn premium(&self, option_type: OptionType) -> Option<Decimal> {
        match option_type {
            OptionType::Itm => self.itm_premium,
            OptionType::Atm => self.atm_premium,
            OptionType::Otm => self.otm_premium,
        }
    }

    /// IV in percent for `option_type`
    pub fn iv(&self, option_type: OptionType) -> Option<Decimal> {
        match option_type {
            OptionType::Itm => self.itm_iv,
            OptionType::Atm => self.atm_iv,
            OptionType::Otm => self.otm_iv,
        }
    }

    fn ivs(&self) -> impl Iterator<Item = Decimal> + '_ {
        OptionType::ALL.into_iter().filter_map(|kind| self.iv(kind))
    }

    fn premiums(&self) -> impl Iterator<Item = Decimal> + '_ {
        OptionType::ALL
            .into_iter()
            .filter_map(|kind| self.premium(kind))
    }
}

/// Output of [`aggregate`]: ordered rows plus reference values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSeries {
    /// Ascending by timestamp
    pub rows: Vec<ChartRow>,
    /// Mean of every present IV field (percent)
    pub avg_iv: Option<Decimal>,
    /// Mean spot price, the price chart's reference line
    pub avg_spot: Option<Decimal>,
    pub min_spot: Option<Decimal>,
    pub max_spot: Option<Decimal>,
}

impl ChartSeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// (min, max) spot price
    pub fn spot_bounds(&self) -> Option<(Decimal, Decimal)> {
        self.min_spot.zip(self.max_spot)
    }

    /// (min, max) over every present premium
    pub fn premium_bounds(&self) -> Option<(Decimal, Decimal)> {
        bounds(self.rows.iter().flat_map(ChartRow::premiums))
    }

    /// (min, max) over every present IV, the overlay and the average IV line
    pub fn iv_bounds(&self) -> Option<(Decimal, Decimal)> {
        bounds(
            self.rows
                .iter()
                .flat_map(|row| row.ivs().chain(row.normalized_spot))
                .chain(self.avg_iv),
        )
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|row| row.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|row| row.timestamp)
    }
}

/// Aggregate a flat list of samples into chart rows.
///
/// Pure: identical input always yields identical output. The spot price of a row is
/// taken from the first sample seen for its timestamp; diverging spot prices within a
/// timestamp are not reconciled.
///
/// The overlay is normalized over the whole input on every call, so a new spot
/// extreme rescales the overlay for every earlier row as well.
pub fn aggregate(samples: &[OptionSample]) -> ChartSeries {
    let mut buckets: BTreeMap<DateTime<Utc>, ChartRow> = BTreeMap::new();

    for sample in samples {
        let Some(iv) = sample.iv.checked_mul(IV_PERCENT) else {
            warn!(symbol = %sample.symbol, iv = %sample.iv, "dropping sample with out of range IV");
            continue;
        };
        buckets
            .entry(sample.timestamp)
            .or_insert_with(|| ChartRow::new(sample.timestamp, sample.spot_price))
            .merge(sample, iv);
    }

    let mut rows: Vec<ChartRow> = buckets.into_values().collect();

    let avg_iv = mean(rows.iter().flat_map(ChartRow::ivs));
    let avg_spot = mean(rows.iter().map(|row| row.spot_price));
    let spot = bounds(rows.iter().map(|row| row.spot_price));

    // Degenerate range leaves the overlay undefined rather than dividing by zero
    if let Some((min_spot, max_spot)) = spot.filter(|(min, max)| max > min) {
        let centre = avg_iv.unwrap_or(Decimal::ZERO);
        if let Some(spot_range) = max_spot.checked_sub(min_spot) {
            for row in rows.iter_mut() {
                row.normalized_spot = normalize(row.spot_price, min_spot, spot_range, centre);
            }
        }
    }

    ChartSeries {
        rows,
        avg_iv,
        avg_spot,
        min_spot: spot.map(|(min, _)| min),
        max_spot: spot.map(|(_, max)| max),
    }
}

/// Overlay value for `spot`, absent when the arithmetic leaves the decimal range
fn normalize(spot: Decimal, min: Decimal, range: Decimal, centre: Decimal) -> Option<Decimal> {
    spot.checked_sub(min)?
        .checked_div(range)?
        .checked_mul(OVERLAY_SPAN)?
        .checked_add(centre)?
        .checked_sub(OVERLAY_HALF_SPAN)
}

/// Arithmetic mean, absent for no values or when the sum overflows
fn mean(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, count) = values.try_fold((Decimal::ZERO, 0u32), |(sum, count), value| {
        Some((sum.checked_add(value)?, count + 1))
    })?;

    if count > 0 {
        sum.checked_div(Decimal::from(count))
    } else {
        None
    }
}

fn bounds(values: impl Iterator<Item = Decimal>) -> Option<(Decimal, Decimal)> {
    values.fold(None, |acc, value| match acc {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}
