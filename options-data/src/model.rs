//! Wire model for the collection API.
//!
//! These types match the JSON returned by `/api/chart-data`, `/api/latest-data`,
//! `/api/status` and `/api/trigger-collection`.

use crate::de::{de_opt_timestamp, de_timestamp};
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Moneyness bucket of a tracked call option.
///
/// Ordered ITM < ATM < OTM, which is also the display order of the latest panel.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    #[display("ITM")]
    Itm,
    #[display("ATM")]
    Atm,
    #[display("OTM")]
    Otm,
}

impl OptionType {
    pub const ALL: [OptionType; 3] = [OptionType::Itm, OptionType::Atm, OptionType::Otm];

    /// Human readable description of the strike selection.
    pub fn description(&self) -> &'static str {
        match self {
            OptionType::Itm => "5% In The Money",
            OptionType::Atm => "At The Money",
            OptionType::Otm => "5% Out of The Money",
        }
    }

    /// Short note on where the premium's value comes from.
    pub fn moneyness_note(&self) -> &'static str {
        match self {
            OptionType::Itm => "Has intrinsic value",
            OptionType::Atm => "Pure time/volatility value",
            OptionType::Otm => "Only time/volatility value",
        }
    }
}

/// A single collected option quote.
///
/// `iv` is fractional (0.452 == 45.2%). Decimal fields accept either JSON numbers or
/// numeric strings.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OptionSample {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub option_type: OptionType,
    pub symbol: SmolStr,
    pub strike: Decimal,
    pub premium: Decimal,
    pub iv: Decimal,
    pub spot_price: Decimal,
}

/// Response of `GET /api/chart-data`.
///
/// Both arrays carry the same fields; the API keeps them separate for its price and
/// IV charts.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ChartData {
    #[serde(default)]
    pub price_data: Vec<OptionSample>,
    #[serde(default)]
    pub iv_data: Vec<OptionSample>,
}

impl ChartData {
    /// Collapse the two parallel arrays into a single series.
    ///
    /// `price_data` is used when present, otherwise `iv_data`.
    pub fn into_samples(self) -> Vec<OptionSample> {
        if self.price_data.is_empty() {
            self.iv_data
        } else {
            self.price_data
        }
    }

    pub fn is_empty(&self) -> bool {
        self.price_data.is_empty() && self.iv_data.is_empty()
    }
}

/// Response of `GET /api/status`. Advisory only.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub can_collect_now: bool,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub last_collection: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub next_collection_slot: Option<DateTime<Utc>>,
}

/// Acknowledgement of `POST /api/trigger-collection`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct CollectionAck {
    pub status_code: u16,
    pub message: Option<String>,
}
