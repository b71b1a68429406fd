#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unused_qualifications
)]

//! # Options-Data
//! Typed client for the BTC options collection API.
//!
//! * [`gateway::OptionsGateway`] abstracts the four API operations so consumers can
//!   be driven by the real [`gateway::HttpGateway`] or by a scripted stand-in.
//! * [`model`] holds the wire types: [`model::OptionSample`], [`model::ChartData`],
//!   [`model::SystemStatus`] and [`model::CollectionAck`].
//! * [`error::GatewayError`] classifies every failure as network, server, decode or
//!   configuration.

/// All [`Error`](std::error::Error)s generated in `options-data`.
pub mod error;

/// Remote Data Gateway trait and its HTTP implementation.
pub mod gateway;

/// Wire model of the collection API.
pub mod model;

/// Serde helpers for API timestamps.
pub mod de;

pub use error::GatewayError;
pub use gateway::{Endpoint, HttpGateway, OptionsGateway};
pub use model::{ChartData, CollectionAck, OptionSample, OptionType, SystemStatus};
