/// Refresh, aggregation and presentation modules for the options dashboard
pub mod aggregation;
pub mod config;
pub mod controller;
pub mod runtime;
pub mod state;
pub mod widget;
