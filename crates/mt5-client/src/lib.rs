//! Session management and query facade for the MetaTrader 5 terminal.
//!
//! - [`Session`]: connection lifecycle with retry and scoped acquisition
//! - [`Mt5Client`]: typed binding calls with uniform failure reporting
//! - [`DataClient`]: validated record/table forms of every query
//! - [`Mt5Config`]: TOML configuration

pub mod client;
pub mod config;
pub mod data;
pub mod session;
pub mod validate;

pub use client::Mt5Client;
pub use config::{Mt5Config, TradingConfig};
pub use data::DataClient;
pub use session::{Connectable, Connected, Session};
pub use validate::HistoryQuery;
