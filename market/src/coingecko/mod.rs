//! CoinGecko public API (`/api/v3`) as a [`MarketFeed`](crate::feed::MarketFeed).

pub mod client;
pub mod errors;
pub mod types;

pub use client::CoinGeckoClient;
pub use errors::GeckoError;
