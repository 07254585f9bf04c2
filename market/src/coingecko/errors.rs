use thiserror::Error;

use crate::errors::MarketError;

#[derive(Error, Debug)]
pub enum GeckoError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("coingecko returned status {status} for {endpoint}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("json decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid response from coingecko: {0}")]
    InvalidResponse(String),

    #[error("invalid coingecko base url: {0}")]
    InvalidBaseUrl(String),
}

impl From<GeckoError> for MarketError {
    fn from(e: GeckoError) -> Self {
        match e {
            GeckoError::Http(ref inner) if inner.is_decode() => {
                MarketError::InvalidUpstreamSchema(e.to_string())
            }
            GeckoError::Http(_) | GeckoError::Status { .. } | GeckoError::InvalidBaseUrl(_) => {
                MarketError::UpstreamUnavailable(e.to_string())
            }
            GeckoError::Decode(_) | GeckoError::InvalidResponse(_) => {
                MarketError::InvalidUpstreamSchema(e.to_string())
            }
        }
    }
}
