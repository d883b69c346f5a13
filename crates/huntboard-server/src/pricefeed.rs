//! Fiat price feed for reward denominations.
//!
//! Prices come from an external feed and are cached with a 5-minute TTL,
//! refreshed lazily on read. A refresh failure serves the previous value
//! (marked stale) rather than erroring; readers tolerate brief staleness.
//! Prices are display-only fiat conversions, so `f64` is acceptable here;
//! reward amounts themselves never touch floating point.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::AppError;

/// How long a fetched price set stays fresh.
pub const PRICE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedPrices {
    prices: HashMap<String, f64>,
    fetched_at: Instant,
}

/// Snapshot returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    /// Coin id to fiat price.
    pub prices: HashMap<String, f64>,
    /// True when the feed could not be refreshed and an older value is served.
    pub stale: bool,
}

/// Lazily refreshed price cache owned by the long-lived app state.
pub struct PriceFeed {
    client: reqwest::Client,
    url: String,
    coin_ids: Vec<String>,
    vs_currency: String,
    ttl: Duration,
    cache: Mutex<Option<CachedPrices>>,
}

impl PriceFeed {
    pub fn new(url: String, coin_ids: Vec<String>, vs_currency: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            coin_ids,
            vs_currency,
            ttl: PRICE_TTL,
            cache: Mutex::new(None),
        }
    }

    /// Current prices, refreshing when the cached value has expired.
    pub async fn current(&self) -> Result<PriceSnapshot, AppError> {
        let cached = self.cache.lock().unwrap().clone();

        if let Some(entry) = &cached {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(PriceSnapshot {
                    prices: entry.prices.clone(),
                    stale: false,
                });
            }
        }

        match self.fetch().await {
            Ok(prices) => {
                *self.cache.lock().unwrap() = Some(CachedPrices {
                    prices: prices.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(PriceSnapshot {
                    prices,
                    stale: false,
                })
            }
            Err(e) => {
                tracing::warn!("Price feed refresh failed: {}", e);
                match cached {
                    Some(entry) => Ok(PriceSnapshot {
                        prices: entry.prices,
                        stale: true,
                    }),
                    None => Err(AppError::Internal(format!(
                        "Price feed unavailable: {}",
                        e
                    ))),
                }
            }
        }
    }

    async fn fetch(&self) -> anyhow::Result<HashMap<String, f64>> {
        let ids = self.coin_ids.join(",");
        let raw: HashMap<String, HashMap<String, f64>> = self
            .client
            .get(&self.url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", self.vs_currency.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(flatten_prices(raw, &self.vs_currency))
    }
}

/// Pull the requested fiat currency out of the feed's nested response.
fn flatten_prices(
    raw: HashMap<String, HashMap<String, f64>>,
    vs_currency: &str,
) -> HashMap<String, f64> {
    raw.into_iter()
        .filter_map(|(coin, quotes)| quotes.get(vs_currency).map(|price| (coin, *price)))
        .collect()
}
