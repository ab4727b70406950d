//! FX rate lookup (USD -> ZAR)
//!
//! Boundary service for the deposit flow: a TTL-cached spot rate pulled from
//! a configurable provider with public fallbacks. Provider responses are
//! sanity-bounded; when every candidate fails the configured fallback rate is
//! cached so the endpoint stays available.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::FxConfig;

const PUBLIC_PROVIDERS: [&str; 2] = [
    "https://open.er-api.com/v6/latest/USD",
    "https://api.exchangerate.host/latest?base=USD&symbols=ZAR",
];

/// Accepted rate band; anything outside is a broken provider response.
const MIN_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const MAX_RATE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

pub struct FxService {
    client: reqwest::Client,
    cache: RwLock<Option<(Decimal, Instant)>>,
    provider_url: Option<String>,
    ttl: Duration,
    fallback: Decimal,
}

impl FxService {
    pub fn new(config: &FxConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: RwLock::new(None),
            provider_url: config.provider_url.clone(),
            ttl: Duration::from_secs(config.ttl_secs),
            fallback: config.fallback_rate,
        }
    }

    /// Current USD/ZAR rate, cached for the configured TTL.
    pub async fn usd_zar_rate(&self) -> Decimal {
        if let Some((rate, at)) = *self.cache.read().await {
            if at.elapsed() < self.ttl {
                return rate;
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some((rate, at)) = *cache {
            if at.elapsed() < self.ttl {
                return rate;
            }
        }

        let rate = self.fetch_rate().await.unwrap_or_else(|| {
            warn!("all FX providers failed, using fallback rate {}", self.fallback);
            self.fallback
        });
        *cache = Some((rate, Instant::now()));
        rate
    }

    async fn fetch_rate(&self) -> Option<Decimal> {
        let candidates = self
            .provider_url
            .iter()
            .map(String::as_str)
            .chain(PUBLIC_PROVIDERS);

        for url in candidates {
            match self.try_provider(url).await {
                Some(rate) if rate >= MIN_RATE && rate <= MAX_RATE => return Some(rate),
                Some(rate) => warn!(url, %rate, "FX rate outside sanity bounds"),
                None => {}
            }
        }
        None
    }

    async fn try_provider(&self, url: &str) -> Option<Decimal> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let json: serde_json::Value = response.json().await.ok()?;
        let raw = json
            .pointer("/rates/ZAR")
            .or_else(|| json.pointer("/result/ZAR"))?
            .as_f64()?;
        Decimal::from_f64(raw)
    }
}
