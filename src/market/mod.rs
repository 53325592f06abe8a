//! GUI token market data with simulated price movement.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LedgerConfig;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub total_supply: u64,
    pub current_price_usd: f64,
    pub market_cap: f64,
    pub holders: u64,
}

impl TokenInfo {
    pub fn gui() -> Self {
        Self {
            symbol: "GUI".into(),
            name: "GUI INU".into(),
            decimals: 8,
            total_supply: 1_000_000_000_000,
            current_price_usd: 0.00012,
            market_cap: 120_000_000.0,
            holders: 50_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub timestamp: u64,
    pub price: f64,
}

/// `base * (1 + (draw - 0.5) * 2 * jitter)` for a uniform `draw` in `[0, 1)`.
pub fn jittered_price(base: f64, jitter: f64, draw: f64) -> f64 {
    base * (1.0 + (draw - 0.5) * 2.0 * jitter)
}

#[derive(Debug)]
pub struct Market {
    token: TokenInfo,
    jitter: f64,
    history: VecDeque<PricePoint>,
    history_limit: usize,
}

impl Market {
    pub fn new(config: &LedgerConfig) -> Self {
        let mut token = TokenInfo::gui();
        token.current_price_usd = config.base_price_usd;
        token.market_cap = config.base_price_usd * token.total_supply as f64;
        Self {
            token,
            jitter: config.price_jitter,
            history: VecDeque::new(),
            history_limit: config.price_history_limit,
        }
    }

    /// Quote a fresh price and record it in the bounded history.
    pub fn quote<R: Rng + ?Sized>(&mut self, rng: &mut R, now: u64) -> f64 {
        let price = jittered_price(self.token.current_price_usd, self.jitter, rng.gen());
        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(PricePoint {
                timestamp: now,
                price,
            });
        }
        debug!(price, "gui price quoted");
        price
    }

    pub fn market_data<R: Rng + ?Sized>(&mut self, rng: &mut R, now: u64) -> TokenInfo {
        let price = self.quote(rng, now);
        TokenInfo {
            current_price_usd: price,
            market_cap: price * self.token.total_supply as f64,
            ..self.token.clone()
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &PricePoint> {
        self.history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn jitter_is_symmetric_around_base() {
        assert_eq!(jittered_price(1.0, 0.05, 0.5), 1.0);
        assert!((jittered_price(1.0, 0.05, 0.0) - 0.95).abs() < 1e-12);
        assert!(jittered_price(1.0, 0.05, 0.999_999) < 1.05);
    }

    #[test]
    fn quotes_stay_within_band() {
        let config = LedgerConfig::default();
        let mut market = Market::new(&config);
        let mut rng = StdRng::seed_from_u64(9);
        for i in 0..1_000 {
            let price = market.quote(&mut rng, i);
            assert!(price >= 0.00012 * 0.95 && price < 0.00012 * 1.05, "{price}");
        }
    }

    #[test]
    fn history_is_bounded_and_keeps_newest() {
        let config = LedgerConfig {
            price_history_limit: 3,
            ..LedgerConfig::default()
        };
        let mut market = Market::new(&config);
        let mut rng = StdRng::seed_from_u64(3);
        for t in 0..5 {
            market.quote(&mut rng, t);
        }
        let stamps: Vec<u64> = market.history().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[test]
    fn market_cap_follows_quoted_price() {
        let mut market = Market::new(&LedgerConfig::default());
        let mut rng = StdRng::seed_from_u64(4);
        let data = market.market_data(&mut rng, 0);
        assert_eq!(data.symbol, "GUI");
        assert!((data.market_cap - data.current_price_usd * 1e12).abs() < 1e-3);
    }
}
