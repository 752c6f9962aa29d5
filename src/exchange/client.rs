//! Binance REST API client (spot + cross margin).

use crate::config::BinanceConfig;
use crate::exchange::error::ApiError;
use crate::exchange::traits::Exchange;
use crate::exchange::types::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

const SPOT_BASE_URL: &str = "https://api.binance.com";
const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";

/// Requests older than this are refused by the exchange.
const RECV_WINDOW_MS: u64 = 5000;

/// Binance API client for the spot and cross margin markets.
pub struct BinanceClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client from configuration.
    pub fn new(config: &BinanceConfig) -> Result<Self> {
        let base_url = if config.testnet {
            SPOT_TESTNET_URL
        } else {
            SPOT_BASE_URL
        };
        Self::with_base_url(config, base_url)
    }

    /// Create a client against an explicit REST endpoint.
    pub fn with_base_url(config: &BinanceConfig, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(&self, query_string: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .context("Invalid secret key")?;
        mac.update(query_string.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Get current timestamp in milliseconds.
    fn timestamp() -> Result<u64> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_millis() as u64)
    }

    fn encode_params(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Decode a response body, turning non-2xx answers into [`ApiError`].
    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let url = if params.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, Self::encode_params(params))
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        Self::decode(response, what).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
        what: &str,
    ) -> Result<T> {
        params.push(("recvWindow", RECV_WINDOW_MS.to_string()));
        params.push(("timestamp", Self::timestamp()?.to_string()));

        let query_string = Self::encode_params(&params);
        let signature = self.sign(&query_string)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        );

        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        Self::decode(response, what).await
    }

    // ==================== Market Data (Public) ====================

    /// Get exchange info for one symbol.
    #[instrument(skip(self))]
    pub async fn get_exchange_info(&self, symbol: &str) -> Result<ExchangeInfo> {
        self.public_get(
            "/api/v3/exchangeInfo",
            &[("symbol", symbol.to_string())],
            "exchange info",
        )
        .await
    }

    /// Get latest price for a symbol.
    #[instrument(skip(self))]
    pub async fn get_price(&self, symbol: &str) -> Result<PriceTicker> {
        self.public_get(
            "/api/v3/ticker/price",
            &[("symbol", symbol.to_string())],
            "price ticker",
        )
        .await
    }

    /// Get 24-hour ticker for a symbol.
    #[instrument(skip(self))]
    pub async fn get_24h_ticker(&self, symbol: &str) -> Result<Ticker24h> {
        self.public_get(
            "/api/v3/ticker/24hr",
            &[("symbol", symbol.to_string())],
            "24h ticker",
        )
        .await
    }

    /// Get recent klines, oldest first.
    #[instrument(skip(self))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: u16,
    ) -> Result<Vec<Kline>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .public_get(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
                "klines",
            )
            .await?;

        rows.iter().map(|row| Kline::from_row(row)).collect()
    }

    // ==================== Account (Authenticated) ====================

    /// Get spot account balances.
    #[instrument(skip(self))]
    pub async fn get_spot_account(&self) -> Result<SpotAccount> {
        self.signed(
            Method::GET,
            "/api/v3/account",
            vec![("omitZeroBalances", "true".to_string())],
            "spot account",
        )
        .await
    }

    /// Get cross margin account details.
    #[instrument(skip(self))]
    pub async fn get_cross_margin_account(&self) -> Result<CrossMarginAccount> {
        self.signed(
            Method::GET,
            "/sapi/v1/margin/account",
            vec![],
            "cross margin account",
        )
        .await
    }

    // ==================== Orders (Authenticated) ====================

    /// Place a market order on the spot or cross margin book.
    #[instrument(skip(self), fields(symbol = %order.symbol, side = ?order.side))]
    pub async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderResponse> {
        let mut params = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", order.quantity.normalize().to_string()),
            ("newOrderRespType", "FULL".to_string()),
        ];

        let path = match order.account {
            AccountKind::Spot => "/api/v3/order",
            AccountKind::CrossMargin => {
                params.push(("isIsolated", "FALSE".to_string()));
                if let Some(effect) = order.side_effect {
                    let effect = match effect {
                        SideEffectType::MarginBuy => "MARGIN_BUY",
                        SideEffectType::AutoRepay => "AUTO_REPAY",
                    };
                    params.push(("sideEffectType", effect.to_string()));
                }
                "/sapi/v1/margin/order"
            }
        };

        debug!("Placing market order: {:?}", order);

        self.signed(Method::POST, path, params, "order").await
    }
}

#[async_trait]
impl Exchange for BinanceClient {
    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let info = self.get_exchange_info(symbol).await?;
        info.symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| anyhow!("Symbol {} not found in exchange info", symbol))?
            .symbol_filters()
    }

    async fn price(&self, symbol: &str) -> Result<Decimal> {
        Ok(self.get_price(symbol).await?.price)
    }

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        self.get_24h_ticker(symbol).await
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: u16,
    ) -> Result<Vec<Kline>> {
        self.get_klines(symbol, interval, limit).await
    }

    async fn free_balance(&self, asset: &str, account: AccountKind) -> Result<Decimal> {
        let free = match account {
            AccountKind::Spot => self
                .get_spot_account()
                .await?
                .balances
                .into_iter()
                .find(|b| b.asset == asset)
                .map(|b| b.free),
            AccountKind::CrossMargin => self
                .get_cross_margin_account()
                .await?
                .user_assets
                .into_iter()
                .find(|a| a.asset == asset)
                .map(|a| a.free),
        };
        Ok(free.unwrap_or(Decimal::ZERO))
    }

    async fn market_order(&self, order: &MarketOrder) -> Result<OrderResponse> {
        self.place_market_order(order).await
    }
}
