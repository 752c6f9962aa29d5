//! # Alt Rotator
//!
//! A single-position rotation bot for Binance spot and cross margin. Each
//! cycle it scores a list of alt/quote pairs and moves one position between
//! the quote asset and the best alt.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Binance API client (REST + kline WebSocket) and paper trading
//! - `market`: Per-pair snapshots from REST polling or the streaming cache
//! - `strategy`: Sizing, scoring, rotation decisions and order execution
//! - `risk`: Daily trade and loss limits
//! - `persistence`: JSON state files
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod exchange;
pub mod market;
pub mod persistence;
pub mod risk;
pub mod strategy;
pub mod utils;

pub use config::Config;
