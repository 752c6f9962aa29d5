//! Market snapshots used for scoring.
//!
//! Two sources share one interface:
//! - [`RestSnapshotProvider`] polls tickers or klines each cycle
//! - [`StreamSnapshotProvider`] reads a [`CandleCache`] kept current by the
//!   kline WebSocket

mod cache;
mod snapshot;

pub use cache::{CandleCache, SymbolCandles};
#[cfg(test)]
pub use snapshot::MockSnapshotProvider;
pub use snapshot::{
    last_closed_change, RestSnapshotProvider, ScoreWindow, Snapshot, SnapshotProvider,
    StreamSnapshotProvider,
};
