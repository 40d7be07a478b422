//! Typed Kraken Futures v3 endpoint catalog.
//!
//! Every method is a parameterization of [`RequestDispatcher::call`]; responses
//! are returned as raw JSON so venue-level rejections (`"result": "error"` in a
//! 2xx body) reach the caller untouched.

use serde_json::Value;

use crate::exchange::dispatcher::{HttpMethod, NO_PARAMS, RequestDispatcher};
use crate::exchange::error::ExchangeError;
use crate::model::{BatchOrder, CancelOrderRequest, EditOrderRequest, OrderRequest};

pub const PRODUCTION_URL: &str = "https://futures.kraken.com";
pub const DEMO_URL: &str = "https://demo-futures.kraken.com";

const INSTRUMENTS: &str = "/derivatives/api/v3/instruments";
const TICKERS: &str = "/derivatives/api/v3/tickers";
const ORDER_BOOK: &str = "/derivatives/api/v3/orderbook";
const HISTORY: &str = "/derivatives/api/v3/history";
const ACCOUNTS: &str = "/derivatives/api/v3/accounts";
const OPEN_POSITIONS: &str = "/derivatives/api/v3/openpositions";
const OPEN_ORDERS: &str = "/derivatives/api/v3/openorders";
const RECENT_ORDERS: &str = "/derivatives/api/v3/recentorders";
const FILLS: &str = "/derivatives/api/v3/fills";
const TRANSFERS: &str = "/derivatives/api/v3/transfers";
const NOTIFICATIONS: &str = "/derivatives/api/v3/notifications";
const ACCOUNT_LOG: &str = "/api/history/v2/account-log";
const SEND_ORDER: &str = "/derivatives/api/v3/sendorder";
const EDIT_ORDER: &str = "/derivatives/api/v3/editorder";
const CANCEL_ORDER: &str = "/derivatives/api/v3/cancelorder";
const CANCEL_ALL_ORDERS: &str = "/derivatives/api/v3/cancelallorders";
const CANCEL_ALL_ORDERS_AFTER: &str = "/derivatives/api/v3/cancelallordersafter";
const BATCH_ORDER: &str = "/derivatives/api/v3/batchorder";

type Params = Vec<(&'static str, String)>;

fn optional(key: &'static str, value: Option<&str>) -> Params {
    value.map(|v| vec![(key, v.to_string())]).unwrap_or_default()
}

pub struct KrakenFuturesClient {
    dispatcher: RequestDispatcher,
}

impl KrakenFuturesClient {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    // --- Public ---

    pub async fn instruments(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, INSTRUMENTS, NO_PARAMS, false).await
    }

    pub async fn tickers(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, TICKERS, NO_PARAMS, false).await
    }

    pub async fn order_book(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = vec![("symbol", symbol.to_string())];
        self.dispatcher.call(HttpMethod::Get, ORDER_BOOK, &params, false).await
    }

    /// Public trade history; `last_time` pages backwards from that timestamp.
    pub async fn trade_history(&self, symbol: &str, last_time: Option<&str>) -> Result<Value, ExchangeError> {
        let mut params = vec![("symbol", symbol.to_string())];
        params.extend(optional("lastTime", last_time));
        self.dispatcher.call(HttpMethod::Get, HISTORY, &params, false).await
    }

    // --- Account (private reads) ---

    pub async fn accounts(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, ACCOUNTS, NO_PARAMS, true).await
    }

    pub async fn open_positions(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, OPEN_POSITIONS, NO_PARAMS, true).await
    }

    pub async fn open_orders(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, OPEN_ORDERS, NO_PARAMS, true).await
    }

    pub async fn recent_orders(&self, symbol: Option<&str>) -> Result<Value, ExchangeError> {
        let params = optional("symbol", symbol);
        self.dispatcher.call(HttpMethod::Get, RECENT_ORDERS, &params, true).await
    }

    pub async fn fills(&self, last_fill_time: Option<&str>) -> Result<Value, ExchangeError> {
        let params = optional("lastFillTime", last_fill_time);
        self.dispatcher.call(HttpMethod::Get, FILLS, &params, true).await
    }

    pub async fn transfers(&self, last_transfer_time: Option<&str>) -> Result<Value, ExchangeError> {
        let params = optional("lastTransferTime", last_transfer_time);
        self.dispatcher.call(HttpMethod::Get, TRANSFERS, &params, true).await
    }

    pub async fn notifications(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, NOTIFICATIONS, NO_PARAMS, true).await
    }

    pub async fn account_log(&self) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Get, ACCOUNT_LOG, NO_PARAMS, true).await
    }

    // --- Trading ---

    pub async fn send_order(&self, order: &OrderRequest) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Post, SEND_ORDER, order, true).await
    }

    pub async fn edit_order(&self, edit: &EditOrderRequest) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Post, EDIT_ORDER, edit, true).await
    }

    pub async fn cancel_order(&self, cancel: &CancelOrderRequest) -> Result<Value, ExchangeError> {
        self.dispatcher.call(HttpMethod::Post, CANCEL_ORDER, cancel, true).await
    }

    /// Cancel every resting order, or only those on `symbol`.
    pub async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<Value, ExchangeError> {
        let params = optional("symbol", symbol);
        self.dispatcher.call(HttpMethod::Post, CANCEL_ALL_ORDERS, &params, true).await
    }

    /// Dead man's switch. `Some(0)` disarms, `None` reports the current timer.
    pub async fn cancel_all_orders_after(&self, timeout_secs: Option<u64>) -> Result<Value, ExchangeError> {
        let params: Params = timeout_secs
            .map(|t| vec![("timeout", t.to_string())])
            .unwrap_or_default();
        self.dispatcher.call(HttpMethod::Post, CANCEL_ALL_ORDERS_AFTER, &params, true).await
    }

    pub async fn batch_order(&self, batch: &BatchOrder) -> Result<Value, ExchangeError> {
        let json = serde_json::to_string(batch).map_err(|e| {
            ExchangeError::transport(format!("POST {}", BATCH_ORDER), format!("could not encode batch: {}", e))
        })?;
        let params = vec![("json", json)];
        self.dispatcher.call(HttpMethod::Post, BATCH_ORDER, &params, true).await
    }
}
