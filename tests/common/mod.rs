#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use kraken_agent_rs::clock::SimulatedTimeProvider;
use kraken_agent_rs::decision::{DecisionClient, DecisionError};
use kraken_agent_rs::exchange::dispatcher::{HttpMethod, TransportResponse};
use kraken_agent_rs::exchange::{Credentials, HttpTransport, KrakenFuturesClient, PreparedRequest, RequestDispatcher, Signer};

pub const API_KEY: &str = "test-api-key";
pub const SECRET: &str = "a3Jha2VuLWZ1dHVyZXMtdGVzdC1zZWNyZXQtMDEyMzQ1Njc4OQ==";
pub const BASE_URL: &str = "https://futures.test";
pub const CLOCK_MS: i64 = 1_699_999_999_999;

pub const ACCOUNTS: &str = "/derivatives/api/v3/accounts";
pub const OPEN_POSITIONS: &str = "/derivatives/api/v3/openpositions";
pub const OPEN_ORDERS: &str = "/derivatives/api/v3/openorders";
pub const TICKERS: &str = "/derivatives/api/v3/tickers";
pub const ORDER_BOOK: &str = "/derivatives/api/v3/orderbook";
pub const HISTORY: &str = "/derivatives/api/v3/history";
pub const SEND_ORDER: &str = "/derivatives/api/v3/sendorder";
pub const CANCEL_ALL_ORDERS: &str = "/derivatives/api/v3/cancelallorders";
pub const CANCEL_ALL_ORDERS_AFTER: &str = "/derivatives/api/v3/cancelallordersafter";
pub const EDIT_ORDER: &str = "/derivatives/api/v3/editorder";
pub const CANCEL_ORDER: &str = "/derivatives/api/v3/cancelorder";
pub const BATCH_ORDER: &str = "/derivatives/api/v3/batchorder";

/// Transport double that answers by URL path and records every request it sees.
pub struct FakeTransport {
    routes: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<PreparedRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn route(self, path: &str, status: u16, body: Value) -> Self {
        self.set_route(path, status, body.to_string());
        self
    }

    pub fn route_raw(self, path: &str, status: u16, body: &str) -> Self {
        self.set_route(path, status, body.to_string());
        self
    }

    pub fn set_route(&self, path: &str, status: u16, body: String) {
        self.routes.lock().insert(path.to_string(), (status, body));
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<PreparedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| path_of(&r.url) == path)
            .collect()
    }

    pub fn posts(&self) -> Vec<PreparedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == HttpMethod::Post)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn path_of(url: &str) -> &str {
    let without_base = url.strip_prefix(BASE_URL).unwrap_or(url);
    without_base.split('?').next().unwrap_or(without_base)
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<TransportResponse, String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let route = self.routes.lock().get(path_of(&request.url)).cloned();
        self.requests.lock().push(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match route {
            Some((status, body)) => Ok(TransportResponse { status, body }),
            None => Err("connection refused".to_string()),
        }
    }
}

pub fn test_signer() -> Signer {
    Signer::with_clock(SECRET, Arc::new(SimulatedTimeProvider::new(CLOCK_MS))).unwrap()
}

pub fn private_dispatcher(transport: Arc<FakeTransport>) -> RequestDispatcher {
    RequestDispatcher::with_signer(BASE_URL, Credentials::new(API_KEY, SECRET), test_signer(), transport)
}

pub fn client(transport: Arc<FakeTransport>) -> Arc<KrakenFuturesClient> {
    Arc::new(KrakenFuturesClient::new(private_dispatcher(transport)))
}

// --- Venue payloads ---

pub fn accounts_payload() -> Value {
    json!({
        "result": "success",
        "accounts": {
            "flex": {
                "type": "multiCollateralMarginAccount",
                "portfolioValue": 10250.5,
                "availableMargin": 8000.25,
                "totalUnrealized": 12.5,
                "currencies": {
                    "USD": { "quantity": 10000.0 },
                    "XBT": { "quantity": 0.0 }
                }
            }
        },
        "serverTime": "2024-01-01T00:00:00.000Z"
    })
}

pub fn positions_payload() -> Value {
    json!({
        "result": "success",
        "openPositions": [
            { "side": "long", "symbol": "PF_XBTUSD", "price": 60000.0, "size": 0.01 }
        ]
    })
}

pub fn orders_payload() -> Value {
    json!({
        "result": "success",
        "openOrders": [
            {
                "order_id": "59302619-41d2-4f0b-941f-7e7914760ad3",
                "symbol": "PF_XBTUSD",
                "side": "buy",
                "orderType": "lmt",
                "limitPrice": 30000.0,
                "unfilledSize": 1.0,
                "status": "untouched"
            }
        ]
    })
}

pub fn tickers_payload() -> Value {
    json!({
        "result": "success",
        "tickers": [
            { "symbol": "PF_ETHUSD", "last": 3000.0, "markPrice": 3000.1 },
            {
                "symbol": "PF_XBTUSD",
                "last": 61000.0,
                "markPrice": 61000.5,
                "bid": 60999.0,
                "bidSize": 2.0,
                "ask": 61001.0,
                "askSize": 1.5,
                "vol24h": 1234.0,
                "openInterest": 99.0,
                "fundingRate": 0.0001
            }
        ]
    })
}

/// Eight levels per side, deliberately out of order.
pub fn book_payload() -> Value {
    let bids: Vec<Value> = [60992, 60999, 60995, 60991, 60998, 60994, 60997, 60996]
        .iter()
        .map(|p| json!([*p as f64, 1.0]))
        .collect();
    let asks: Vec<Value> = [61008, 61001, 61005, 61002, 61007, 61003, 61006, 61004]
        .iter()
        .map(|p| json!([*p as f64, 2.0]))
        .collect();
    json!({ "result": "success", "orderBook": { "bids": bids, "asks": asks } })
}

/// Fifteen trades, oldest first.
pub fn trades_payload() -> Value {
    let history: Vec<Value> = (0..15)
        .map(|i| {
            json!({
                "time": format!("2024-01-01T00:00:{:02}.000Z", i),
                "side": if i % 2 == 0 { "buy" } else { "sell" },
                "price": 61000.0 + i as f64,
                "size": 0.1,
                "type": "fill"
            })
        })
        .collect();
    json!({ "result": "success", "history": history })
}

pub fn placed_payload() -> Value {
    json!({
        "result": "success",
        "sendStatus": { "status": "placed", "order_id": "c18f0c17-9971-40e6-8e5b-10df05d422f0" },
        "serverTime": "2024-01-01T00:00:00.000Z"
    })
}

/// A venue with every read healthy and order entry accepting.
pub fn healthy_venue() -> FakeTransport {
    FakeTransport::new()
        .route(ACCOUNTS, 200, accounts_payload())
        .route(OPEN_POSITIONS, 200, positions_payload())
        .route(OPEN_ORDERS, 200, orders_payload())
        .route(TICKERS, 200, tickers_payload())
        .route(ORDER_BOOK, 200, book_payload())
        .route(HISTORY, 200, trades_payload())
        .route(SEND_ORDER, 200, placed_payload())
        .route(CANCEL_ALL_ORDERS, 200, json!({ "result": "success", "cancelStatus": { "status": "cancelled" } }))
        .route(EDIT_ORDER, 200, json!({ "result": "success", "editStatus": { "status": "edited" } }))
        .route(CANCEL_ORDER, 200, json!({ "result": "success", "cancelStatus": { "status": "cancelled" } }))
        .route(BATCH_ORDER, 200, json!({ "result": "success", "batchStatus": [] }))
        .route(CANCEL_ALL_ORDERS_AFTER, 200, json!({ "result": "success", "status": {} }))
}

/// Decision client that replays scripted answers; the last one repeats.
pub struct ScriptedDecision {
    answers: Mutex<VecDeque<Result<String, DecisionError>>>,
    last: Mutex<Option<Result<String, DecisionError>>>,
    prompts: Mutex<Vec<String>>,
    started: Mutex<Vec<Instant>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDecision {
    pub fn new(answers: Vec<Result<String, DecisionError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn started(&self) -> Vec<Instant> {
        self.started.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionClient for ScriptedDecision {
    async fn propose(&self, context: &str) -> Result<String, DecisionError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.prompts.lock().push(context.to_string());
        self.started.lock().push(Instant::now());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let answer = {
            let mut answers = self.answers.lock();
            let mut last = self.last.lock();
            match answers.pop_front() {
                Some(answer) => {
                    *last = Some(answer.clone());
                    answer
                }
                None => last.clone().unwrap_or(Err(DecisionError::EmptyResponse)),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}
