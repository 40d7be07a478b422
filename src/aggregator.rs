//! Per-cycle market snapshot.
//!
//! All reads are issued together and awaited together; only the account read is
//! mandatory. Every other slice degrades to `None` on failure so a flaky order
//! book endpoint cannot stop the agent from reasoning about its positions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::exchange::{ExchangeError, KrakenFuturesClient};

/// Levels kept per side of the book.
pub const BOOK_DEPTH: usize = 5;
/// Most recent public trades kept.
pub const TRADE_HISTORY_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("account read failed: {0}")]
    AccountRead(#[from] ExchangeError),
    #[error("account payload unusable: {0}")]
    AccountPayload(String),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AccountBalance {
    pub name: String,
    pub account_type: Option<String>,
    pub portfolio_value: Option<Decimal>,
    pub available_margin: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    /// Non-zero currency balances.
    pub balances: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AccountSummary {
    pub accounts: Vec<AccountBalance>,
    pub total_available_margin: Option<Decimal>,
    pub total_unrealized_pnl: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PositionSummary {
    pub symbol: String,
    pub side: String,
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub pnl: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSummary {
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub size: Option<Decimal>,
    pub price: Option<Decimal>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TickerSummary {
    pub symbol: String,
    pub last: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub bid_size: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub ask_size: Option<Decimal>,
    pub vol_24h: Option<Decimal>,
    pub open_interest: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
    pub change_24h: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BookSummary {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TradeSummary {
    pub time: Option<String>,
    pub side: Option<String>,
    pub price: Decimal,
    pub size: Decimal,
}

/// Everything the decision service is shown about the market for one cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarketContext {
    pub symbol: String,
    pub account: AccountSummary,
    pub positions: Option<Vec<PositionSummary>>,
    pub open_orders: Option<Vec<OrderSummary>>,
    pub ticker: Option<TickerSummary>,
    pub order_book: Option<BookSummary>,
    pub recent_trades: Option<Vec<TradeSummary>>,
}

pub struct ContextAggregator {
    client: Arc<KrakenFuturesClient>,
}

impl ContextAggregator {
    pub fn new(client: Arc<KrakenFuturesClient>) -> Self {
        Self { client }
    }

    pub async fn aggregate(&self, symbol: &str) -> Result<MarketContext, AggregationError> {
        let (accounts, positions, orders, tickers, book, history) = tokio::join!(
            self.client.accounts(),
            self.client.open_positions(),
            self.client.open_orders(),
            self.client.tickers(),
            self.client.order_book(symbol),
            self.client.trade_history(symbol, None),
        );

        let account = summarize_account(&accounts?)?;

        let tickers = settle("tickers", tickers);
        let ticker = tickers.as_ref().and_then(|t| summarize_ticker(t, symbol));
        let positions = settle("positions", positions)
            .and_then(|p| summarize_positions(&p, tickers.as_ref()));
        let open_orders = settle("open_orders", orders).and_then(|o| summarize_orders(&o));
        let order_book = settle("order_book", book).and_then(|b| summarize_book(&b));
        let recent_trades = settle("trade_history", history).and_then(|h| summarize_trades(&h));

        debug!(
            symbol,
            positions = positions.is_some(),
            orders = open_orders.is_some(),
            ticker = ticker.is_some(),
            book = order_book.is_some(),
            trades = recent_trades.is_some(),
            "market context aggregated"
        );

        Ok(MarketContext {
            symbol: symbol.to_string(),
            account,
            positions,
            open_orders,
            ticker,
            order_book,
            recent_trades,
        })
    }
}

fn settle(slice: &str, result: Result<Value, ExchangeError>) -> Option<Value> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(slice, error = %e, "context slice unavailable");
            None
        }
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn decimal_at(value: &Value, pointer: &str) -> Option<Decimal> {
    value.pointer(pointer).and_then(decimal)
}

fn sum_present(values: impl Iterator<Item = Option<Decimal>>) -> Option<Decimal> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or_default() + v))
}

fn non_zero_balances(balances: Option<&Value>, quantity_field: Option<&str>) -> BTreeMap<String, Decimal> {
    let Some(Value::Object(map)) = balances else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(currency, raw)| {
            let amount = match quantity_field {
                Some(field) => raw.get(field).and_then(decimal),
                None => decimal(raw),
            }?;
            (!amount.is_zero()).then(|| (currency.clone(), amount))
        })
        .collect()
}

pub fn summarize_account(payload: &Value) -> Result<AccountSummary, AggregationError> {
    let accounts = payload
        .get("accounts")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            let venue_error = payload.get("error").and_then(Value::as_str).unwrap_or("no accounts in response");
            AggregationError::AccountPayload(venue_error.to_string())
        })?;

    let accounts: Vec<AccountBalance> = accounts
        .iter()
        .map(|(name, raw)| {
            let account_type = raw.get("type").and_then(Value::as_str).map(str::to_string);
            match account_type.as_deref() {
                Some("multiCollateralMarginAccount") => AccountBalance {
                    name: name.clone(),
                    portfolio_value: decimal_at(raw, "/portfolioValue"),
                    available_margin: decimal_at(raw, "/availableMargin"),
                    unrealized_pnl: decimal_at(raw, "/totalUnrealized").or_else(|| decimal_at(raw, "/pnl")),
                    balances: non_zero_balances(raw.get("currencies"), Some("quantity")),
                    account_type,
                },
                _ => AccountBalance {
                    name: name.clone(),
                    portfolio_value: decimal_at(raw, "/auxiliary/pv"),
                    available_margin: decimal_at(raw, "/auxiliary/af"),
                    unrealized_pnl: decimal_at(raw, "/auxiliary/pnl"),
                    balances: non_zero_balances(raw.get("balances"), None),
                    account_type,
                },
            }
        })
        .collect();

    Ok(AccountSummary {
        total_available_margin: sum_present(accounts.iter().map(|a| a.available_margin)),
        total_unrealized_pnl: sum_present(accounts.iter().map(|a| a.unrealized_pnl)),
        accounts,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last: Option<Decimal>,
    mark_price: Option<Decimal>,
    bid: Option<Decimal>,
    bid_size: Option<Decimal>,
    ask: Option<Decimal>,
    ask_size: Option<Decimal>,
    vol24h: Option<Decimal>,
    open_interest: Option<Decimal>,
    funding_rate: Option<Decimal>,
    change24h: Option<Decimal>,
}

impl From<RawTicker> for TickerSummary {
    fn from(raw: RawTicker) -> Self {
        Self {
            symbol: raw.symbol,
            last: raw.last,
            mark_price: raw.mark_price,
            bid: raw.bid,
            bid_size: raw.bid_size,
            ask: raw.ask,
            ask_size: raw.ask_size,
            vol_24h: raw.vol24h,
            open_interest: raw.open_interest,
            funding_rate: raw.funding_rate,
            change_24h: raw.change24h,
        }
    }
}

fn raw_tickers(payload: &Value) -> impl Iterator<Item = RawTicker> + '_ {
    payload
        .get("tickers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|t| serde_json::from_value::<RawTicker>(t.clone()).ok())
}

pub fn summarize_ticker(payload: &Value, symbol: &str) -> Option<TickerSummary> {
    raw_tickers(payload)
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
        .map(TickerSummary::from)
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    symbol: String,
    side: String,
    size: Decimal,
    price: Option<Decimal>,
    pnl: Option<Decimal>,
}

/// Unrealized P&L for linear (`PF_`) contracts when the venue does not report it.
fn linear_pnl(position: &RawPosition, mark: Option<Decimal>) -> Option<Decimal> {
    if !position.symbol.to_ascii_lowercase().starts_with("pf_") {
        return None;
    }
    let direction = if position.side.eq_ignore_ascii_case("short") {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ONE
    };
    Some((mark? - position.price?) * position.size * direction)
}

pub fn summarize_positions(payload: &Value, tickers: Option<&Value>) -> Option<Vec<PositionSummary>> {
    let raw = payload.get("openPositions")?.as_array()?;
    let marks: BTreeMap<String, Decimal> = tickers
        .map(|t| {
            raw_tickers(t)
                .filter_map(|t| Some((t.symbol.to_ascii_lowercase(), t.mark_price?)))
                .collect()
        })
        .unwrap_or_default();

    Some(
        raw.iter()
            .filter_map(|p| serde_json::from_value::<RawPosition>(p.clone()).ok())
            .map(|p| {
                let pnl = p
                    .pnl
                    .or_else(|| linear_pnl(&p, marks.get(&p.symbol.to_ascii_lowercase()).copied()));
                PositionSummary {
                    symbol: p.symbol,
                    side: p.side,
                    size: p.size,
                    entry_price: p.price,
                    pnl,
                }
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpenOrder {
    order_id: String,
    symbol: String,
    side: String,
    order_type: String,
    unfilled_size: Option<Decimal>,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
    status: Option<String>,
}

pub fn summarize_orders(payload: &Value) -> Option<Vec<OrderSummary>> {
    let raw = payload.get("openOrders")?.as_array()?;
    Some(
        raw.iter()
            .filter_map(|o| {
                // The venue mixes `order_id` with camelCase for the other fields.
                let mut o = o.clone();
                if let Some(obj) = o.as_object_mut() {
                    if let Some(id) = obj.remove("order_id") {
                        obj.insert("orderId".into(), id);
                    }
                }
                serde_json::from_value::<RawOpenOrder>(o).ok()
            })
            .map(|o| OrderSummary {
                order_id: o.order_id,
                symbol: o.symbol,
                side: o.side,
                order_type: o.order_type,
                size: o.unfilled_size,
                price: o.limit_price.or(o.stop_price),
                status: o.status,
            })
            .collect(),
    )
}

fn book_side(levels: Option<&Value>, descending: bool) -> Vec<BookLevel> {
    let mut parsed: Vec<BookLevel> = levels
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|level| {
            let pair = level.as_array()?;
            Some(BookLevel {
                price: decimal(pair.first()?)?,
                size: decimal(pair.get(1)?)?,
            })
        })
        .collect();
    if descending {
        parsed.sort_by(|a, b| b.price.cmp(&a.price));
    } else {
        parsed.sort_by(|a, b| a.price.cmp(&b.price));
    }
    parsed.truncate(BOOK_DEPTH);
    parsed
}

pub fn summarize_book(payload: &Value) -> Option<BookSummary> {
    let book = payload.get("orderBook")?;
    Some(BookSummary {
        bids: book_side(book.get("bids"), true),
        asks: book_side(book.get("asks"), false),
    })
}

pub fn summarize_trades(payload: &Value) -> Option<Vec<TradeSummary>> {
    let raw = payload.get("history")?.as_array()?;
    let mut trades: Vec<TradeSummary> = raw
        .iter()
        .filter_map(|t| {
            Some(TradeSummary {
                time: t.get("time").and_then(Value::as_str).map(str::to_string),
                side: t.get("side").and_then(Value::as_str).map(str::to_string),
                price: t.get("price").and_then(decimal)?,
                size: t.get("size").and_then(decimal)?,
            })
        })
        .collect();
    // ISO-8601 timestamps order lexicographically; newest first.
    trades.sort_by(|a, b| b.time.cmp(&a.time));
    trades.truncate(TRADE_HISTORY_LEN);
    Some(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn flex_and_margin_accounts_are_summarized() {
        let payload = json!({
            "result": "success",
            "accounts": {
                "flex": {
                    "type": "multiCollateralMarginAccount",
                    "currencies": {"USD": {"quantity": 1500.5}, "XBT": {"quantity": 0.0}},
                    "portfolioValue": 1510.25,
                    "availableMargin": 1200.0,
                    "totalUnrealized": 9.75
                },
                "fi_xbtusd": {
                    "type": "marginAccount",
                    "balances": {"xbt": 0.01},
                    "auxiliary": {"af": 0.005, "pnl": -0.0001, "pv": 0.0099}
                }
            }
        });

        let summary = summarize_account(&payload).unwrap();
        assert_eq!(summary.accounts.len(), 2);
        let flex = summary.accounts.iter().find(|a| a.name == "flex").unwrap();
        assert_eq!(flex.available_margin, Some(dec!(1200.0)));
        assert_eq!(flex.balances.len(), 1);
        assert_eq!(summary.total_available_margin, Some(dec!(1200.005)));
        assert_eq!(summary.total_unrealized_pnl, Some(dec!(9.7499)));
    }

    #[test]
    fn account_payload_without_accounts_is_an_error() {
        let payload = json!({"result": "error", "error": "authenticationError"});
        match summarize_account(&payload) {
            Err(AggregationError::AccountPayload(detail)) => assert_eq!(detail, "authenticationError"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn book_is_sorted_and_truncated() {
        let bids: Vec<Value> = (0..20).map(|i| json!([100 + i, 1])).collect();
        let asks: Vec<Value> = (0..20).map(|i| json!([200 - i, 2])).collect();
        let payload = json!({"orderBook": {"bids": bids, "asks": asks}});

        let book = summarize_book(&payload).unwrap();
        assert_eq!(book.bids.len(), BOOK_DEPTH);
        assert_eq!(book.asks.len(), BOOK_DEPTH);
        assert_eq!(book.bids[0].price, dec!(119));
        assert_eq!(book.asks[0].price, dec!(181));
    }

    #[test]
    fn trades_keep_most_recent_ten() {
        let history: Vec<Value> = (0..30)
            .map(|i| json!({"time": format!("2024-01-01T00:00:{:02}.000Z", i), "price": 50000 + i, "size": 1, "side": "buy"}))
            .collect();
        let trades = summarize_trades(&json!({"history": history})).unwrap();
        assert_eq!(trades.len(), TRADE_HISTORY_LEN);
        assert_eq!(trades[0].time.as_deref(), Some("2024-01-01T00:00:29.000Z"));
        assert_eq!(trades[9].price, dec!(50020));
    }

    #[test]
    fn ticker_lookup_ignores_symbol_case() {
        let payload = json!({"tickers": [
            {"symbol": "PF_ETHUSD", "markPrice": 3000.0},
            {"symbol": "PF_XBTUSD", "markPrice": 65000.5, "bid": 65000.0, "ask": 65001.0}
        ]});
        let ticker = summarize_ticker(&payload, "pf_xbtusd").unwrap();
        assert_eq!(ticker.mark_price, Some(dec!(65000.5)));
        assert!(summarize_ticker(&payload, "pf_solusd").is_none());
    }

    #[test]
    fn linear_position_pnl_is_estimated_from_mark() {
        let positions = json!({"openPositions": [
            {"symbol": "PF_XBTUSD", "side": "short", "size": 0.5, "price": 60000.0}
        ]});
        let tickers = json!({"tickers": [{"symbol": "PF_XBTUSD", "markPrice": 59000.0}]});
        let summary = summarize_positions(&positions, Some(&tickers)).unwrap();
        assert_eq!(summary[0].pnl, Some(dec!(500.0)));
    }

    #[test]
    fn open_orders_accept_snake_case_id() {
        let payload = json!({"openOrders": [{
            "order_id": "a1", "symbol": "pf_xbtusd", "side": "buy", "orderType": "lmt",
            "limitPrice": 1000, "unfilledSize": 1, "status": "untouched"
        }]});
        let orders = summarize_orders(&payload).unwrap();
        assert_eq!(orders[0].order_id, "a1");
        assert_eq!(orders[0].price, Some(dec!(1000)));
    }
}
