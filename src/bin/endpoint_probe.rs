use futures::future::{BoxFuture, FutureExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use kraken_agent_rs::aggregator::summarize_ticker;
use kraken_agent_rs::config::Settings;
use kraken_agent_rs::exchange::{ExchangeError, KrakenFuturesClient, RequestDispatcher, ReqwestTransport};
use kraken_agent_rs::model::{
    BatchInstruction, BatchOrder, CancelOrderRequest, EditOrderRequest, OrderKind, OrderRequest, Side,
};

struct ProbeArgs {
    write: bool,
    symbol: Option<String>,
    pause: Duration,
}

fn parse_args() -> ProbeArgs {
    let mut args = ProbeArgs {
        write: false,
        symbol: None,
        pause: Duration::from_secs(1),
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--write" => args.write = true,
            "--symbol" => args.symbol = iter.next(),
            "--pause-ms" => {
                if let Some(ms) = iter.next().and_then(|v| v.parse().ok()) {
                    args.pause = Duration::from_millis(ms);
                }
            }
            other => warn!("ignoring unknown argument '{}'", other),
        }
    }
    args
}

struct Probe {
    pause: Duration,
    passed: usize,
    failed: usize,
}

impl Probe {
    /// Run one call, log its outcome, and pause before the next one.
    async fn run(&mut self, name: &str, call: BoxFuture<'_, Result<Value, ExchangeError>>) -> Option<Value> {
        let result = call.await;
        let value = match result {
            Ok(value) => {
                match value.get("result").and_then(Value::as_str) {
                    Some("error") => warn!(endpoint = name, venue_error = %value["error"], "venue rejected call"),
                    _ => info!(endpoint = name, "ok"),
                }
                self.passed += 1;
                Some(value)
            }
            Err(e) => {
                error!(endpoint = name, error = %e, "call failed");
                self.failed += 1;
                None
            }
        };
        tokio::time::sleep(self.pause).await;
        value
    }
}

fn far_from_market(symbol: &str, price: Decimal, cli_ord_id: Option<String>) -> OrderRequest {
    OrderRequest {
        order_type: OrderKind::Limit,
        symbol: symbol.to_string(),
        side: Side::Buy,
        size: dec!(1),
        limit_price: Some(price),
        stop_price: None,
        cli_ord_id,
        reduce_only: None,
        trigger_signal: None,
    }
}

fn placed_order_id(response: &Value) -> Option<String> {
    response
        .pointer("/sendStatus/order_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    let args = parse_args();
    let settings = Settings::new()?;
    let symbol = args.symbol.clone().unwrap_or_else(|| settings.agent.symbol.clone());
    let base_url = settings.exchange.resolved_base_url();
    let transport = Arc::new(ReqwestTransport::new());

    let private = settings.exchange.credentials().ok();
    let dispatcher = match private.clone() {
        Some(credentials) => RequestDispatcher::new(base_url.clone(), credentials, transport)?,
        None => {
            warn!("no exchange credentials configured, probing public endpoints only");
            RequestDispatcher::public(base_url.clone(), transport)
        }
    };
    let client = KrakenFuturesClient::new(dispatcher);
    let mut probe = Probe {
        pause: args.pause,
        passed: 0,
        failed: 0,
    };

    info!(base_url = %base_url, symbol = %symbol, write = args.write, "🔧 Probing endpoints");

    // --- Public reads ---
    probe.run("instruments", client.instruments().boxed()).await;
    let tickers = probe.run("tickers", client.tickers().boxed()).await;
    probe.run("orderbook", client.order_book(&symbol).boxed()).await;
    probe.run("history", client.trade_history(&symbol, None).boxed()).await;

    if private.is_none() {
        info!(passed = probe.passed, failed = probe.failed, "Probe finished");
        return Ok(());
    }

    // --- Private reads ---
    probe.run("accounts", client.accounts().boxed()).await;
    probe.run("openpositions", client.open_positions().boxed()).await;
    probe.run("openorders", client.open_orders().boxed()).await;
    probe.run("recentorders", client.recent_orders(Some(&symbol)).boxed()).await;
    probe.run("fills", client.fills(None).boxed()).await;
    probe.run("transfers", client.transfers(None).boxed()).await;
    probe.run("notifications", client.notifications().boxed()).await;
    probe.run("account-log", client.account_log().boxed()).await;

    if args.write {
        let mark = tickers
            .as_ref()
            .and_then(|t| summarize_ticker(t, &symbol))
            .and_then(|t| t.mark_price.or(t.last));

        match mark {
            Some(mark) => {
                let far_price = (mark / dec!(2)).round_dp(0);
                let order = far_from_market(&symbol, far_price, Some(uuid::Uuid::new_v4().to_string()));
                let placed = probe.run("sendorder", client.send_order(&order).boxed()).await;

                if let Some(order_id) = placed.as_ref().and_then(placed_order_id) {
                    let edit = EditOrderRequest {
                        order_id: Some(order_id.clone()),
                        limit_price: Some((far_price * dec!(0.9)).round_dp(0)),
                        ..Default::default()
                    };
                    probe.run("editorder", client.edit_order(&edit).boxed()).await;
                    let cancel = CancelOrderRequest::by_order_id(order_id);
                    probe.run("cancelorder", client.cancel_order(&cancel).boxed()).await;
                } else {
                    warn!("order was not placed, skipping edit and cancel");
                }

                let batch = BatchOrder {
                    batch_order: vec![
                        BatchInstruction::send("1", far_from_market(&symbol, far_price, None)),
                        BatchInstruction::send("2", far_from_market(&symbol, (far_price * dec!(0.9)).round_dp(0), None)),
                    ],
                };
                probe.run("batchorder", client.batch_order(&batch).boxed()).await;
            }
            None => warn!(symbol = %symbol, "no mark price available, skipping order placement"),
        }

        probe.run("cancelallorders", client.cancel_all_orders(Some(&symbol)).boxed()).await;
        probe.run("cancelallordersafter (arm)", client.cancel_all_orders_after(Some(60)).boxed()).await;
        probe.run("cancelallordersafter (query)", client.cancel_all_orders_after(None).boxed()).await;
        probe.run("cancelallordersafter (disarm)", client.cancel_all_orders_after(Some(0)).boxed()).await;
    }

    info!(passed = probe.passed, failed = probe.failed, "Probe finished");
    Ok(())
}
