use serde::Serialize;

use crate::aggregator::MarketContext;
use crate::history::History;

const UNAVAILABLE: &str = "unavailable";

const ROLE: &str = "You are an autonomous trading agent managing a Kraken Futures account. \
Each cycle you receive the account state, open positions and orders, a market snapshot, \
and the outcomes of your previous actions. Choose exactly one action.";

const COMMAND_REFERENCE: &str = r#"1. sendOrder: place a new order.
   parameters: orderType ("lmt" | "mkt" | "post" | "ioc" | "stp" | "take_profit" | "trailing_stop"),
               symbol, side ("buy" | "sell"), size,
               optional limitPrice, stopPrice, cliOrdId, reduceOnly, triggerSignal ("mark" | "index" | "last")
2. editOrder: change a resting order.
   parameters: orderId or cliOrdId, optional size, limitPrice, stopPrice
3. cancelOrder: cancel one resting order.
   parameters: order_id or cliOrdId
4. cancelAllOrders: cancel every resting order on a symbol.
   parameters: symbol
5. doNothing: take no action this cycle.
   parameters: reason"#;

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else, for example:
{"function": "doNothing", "parameters": {"reason": "spread too wide"}}"#;

fn render<T: Serialize>(value: Option<&T>) -> String {
    value
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

/// Builds the natural-language context document sent to the decision service.
pub fn build_prompt(context: &MarketContext, history: &History) -> String {
    let ticker_title = format!("Ticker ({})", context.symbol);
    let sections = [
        ("Role", ROLE.to_string()),
        ("Account", render(Some(&context.account))),
        ("Open positions", render(context.positions.as_ref())),
        ("Open orders", render(context.open_orders.as_ref())),
        (ticker_title.as_str(), render(context.ticker.as_ref())),
        ("Order book (top 5 levels)", render(context.order_book.as_ref())),
        ("Recent trades (newest first)", render(context.recent_trades.as_ref())),
        ("Your previous actions and their outcomes", history.transcript()),
        ("Available commands", COMMAND_REFERENCE.to_string()),
        ("Response format", RESPONSE_FORMAT.to_string()),
    ];

    sections
        .iter()
        .map(|(title, body)| format!("## {}\n{}", title, body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AccountSummary, BookLevel, BookSummary};
    use rust_decimal_macros::dec;

    fn context() -> MarketContext {
        MarketContext {
            symbol: "PF_XBTUSD".into(),
            account: AccountSummary::default(),
            positions: Some(vec![]),
            open_orders: None,
            ticker: None,
            order_book: Some(BookSummary {
                bids: vec![BookLevel { price: dec!(100), size: dec!(1) }],
                asks: vec![],
            }),
            recent_trades: None,
        }
    }

    #[test]
    fn missing_slices_are_marked_unavailable() {
        let prompt = build_prompt(&context(), &History::new());
        assert!(prompt.contains("## Open orders\nunavailable"));
        assert!(prompt.contains("## Ticker (PF_XBTUSD)\nunavailable"));
        assert!(prompt.contains("## Open positions\n[]"));
    }

    #[test]
    fn lists_every_command_and_history() {
        let prompt = build_prompt(&context(), &History::new());
        for function in crate::command::FUNCTIONS {
            assert!(prompt.contains(function), "missing {}", function);
        }
        assert!(prompt.contains("No previous actions."));
    }
}
