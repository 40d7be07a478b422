//! Closed command grammar for decision-service responses.
//!
//! Response text is untrusted. It is parsed into [`Command`] in one step and
//! nothing is executed unless the whole structure fits a known variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{CancelOrderRequest, EditOrderRequest, OrderRequest};

pub const FUNCTIONS: [&str; 5] = [
    "sendOrder",
    "editOrder",
    "cancelOrder",
    "cancelAllOrders",
    "doNothing",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "function", content = "parameters", deny_unknown_fields)]
pub enum Command {
    #[serde(rename = "sendOrder")]
    PlaceOrder(OrderRequest),
    #[serde(rename = "editOrder")]
    ModifyOrder(EditOrderRequest),
    #[serde(rename = "cancelOrder")]
    CancelOrder(CancelOrderRequest),
    #[serde(rename = "cancelAllOrders")]
    CancelAllForSymbol { symbol: String },
    #[serde(rename = "doNothing")]
    NoAction {
        #[serde(default)]
        reason: String,
    },
}

impl Command {
    pub fn function(&self) -> &'static str {
        match self {
            Command::PlaceOrder(_) => "sendOrder",
            Command::ModifyOrder(_) => "editOrder",
            Command::CancelOrder(_) => "cancelOrder",
            Command::CancelAllForSymbol { .. } => "cancelAllOrders",
            Command::NoAction { .. } => "doNothing",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Command::NoAction { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("decision response is empty")]
    Empty,
    #[error("decision response is not a valid command: {0}")]
    Malformed(String),
    /// Well-formed JSON naming a function outside the grammar.
    #[error("unknown function '{function}'")]
    UnknownFunction { function: String, decision: Value },
}

impl CommandError {
    /// Parse errors mean the response itself was broken; an unknown function is
    /// a well-formed answer the agent may not act on.
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, CommandError::UnknownFunction { .. })
    }
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    function: String,
    #[serde(default)]
    parameters: Value,
}

/// Returns the contents of the first fenced code block, or the trimmed input.
/// A bare JSON object is returned as is, even if a string inside it holds backticks.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return trimmed;
    }
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let mut inner = &trimmed[start + 3..];
    if let Some(line_end) = inner.find('\n') {
        let info = inner[..line_end].trim();
        if info.chars().all(|c| c.is_ascii_alphanumeric()) {
            inner = &inner[line_end + 1..];
        }
    }
    match inner.find("```") {
        Some(end) => inner[..end].trim(),
        None => inner.trim(),
    }
}

pub struct CommandValidator;

impl CommandValidator {
    pub fn validate(raw: &str) -> Result<Command, CommandError> {
        let body = strip_code_fence(raw);
        if body.is_empty() {
            return Err(CommandError::Empty);
        }

        let decision: Value = serde_json::from_str(body)
            .map_err(|e| CommandError::Malformed(format!("invalid JSON: {}", e)))?;
        let raw_decision: RawDecision = serde_json::from_value(decision.clone())
            .map_err(|e| CommandError::Malformed(format!("not a command object: {}", e)))?;

        if !FUNCTIONS.contains(&raw_decision.function.as_str()) {
            return Err(CommandError::UnknownFunction {
                function: raw_decision.function,
                decision,
            });
        }

        let parameters = match raw_decision.parameters {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let normalized = serde_json::json!({
            "function": raw_decision.function,
            "parameters": parameters,
        });
        serde_json::from_value(normalized).map_err(|e| {
            CommandError::Malformed(format!(
                "invalid parameters for {}: {}",
                raw_decision.function, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderKind, Side};
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_send_order() {
        let raw = r#"{"function":"sendOrder","parameters":{"orderType":"lmt","symbol":"PF_XBTUSD","side":"buy","size":0.01,"limitPrice":60000}}"#;
        match CommandValidator::validate(raw).unwrap() {
            Command::PlaceOrder(order) => {
                assert_eq!(order.order_type, OrderKind::Limit);
                assert_eq!(order.side, Side::Buy);
                assert_eq!(order.size, dec!(0.01));
                assert_eq!(order.limit_price, Some(dec!(60000)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_fenced_response_with_prose() {
        let raw = "Holding steady.\n```json\n{\"function\":\"doNothing\",\"parameters\":{\"reason\":\"flat market\"}}\n```\n";
        assert_eq!(
            CommandValidator::validate(raw).unwrap(),
            Command::NoAction { reason: "flat market".into() }
        );
    }

    #[test]
    fn fence_without_info_string_keeps_first_line() {
        assert_eq!(strip_code_fence("```{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn rejects_non_json_as_parse_error() {
        let err = CommandValidator::validate("not json").unwrap_err();
        assert!(err.is_parse_error());
        assert!(matches!(err, CommandError::Malformed(_)));
    }

    #[test]
    fn empty_response_is_parse_error() {
        assert_eq!(CommandValidator::validate("   "), Err(CommandError::Empty));
        assert_eq!(CommandValidator::validate("```json\n```"), Err(CommandError::Empty));
    }

    #[test]
    fn unknown_function_is_not_a_parse_error() {
        let err = CommandValidator::validate(r#"{"function":"doSomethingElse","parameters":{}}"#).unwrap_err();
        assert!(!err.is_parse_error());
        match err {
            CommandError::UnknownFunction { function, decision } => {
                assert_eq!(function, "doSomethingElse");
                assert_eq!(decision["parameters"], json!({}));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn known_function_with_wrong_fields_is_malformed() {
        let raw = r#"{"function":"sendOrder","parameters":{"symbol":"PF_XBTUSD","side":"sideways"}}"#;
        assert!(matches!(
            CommandValidator::validate(raw),
            Err(CommandError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_parameter_fields_are_malformed() {
        let misspelled = r#"{"function":"sendOrder","parameters":{"orderType":"mkt","symbol":"PF_XBTUSD","side":"sell","size":1,"reduce_only":true}}"#;
        assert!(matches!(
            CommandValidator::validate(misspelled),
            Err(CommandError::Malformed(_))
        ));

        let extras = [
            r#"{"function":"sendOrder","parameters":{"orderType":"mkt","symbol":"PF_XBTUSD","side":"sell","size":1,"leverage":50}}"#,
            r#"{"function":"editOrder","parameters":{"orderId":"abc","limitPrice":100,"side":"buy"}}"#,
            r#"{"function":"cancelOrder","parameters":{"order_id":"abc","symbol":"PF_XBTUSD"}}"#,
            r#"{"function":"cancelAllOrders","parameters":{"symbol":"PF_XBTUSD","all":true}}"#,
            r#"{"function":"doNothing","parameters":{"reason":"wait","extra":1}}"#,
        ];
        for raw in extras {
            let err = CommandValidator::validate(raw).unwrap_err();
            assert!(matches!(err, CommandError::Malformed(_)), "{} gave {:?}", raw, err);
        }
    }

    #[test]
    fn id_aliases_are_still_accepted() {
        let edit = CommandValidator::validate(
            r#"{"function":"editOrder","parameters":{"order_id":"abc","size":2}}"#,
        )
        .unwrap();
        assert!(matches!(edit, Command::ModifyOrder(e) if e.order_id.as_deref() == Some("abc")));

        let cancel = CommandValidator::validate(
            r#"{"function":"cancelOrder","parameters":{"orderId":"abc"}}"#,
        )
        .unwrap();
        assert!(matches!(cancel, Command::CancelOrder(c) if c.order_id.as_deref() == Some("abc")));
    }

    #[test]
    fn backticks_inside_bare_json_are_not_a_fence() {
        let raw = r#"{"function":"doNothing","parameters":{"reason":"saw ``` in the feed"}}"#;
        assert_eq!(
            CommandValidator::validate(raw).unwrap(),
            Command::NoAction { reason: "saw ``` in the feed".into() }
        );
    }

    #[test]
    fn cancel_all_requires_symbol() {
        assert!(CommandValidator::validate(r#"{"function":"cancelAllOrders","parameters":{}}"#).is_err());
        assert_eq!(
            CommandValidator::validate(r#"{"function":"cancelAllOrders","parameters":{"symbol":"PF_XBTUSD"}}"#).unwrap(),
            Command::CancelAllForSymbol { symbol: "PF_XBTUSD".into() }
        );
    }

    #[test]
    fn do_nothing_without_parameters_is_accepted() {
        assert_eq!(
            CommandValidator::validate(r#"{"function":"doNothing"}"#).unwrap(),
            Command::NoAction { reason: String::new() }
        );
    }

    #[test]
    fn command_serializes_back_into_grammar() {
        let value = serde_json::to_value(Command::NoAction { reason: "wait".into() }).unwrap();
        assert_eq!(value, json!({"function": "doNothing", "parameters": {"reason": "wait"}}));
    }
}
