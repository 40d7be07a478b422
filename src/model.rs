use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderKind {
    #[serde(rename = "lmt")]
    Limit,
    #[serde(rename = "mkt")]
    Market,
    #[serde(rename = "post")]
    PostOnly,
    #[serde(rename = "ioc")]
    ImmediateOrCancel,
    #[serde(rename = "stp")]
    Stop,
    #[serde(rename = "take_profit")]
    TakeProfit,
    #[serde(rename = "trailing_stop")]
    TrailingStop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSignal {
    Mark,
    Index,
    Last,
}

/// Parameters of `POST /api/v3/sendorder`. Field names are the venue's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderRequest {
    pub order_type: OrderKind,
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_ord_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_signal: Option<TriggerSignal>,
}

/// Parameters of `POST /api/v3/editorder`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditOrderRequest {
    #[serde(default, alias = "order_id", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_ord_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
}

/// Parameters of `POST /api/v3/cancelorder`. The venue spells the id `order_id` here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CancelOrderRequest {
    #[serde(default, alias = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, rename = "cliOrdId", skip_serializing_if = "Option::is_none")]
    pub cli_ord_id: Option<String>,
}

impl CancelOrderRequest {
    pub fn by_order_id(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            cli_ord_id: None,
        }
    }
}

/// One element of a `batchorder` submission. Sizes and prices go out as JSON numbers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "order", rename_all = "lowercase")]
pub enum BatchInstruction {
    Send {
        order_tag: String,
        #[serde(rename = "orderType")]
        order_type: OrderKind,
        symbol: String,
        side: Side,
        #[serde(with = "rust_decimal::serde::float")]
        size: Decimal,
        #[serde(
            rename = "limitPrice",
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        limit_price: Option<Decimal>,
        #[serde(
            rename = "stopPrice",
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        stop_price: Option<Decimal>,
        #[serde(rename = "cliOrdId", skip_serializing_if = "Option::is_none")]
        cli_ord_id: Option<String>,
        #[serde(rename = "reduceOnly", skip_serializing_if = "Option::is_none")]
        reduce_only: Option<bool>,
    },
    Edit {
        #[serde(skip_serializing_if = "Option::is_none")]
        order_id: Option<String>,
        #[serde(rename = "cliOrdId", skip_serializing_if = "Option::is_none")]
        cli_ord_id: Option<String>,
        #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
        size: Option<Decimal>,
        #[serde(
            rename = "limitPrice",
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        limit_price: Option<Decimal>,
        #[serde(
            rename = "stopPrice",
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        stop_price: Option<Decimal>,
    },
    Cancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        order_id: Option<String>,
        #[serde(rename = "cliOrdId", skip_serializing_if = "Option::is_none")]
        cli_ord_id: Option<String>,
    },
}

impl BatchInstruction {
    pub fn send(order_tag: impl Into<String>, order: OrderRequest) -> Self {
        Self::Send {
            order_tag: order_tag.into(),
            order_type: order.order_type,
            symbol: order.symbol,
            side: order.side,
            size: order.size,
            limit_price: order.limit_price,
            stop_price: order.stop_price,
            cli_ord_id: order.cli_ord_id,
            reduce_only: order.reduce_only,
        }
    }

    pub fn cancel(order_id: impl Into<String>) -> Self {
        Self::Cancel {
            order_id: Some(order_id.into()),
            cli_ord_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchOrder {
    #[serde(rename = "batchOrder")]
    pub batch_order: Vec<BatchInstruction>,
}
