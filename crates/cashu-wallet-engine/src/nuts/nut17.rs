//! NUT-17: WebSocket subscriptions
//!
//! <https://github.com/cashubtc/nuts/blob/main/17.md>

use serde::{Deserialize, Serialize};

use super::nut00::{CurrencyUnit, PaymentMethod};
use super::nut04::MintQuoteBolt11Response;
use super::nut05::MeltQuoteBolt11Response;
use super::nut07::ProofState;

/// Subscription kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Bolt11 mint quote updates
    Bolt11MintQuote,
    /// Bolt11 melt quote updates
    Bolt11MeltQuote,
    /// Proof state updates
    ProofState,
}

impl Kind {
    /// Command name as advertised in mint info
    pub fn as_command(&self) -> &'static str {
        match self {
            Self::Bolt11MintQuote => "bolt11_mint_quote",
            Self::Bolt11MeltQuote => "bolt11_melt_quote",
            Self::ProofState => "proof_state",
        }
    }
}

/// Subscription parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Params {
    /// Kind
    pub kind: Kind,
    /// Filters
    pub filters: Vec<String>,
    /// Subscription Id
    #[serde(rename = "subId")]
    pub id: String,
}

/// Supported WS methods as advertised in mint info
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedMethods {
    /// Payment Method
    pub method: PaymentMethod,
    /// Unit
    pub unit: CurrencyUnit,
    /// Commands
    pub commands: Vec<String>,
}

/// NUT-17 settings in mint info
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedSettings {
    /// Supported methods
    #[serde(default)]
    pub supported: Vec<SupportedMethods>,
}

/// Notification payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationPayload {
    /// Proof State
    ProofState(ProofState),
    /// Melt Quote Bolt11 Response
    MeltQuoteBolt11Response(MeltQuoteBolt11Response),
    /// Mint Quote Bolt11 Response
    MintQuoteBolt11Response(MintQuoteBolt11Response),
}

/// Outgoing JSON-RPC request frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsRequest {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Method: `subscribe` or `unsubscribe`
    pub method: WsMethod,
    /// Params
    pub params: serde_json::Value,
    /// Request id
    pub id: u64,
}

impl WsRequest {
    /// Subscribe request
    pub fn subscribe(params: &Params, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: WsMethod::Subscribe,
            params: serde_json::to_value(params).expect("params serialize"),
            id,
        }
    }

    /// Unsubscribe request
    pub fn unsubscribe(sub_id: &str, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: WsMethod::Unsubscribe,
            params: serde_json::json!({ "subId": sub_id }),
            id,
        }
    }
}

/// Ws request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsMethod {
    /// Subscribe
    Subscribe,
    /// Unsubscribe
    Unsubscribe,
}

/// Notification params
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsNotificationParams {
    /// Subscription id the notification belongs to
    #[serde(rename = "subId")]
    pub sub_id: String,
    /// Payload
    pub payload: NotificationPayload,
}

/// Notification frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsNotification {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Method
    pub method: String,
    /// Params
    pub params: WsNotificationParams,
}

/// Error body of an error response frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsErrorBody {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
}

/// Response frame for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Result
    pub result: serde_json::Value,
    /// Request id
    pub id: u64,
}

/// Error response frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsErrorResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Error
    pub error: WsErrorBody,
    /// Request id
    pub id: u64,
}

/// Any incoming ws frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WsMessageOrResponse {
    /// Notification from the mint
    Notification(WsNotification),
    /// Response to a request
    Response(WsResponse),
    /// Error response to a request
    ErrorResponse(WsErrorResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_wire_format() {
        let params = Params {
            kind: Kind::ProofState,
            filters: vec!["02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104".into()],
            id: "sub-1".to_string(),
        };

        let json = serde_json::to_value(WsRequest::subscribe(&params, 7)).unwrap();
        assert_eq!(json["method"], "subscribe");
        assert_eq!(json["params"]["kind"], "proof_state");
        assert_eq!(json["params"]["subId"], "sub-1");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn test_notification_parse() {
        let frame = r#"{
          "jsonrpc": "2.0",
          "method": "subscribe",
          "params": {
            "subId": "sub-1",
            "payload": {
              "Y": "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104",
              "state": "SPENT"
            }
          }
        }"#;

        let msg: WsMessageOrResponse = serde_json::from_str(frame).unwrap();
        match msg {
            WsMessageOrResponse::Notification(n) => {
                assert_eq!(n.params.sub_id, "sub-1");
                assert!(matches!(
                    n.params.payload,
                    NotificationPayload::ProofState(_)
                ));
            }
            _ => panic!("expected notification"),
        }
    }
}
