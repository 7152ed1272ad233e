//! CryptoCompare Wire Message Types
//!
//! Wire format types for the streamer (v2) WebSocket protocol and the
//! coin-list REST endpoint.
//!
//! # Streamer Frames
//!
//! Every inbound frame is a JSON object carrying a `TYPE` discriminator:
//!
//! ```json
//! {"TYPE":"20","MESSAGE":"STREAMERWELCOME"}
//! {"TYPE":"401","MESSAGE":"UNAUTHORIZED"}
//! {"TYPE":"429","MESSAGE":"TOO_MANY_SOCKETS_MAX_1_PER_CLIENT"}
//! {"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~FOO~USD"}
//! {"TYPE":"5","MARKET":"CCCAGG","FROMSYMBOL":"BTC","TOSYMBOL":"USD","PRICE":67012.5}
//! ```
//!
//! Outbound requests are JSON objects:
//!
//! ```json
//! {"action":"SubAdd","subs":["5~CCCAGG~BTC~USD"]}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::streaming::OutboundRequest;

// =============================================================================
// Frame Discriminators
// =============================================================================

/// Welcome / login acknowledgement.
pub const TYPE_WELCOME: &str = "20";

/// Authentication failure.
pub const TYPE_UNAUTHORIZED: &str = "401";

/// Rate limited.
pub const TYPE_RATE_LIMIT: &str = "429";

/// Server or subscription error.
pub const TYPE_SERVER_ERROR: &str = "500";

/// Aggregate ticker update.
pub const TYPE_AGGREGATE_TICK: &str = "5";

// =============================================================================
// Known MESSAGE values
// =============================================================================

/// Rate limit raised when a second socket is opened for the same key.
pub const MSG_TOO_MANY_SOCKETS: &str = "TOO_MANY_SOCKETS_MAX_1_PER_CLIENT";

/// Malformed subscription identifier.
pub const MSG_INVALID_SUB: &str = "INVALID_SUB";

/// Well-formed but unknown subscription identifier.
pub const MSG_SUBSCRIPTION_UNRECOGNIZED: &str = "SUBSCRIPTION_UNRECOGNIZED";

// =============================================================================
// Frame Field Names
// =============================================================================

/// Discriminator field.
pub const FIELD_TYPE: &str = "TYPE";
/// Human readable message field.
pub const FIELD_MESSAGE: &str = "MESSAGE";
/// Offending parameter on error frames.
pub const FIELD_PARAMETER: &str = "PARAMETER";
/// Base symbol on tick frames.
pub const FIELD_FROM_SYMBOL: &str = "FROMSYMBOL";
/// Price on tick frames.
pub const FIELD_PRICE: &str = "PRICE";

// =============================================================================
// Outbound Messages
// =============================================================================

/// Subscription change request.
///
/// # Wire Format (JSON)
/// ```json
/// {"action":"SubRemove","subs":["5~CCCAGG~ETH~USD"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// `SubAdd` or `SubRemove`.
    pub action: String,
    /// Subscription identifiers.
    pub subs: Vec<String>,
}

impl From<&OutboundRequest> for SubscriptionMessage {
    fn from(request: &OutboundRequest) -> Self {
        Self {
            action: request.action().to_string(),
            subs: request.subs().to_vec(),
        }
    }
}

// =============================================================================
// Coin List (REST)
// =============================================================================

/// Response body of the coin-list summary endpoint.
///
/// Only `Data` is read; every other top-level field is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinListResponse {
    /// Records keyed by symbol.
    #[serde(rename = "Data", default)]
    pub data: BTreeMap<String, CoinListRecord>,
}

/// One coin-list record. Unrelated fields are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinListRecord {
    /// Ticker symbol.
    #[serde(rename = "Symbol")]
    pub symbol: Option<String>,
    /// Display name, e.g. `Bitcoin (BTC)`.
    #[serde(rename = "FullName")]
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_message_from_request() {
        let request = OutboundRequest::SubscribeAdd {
            subs: vec!["5~CCCAGG~BTC~USD".to_string()],
        };
        let msg = SubscriptionMessage::from(&request);
        assert_eq!(msg.action, "SubAdd");
        assert_eq!(msg.subs, vec!["5~CCCAGG~BTC~USD"]);
    }

    #[test]
    fn coin_list_ignores_extra_fields() {
        let json = r#"{
            "Response": "Success",
            "Data": {
                "ETH": {"Id": "7605", "Symbol": "ETH", "FullName": "Ethereum (ETH)", "ImageUrl": "/x.png"},
                "BTC": {"Id": "1182", "Symbol": "BTC", "FullName": "Bitcoin (BTC)"}
            }
        }"#;

        let parsed: CoinListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 2);
        let btc = &parsed.data["BTC"];
        assert_eq!(btc.symbol.as_deref(), Some("BTC"));
        assert_eq!(btc.full_name.as_deref(), Some("Bitcoin (BTC)"));
    }

    #[test]
    fn coin_list_missing_data_is_empty() {
        let parsed: CoinListResponse = serde_json::from_str(r#"{"Response":"Error"}"#).unwrap();
        assert!(parsed.data.is_empty());
    }
}
