//! Stream Codec Module
//!
//! Stateless translation between domain requests/events and the streamer's
//! JSON wire format.
//!
//! Decoding is total: any input text maps to exactly one `ProtocolEvent`.
//! Frames that cannot be parsed, are not objects, or carry an unknown or
//! missing `TYPE` become `ProtocolEvent::Unrecognized`.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::messages::{
    FIELD_FROM_SYMBOL, FIELD_MESSAGE, FIELD_PARAMETER, FIELD_PRICE, FIELD_TYPE,
    MSG_INVALID_SUB, MSG_SUBSCRIPTION_UNRECOGNIZED, MSG_TOO_MANY_SOCKETS, SubscriptionMessage,
    TYPE_AGGREGATE_TICK, TYPE_RATE_LIMIT, TYPE_SERVER_ERROR, TYPE_UNAUTHORIZED, TYPE_WELCOME,
};
use crate::domain::streaming::{
    OutboundRequest, PriceTick, ProtocolEvent, RateLimitKind, SubscriptionErrorKind,
};
use crate::domain::subscription::{DEFAULT_QUOTE, Subscription};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON codec for the streamer protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamCodec;

impl StreamCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Quote currency applied when the caller does not supply one.
    #[must_use]
    pub const fn default_quote() -> &'static str {
        DEFAULT_QUOTE
    }

    /// Build a `SubAdd` request with one identifier per base symbol.
    #[must_use]
    pub fn encode_subscribe<I, S>(&self, names: I, quote: &str) -> OutboundRequest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        OutboundRequest::SubscribeAdd {
            subs: identifiers(names, quote),
        }
    }

    /// Build a `SubRemove` request with one identifier per base symbol.
    #[must_use]
    pub fn encode_unsubscribe<I, S>(&self, names: I, quote: &str) -> OutboundRequest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        OutboundRequest::SubscribeRemove {
            subs: identifiers(names, quote),
        }
    }

    /// Serialize a request to its JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn serialize(&self, request: &OutboundRequest) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&SubscriptionMessage::from(request))?)
    }

    /// Decode one inbound text frame.
    #[must_use]
    pub fn decode(&self, text: &str) -> ProtocolEvent {
        let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
            return unrecognized(text);
        };
        let Some(object) = value.as_object() else {
            return unrecognized(text);
        };
        let Some(frame_type) = field_text(object, FIELD_TYPE) else {
            return unrecognized(text);
        };

        let message = field_text(object, FIELD_MESSAGE);

        match frame_type.as_str() {
            TYPE_WELCOME => ProtocolEvent::AuthOk,
            TYPE_UNAUTHORIZED => ProtocolEvent::AuthFailed { reason: message },
            TYPE_RATE_LIMIT => {
                let kind = if message.as_deref() == Some(MSG_TOO_MANY_SOCKETS) {
                    RateLimitKind::TooManySockets
                } else {
                    RateLimitKind::Generic
                };
                ProtocolEvent::RateLimited {
                    kind,
                    reason: message,
                    raw: text.to_string(),
                }
            }
            TYPE_SERVER_ERROR => {
                let kind = match message.as_deref() {
                    Some(MSG_INVALID_SUB | MSG_SUBSCRIPTION_UNRECOGNIZED) => {
                        SubscriptionErrorKind::InvalidSubscription
                    }
                    _ => SubscriptionErrorKind::Other,
                };
                ProtocolEvent::SubscriptionError {
                    kind,
                    reason: message,
                    parameter: field_text(object, FIELD_PARAMETER),
                    raw: text.to_string(),
                }
            }
            TYPE_AGGREGATE_TICK => decode_tick(object, text),
            _ => unrecognized(text),
        }
    }
}

fn identifiers<I, S>(names: I, quote: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| Subscription::ticker(name.as_ref(), quote).identifier())
        .collect()
}

fn unrecognized(text: &str) -> ProtocolEvent {
    ProtocolEvent::Unrecognized {
        raw: text.to_string(),
    }
}

/// Aggregate tick. A missing or null `PRICE` means nothing changed.
fn decode_tick(object: &Map<String, Value>, text: &str) -> ProtocolEvent {
    let symbol = field_text(object, FIELD_FROM_SYMBOL);

    match object.get(FIELD_PRICE) {
        None | Some(Value::Null) => ProtocolEvent::Unchanged { symbol },
        Some(raw_price) => match (symbol, parse_price(raw_price)) {
            (Some(symbol), Some(price)) => ProtocolEvent::PriceUpdate(PriceTick { symbol, price }),
            _ => unrecognized(text),
        },
    }
}

/// String or number field rendered as text.
fn field_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn encode_subscribe_builds_identifiers() {
        let codec = StreamCodec::new();
        let request = codec.encode_subscribe(["BTC", "eth"], "USD");
        assert_eq!(
            request,
            OutboundRequest::SubscribeAdd {
                subs: vec![
                    "5~CCCAGG~BTC~USD".to_string(),
                    "5~CCCAGG~ETH~USD".to_string()
                ]
            }
        );
    }

    #[test]
    fn encode_unsubscribe_builds_identifiers() {
        let codec = StreamCodec::new();
        let request = codec.encode_unsubscribe(vec!["XRP".to_string()], "EUR");
        assert_eq!(
            request,
            OutboundRequest::SubscribeRemove {
                subs: vec!["5~CCCAGG~XRP~EUR".to_string()]
            }
        );
    }

    #[test]
    fn default_quote_is_usd() {
        assert_eq!(StreamCodec::default_quote(), "USD");
    }

    #[test]
    fn serialize_wire_format() {
        let codec = StreamCodec::new();
        let json = codec
            .serialize(&codec.encode_subscribe(["BTC"], "USD"))
            .unwrap();
        assert_eq!(json, r#"{"action":"SubAdd","subs":["5~CCCAGG~BTC~USD"]}"#);

        let json = codec
            .serialize(&codec.encode_unsubscribe(["BTC"], "USD"))
            .unwrap();
        assert_eq!(json, r#"{"action":"SubRemove","subs":["5~CCCAGG~BTC~USD"]}"#);
    }

    #[test]
    fn decode_welcome() {
        let codec = StreamCodec::new();
        let event = codec.decode(r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME","SERVER_UPTIME_SECONDS":12}"#);
        assert_eq!(event, ProtocolEvent::AuthOk);
    }

    #[test]
    fn decode_auth_failed() {
        let codec = StreamCodec::new();
        let event = codec.decode(r#"{"TYPE":"401","MESSAGE":"bad key"}"#);
        assert_eq!(
            event,
            ProtocolEvent::AuthFailed {
                reason: Some("bad key".to_string())
            }
        );
    }

    #[test]
    fn decode_auth_failed_without_message() {
        let codec = StreamCodec::new();
        let event = codec.decode(r#"{"TYPE":"401"}"#);
        assert_eq!(event, ProtocolEvent::AuthFailed { reason: None });
    }

    #[test_case(r#"{"TYPE":"429","MESSAGE":"TOO_MANY_SOCKETS_MAX_1_PER_CLIENT"}"#, RateLimitKind::TooManySockets ; "too many sockets")]
    #[test_case(r#"{"TYPE":"429","MESSAGE":"RATE_LIMIT_EXCEEDED"}"#, RateLimitKind::Generic ; "generic")]
    #[test_case(r#"{"TYPE":"429"}"#, RateLimitKind::Generic ; "no message")]
    fn decode_rate_limit(frame: &str, expected: RateLimitKind) {
        let codec = StreamCodec::new();
        match codec.decode(frame) {
            ProtocolEvent::RateLimited { kind, raw, .. } => {
                assert_eq!(kind, expected);
                assert_eq!(raw, frame);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test_case("INVALID_SUB", SubscriptionErrorKind::InvalidSubscription ; "invalid sub")]
    #[test_case("SUBSCRIPTION_UNRECOGNIZED", SubscriptionErrorKind::InvalidSubscription ; "unrecognized sub")]
    #[test_case("INTERNAL_ERROR", SubscriptionErrorKind::Other ; "other")]
    fn decode_server_error(message: &str, expected: SubscriptionErrorKind) {
        let codec = StreamCodec::new();
        let frame =
            format!(r#"{{"TYPE":"500","MESSAGE":"{message}","PARAMETER":"5~CCCAGG~FOO~USD"}}"#);
        match codec.decode(&frame) {
            ProtocolEvent::SubscriptionError {
                kind,
                reason,
                parameter,
                ..
            } => {
                assert_eq!(kind, expected);
                assert_eq!(reason.as_deref(), Some(message));
                assert_eq!(parameter.as_deref(), Some("5~CCCAGG~FOO~USD"));
            }
            other => panic!("expected SubscriptionError, got {other:?}"),
        }
    }

    #[test]
    fn decode_server_error_missing_parameter_degrades() {
        let codec = StreamCodec::new();
        match codec.decode(r#"{"TYPE":"500","MESSAGE":"INVALID_SUB"}"#) {
            ProtocolEvent::SubscriptionError { parameter, .. } => assert!(parameter.is_none()),
            other => panic!("expected SubscriptionError, got {other:?}"),
        }
    }

    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":67012.5}"#, "67012.5" ; "float")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":67012}"#, "67012" ; "integer")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":"0.000123"}"#, "0.000123" ; "string")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":1e-7}"#, "0.0000001" ; "scientific")]
    #[test_case(r#"{"TYPE":5,"FROMSYMBOL":"BTC","PRICE":1.5}"#, "1.5" ; "numeric type")]
    fn decode_price_update(frame: &str, expected: &str) {
        let codec = StreamCodec::new();
        assert_eq!(
            codec.decode(frame),
            ProtocolEvent::PriceUpdate(PriceTick {
                symbol: "BTC".to_string(),
                price: dec(expected),
            })
        );
    }

    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC"}"# ; "absent")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":null}"# ; "null")]
    fn decode_tick_without_price(frame: &str) {
        let codec = StreamCodec::new();
        assert_eq!(
            codec.decode(frame),
            ProtocolEvent::Unchanged {
                symbol: Some("BTC".to_string())
            }
        );
    }

    #[test_case("not json" ; "garbage")]
    #[test_case("" ; "empty")]
    #[test_case("[1,2,3]" ; "array")]
    #[test_case(r#"{"MESSAGE":"hello"}"# ; "missing type")]
    #[test_case(r#"{"TYPE":"999"}"# ; "unknown type")]
    #[test_case(r#"{"TYPE":null}"# ; "null type")]
    #[test_case(r#"{"TYPE":"5","PRICE":10.0}"# ; "tick without symbol")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":"abc"}"# ; "non numeric price")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":[1]}"# ; "array price")]
    fn decode_unrecognized(frame: &str) {
        let codec = StreamCodec::new();
        assert_eq!(
            codec.decode(frame),
            ProtocolEvent::Unrecognized {
                raw: frame.to_string()
            }
        );
    }
}
