//! Quote Envelope Decoding
//!
//! The upstream returns every numeric field as a string, with `""` or `"--"`
//! meaning "no data". Parsing is defensive: anything unparseable becomes
//! zero instead of an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::constants::quotes::{NO_DATA, SUCCESS_CODE};
use crate::types::{PriceSnapshot, price_change};

/// Top-level response of the quote endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteEnvelope {
    #[serde(default, deserialize_with = "lenient_string")]
    pub rtcode: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rtmessage: String,
    #[serde(default, rename = "msgArray")]
    pub records: Vec<RawQuote>,
}

impl QuoteEnvelope {
    pub fn is_success(&self) -> bool {
        self.rtcode == SUCCESS_CODE
    }
}

/// One per-symbol record, fields kept as the upstream sent them
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawQuote {
    #[serde(default, rename = "c", deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(default, rename = "n", deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, rename = "z", deserialize_with = "lenient_string")]
    pub price: String,
    #[serde(default, rename = "o", deserialize_with = "lenient_string")]
    pub open: String,
    #[serde(default, rename = "h", deserialize_with = "lenient_string")]
    pub high: String,
    #[serde(default, rename = "l", deserialize_with = "lenient_string")]
    pub low: String,
    #[serde(default, rename = "y", deserialize_with = "lenient_string")]
    pub prev_close: String,
    #[serde(default, rename = "v", deserialize_with = "lenient_string")]
    pub volume: String,
    #[serde(default, rename = "a", deserialize_with = "lenient_string")]
    pub amount: String,
}

impl RawQuote {
    pub fn to_snapshot(&self, observed_at: DateTime<Utc>) -> PriceSnapshot {
        let price = parse_decimal(&self.price);
        let prev_close = parse_decimal(&self.prev_close);
        let (change, change_percent) = price_change(price, prev_close);

        PriceSnapshot {
            code: self.code.trim().to_string(),
            price,
            open: parse_decimal(&self.open),
            high: parse_decimal(&self.high),
            low: parse_decimal(&self.low),
            prev_close,
            volume: parse_count(&self.volume),
            amount: parse_decimal(&self.amount),
            change,
            change_percent,
            observed_at,
        }
    }
}

/// Parse a decimal field; no-data markers and garbage become zero.
pub fn parse_decimal(raw: &str) -> f64 {
    let value = raw.trim();
    if value.is_empty() || value == NO_DATA {
        return 0.0;
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse an integer field; no-data markers and garbage become zero.
pub fn parse_count(raw: &str) -> i64 {
    let value = raw.trim();
    if value.is_empty() || value == NO_DATA {
        return 0;
    }
    value.parse::<i64>().unwrap_or(0)
}

/// Accept strings, numbers or null where a string is expected
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_markers() {
        assert_eq!(parse_decimal(""), 0.0);
        assert_eq!(parse_decimal("--"), 0.0);
        assert_eq!(parse_decimal("-"), 0.0);
        assert_eq!(parse_decimal("580.0000"), 580.0);
        assert_eq!(parse_decimal(" 12.5 "), 12.5);
        assert_eq!(parse_decimal("NaN"), 0.0);
        assert_eq!(parse_count("--"), 0);
        assert_eq!(parse_count("31245"), 31245);
        assert_eq!(parse_count("1,234"), 0);
    }

    #[test]
    fn test_envelope_decoding() {
        let envelope: QuoteEnvelope = serde_json::from_value(json!({
            "msgArray": [{
                "c": "2330", "n": "台積電", "z": "580.0000", "o": "575.0000",
                "h": "585.0000", "l": "574.0000", "y": "575.0000",
                "v": "31245", "a": "--", "ch": "2330.tw", "t": "13:30:00"
            }],
            "userDelay": 5000,
            "rtmessage": "OK",
            "queryTime": {"sysTime": "13:30:05"},
            "rtcode": "0000"
        }))
        .unwrap();

        assert!(envelope.is_success());
        assert_eq!(envelope.records.len(), 1);

        let snapshot = envelope.records[0].to_snapshot(at());
        assert_eq!(snapshot.code, "2330");
        assert_eq!(snapshot.price, 580.0);
        assert_eq!(snapshot.volume, 31245);
        assert_eq!(snapshot.amount, 0.0);
        assert!((snapshot.change - 5.0).abs() < 1e-9);
        assert!((snapshot.change_percent - 5.0 / 575.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_trade_yields_zero_price() {
        let raw: RawQuote =
            serde_json::from_value(json!({"c": "6488", "z": "-", "y": "410.5"})).unwrap();
        let snapshot = raw.to_snapshot(at());
        assert_eq!(snapshot.price, 0.0);
        assert!(!snapshot.is_persistable());
    }

    #[test]
    fn test_numeric_and_null_fields_tolerated() {
        let raw: RawQuote =
            serde_json::from_value(json!({"c": 2330, "z": 580.5, "v": null})).unwrap();
        assert_eq!(raw.code, "2330");
        assert_eq!(parse_decimal(&raw.price), 580.5);
        assert_eq!(parse_count(&raw.volume), 0);
    }

    #[test]
    fn test_failure_envelope() {
        let envelope: QuoteEnvelope =
            serde_json::from_value(json!({"rtcode": "5000", "rtmessage": "Bad request"})).unwrap();
        assert!(!envelope.is_success());
        assert!(envelope.records.is_empty());
    }

    proptest! {
        #[test]
        fn prop_parse_decimal_never_panics_and_is_finite(raw in ".*") {
            prop_assert!(parse_decimal(&raw).is_finite());
        }

        #[test]
        fn prop_parse_decimal_roundtrips_formatted_values(value in -1.0e9f64..1.0e9f64) {
            let formatted = format!("{:.4}", value);
            let parsed = parse_decimal(&formatted);
            prop_assert!((parsed - value).abs() < 1e-3);
        }

        #[test]
        fn prop_parse_count_roundtrips(value in any::<i64>()) {
            prop_assert_eq!(parse_count(&value.to_string()), value);
        }

        #[test]
        fn prop_zero_prev_close_never_divides(price in 0.0f64..10_000.0) {
            let raw = RawQuote {
                code: "1234".to_string(),
                price: format!("{}", price),
                prev_close: "--".to_string(),
                ..Default::default()
            };
            let snapshot = raw.to_snapshot(at());
            prop_assert_eq!(snapshot.change_percent, 0.0);
        }
    }
}
