//! Models for the Fuzhou Public Water web endpoints.
//!
//! Scope: types only — no HTTP code.
//!
//! Notes
//! - The server returns loosely typed key/value records; everything is an
//!   optional field here and numeric-looking values are normalized to strings
//!   at the boundary (the server itself is inconsistent about quoting).
//! - Field names keep the utility's own keys via `serde(rename)`, so a
//!   re-serialized record matches the wire form.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Utility-assigned customer/meter account number (`yhbh`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(AccountId(s)),
            Value::Number(n) => Ok(AccountId(n.to_string())),
            other => Err(serde::de::Error::custom(format!("invalid account id: {}", other))),
        }
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accept a string, number or null where the server is inconsistent.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn loose_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// One account record from the account-lookup endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "yhbh", default)]
    pub account_id: Option<AccountId>,
    #[serde(rename = "yhmc", default, deserialize_with = "loose_string")]
    pub account_name: Option<String>,
    #[serde(rename = "yhdz", default, deserialize_with = "loose_string")]
    pub address: Option<String>,
    /// Current prepaid balance.
    #[serde(rename = "xyyc", default, deserialize_with = "loose_string")]
    pub balance: Option<String>,
    #[serde(rename = "zjje", default, deserialize_with = "loose_string")]
    pub total_due: Option<String>,
    #[serde(rename = "zlje", default, deserialize_with = "loose_string")]
    pub total_paid: Option<String>,
    #[serde(rename = "yjje", default, deserialize_with = "loose_string")]
    pub arrears: Option<String>,
    #[serde(rename = "fkje", default, deserialize_with = "loose_string")]
    pub amount_due: Option<String>,
}

/// One billing-cycle record from the bill-lookup endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    /// Six-digit `YYYYMM` billing-month tag.
    #[serde(rename = "CBNY", default, deserialize_with = "loose_string")]
    pub billing_month: Option<String>,
    #[serde(rename = "CBRQ", default, deserialize_with = "loose_string")]
    pub read_date: Option<String>,
    #[serde(rename = "SYBS", default, deserialize_with = "loose_string")]
    pub start_meter: Option<String>,
    #[serde(rename = "BYBS", default, deserialize_with = "loose_string")]
    pub end_meter: Option<String>,
    #[serde(rename = "FBYSL", default, deserialize_with = "loose_string")]
    pub usage: Option<String>,
    #[serde(rename = "ZJJE", default, deserialize_with = "loose_string")]
    pub charge: Option<String>,
    #[serde(rename = "YSJE", default, deserialize_with = "loose_string")]
    pub amount_due: Option<String>,
    #[serde(rename = "WYJ", default, deserialize_with = "loose_string")]
    pub late_fee: Option<String>,
    #[serde(rename = "WSJE", default, deserialize_with = "loose_string")]
    pub surcharge: Option<String>,
    #[serde(rename = "SFZT", default, deserialize_with = "loose_string")]
    pub payment_status: Option<String>,
    #[serde(rename = "SFRQ", default, deserialize_with = "loose_string")]
    pub payment_date: Option<String>,
}

/// Envelope around the bill-lookup response: the real payload is a
/// JSON-encoded string in `Data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillEnvelope {
    #[serde(rename = "Success", default, deserialize_with = "loose_flag")]
    pub success: bool,
    #[serde(rename = "Data", default, deserialize_with = "loose_string")]
    pub data: Option<String>,
}

/// Snapshot published after each successful poll; replaces the previous
/// snapshot wholesale.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WaterData {
    pub account: Option<AccountRecord>,
    pub bills: Vec<BillRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_record_tolerates_numeric_fields() {
        let rec: AccountRecord =
            serde_json::from_str(r#"{"yhbh": 1234567, "yhmc": "测试", "xyyc": 56.78}"#).expect("parse record");
        assert_eq!(rec.account_id, Some(AccountId("1234567".into())));
        assert_eq!(rec.balance.as_deref(), Some("56.78"));
        assert_eq!(rec.address, None);
    }

    #[test]
    fn bill_record_ignores_unknown_keys() {
        let rec: BillRecord =
            serde_json::from_str(r#"{"CBNY": "202501", "YSJE": "32.40", "XXXX": [1, 2]}"#).expect("parse record");
        assert_eq!(rec.billing_month.as_deref(), Some("202501"));
        assert_eq!(rec.amount_due.as_deref(), Some("32.40"));
    }

    #[test]
    fn envelope_success_flag_variants() {
        let e: BillEnvelope = serde_json::from_str(r#"{"Success": true, "Data": "[]"}"#).expect("parse");
        assert!(e.success);
        let e: BillEnvelope = serde_json::from_str(r#"{"Success": 1}"#).expect("parse");
        assert!(e.success);
        let e: BillEnvelope = serde_json::from_str(r#"{"Data": "[]"}"#).expect("parse");
        assert!(!e.success);
    }

    #[test]
    fn envelope_data_array_is_stringified() {
        // some deployments return the payload inline instead of stringified
        let e: BillEnvelope = serde_json::from_str(r#"{"Success": true, "Data": [{"CBNY": "202501"}]}"#).expect("parse");
        assert_eq!(e.data.as_deref(), Some(r#"[{"CBNY":"202501"}]"#));
    }
}
