//! Display mapping: turn a [`WaterData`] snapshot into the two read-only
//! sensor readings (balance and latest bill) plus the device metadata a host
//! frontend shows alongside them.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::models::water::{BillRecord, WaterData};

pub const MANUFACTURER: &str = "抚州公用水务有限公司";

/// A read-only value published to the host. `state` of `None` renders as
/// "unknown" there; it is never an error.
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub unique_id: String,
    pub name: String,
    pub icon: &'static str,
    pub state: Option<String>,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub manufacturer: &'static str,
    pub name: String,
    pub model: String,
}

/// Title shown for a configured instance once the account id is known.
pub fn instance_title(account_id: &str) -> String {
    format!("抚州公用水务 - {}", account_id)
}

/// Bill record with the lexicographically greatest billing-month tag.
pub fn latest_bill(bills: &[BillRecord]) -> Option<&BillRecord> {
    bills.iter().max_by_key(|b| b.billing_month.as_deref().unwrap_or(""))
}

/// Mask the first character of the account holder's name.
pub fn mask_account_name(name: Option<&str>) -> String {
    match name {
        None | Some("") => "未知用户".to_string(),
        Some(n) => {
            let rest: String = n.chars().skip(1).collect();
            format!("*{}", rest)
        }
    }
}

pub fn device_info(data: &WaterData, entry_key: &str) -> DeviceInfo {
    let account = data.account.as_ref();
    let masked = mask_account_name(account.and_then(|a| a.account_name.as_deref()));
    let account_id = account
        .and_then(|a| a.account_id.as_ref())
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "未知户号".to_string());
    let address = account
        .and_then(|a| a.address.clone())
        .unwrap_or_else(|| "抚州公用水务".to_string());

    DeviceInfo {
        identifier: entry_key.to_string(),
        manufacturer: MANUFACTURER,
        name: format!("户号：{} - {}", masked, account_id),
        model: address,
    }
}

/// Both readings for one snapshot, balance first.
pub fn readings(data: &WaterData, entry_key: &str) -> Vec<SensorReading> {
    vec![balance_reading(data, entry_key), bill_reading(data, entry_key)]
}

pub fn balance_reading(data: &WaterData, entry_key: &str) -> SensorReading {
    let account = data.account.as_ref();
    let suffix = account
        .and_then(|a| a.account_id.as_ref())
        .map(|id| id.0.as_str())
        .unwrap_or(entry_key);

    let attributes = match account {
        Some(a) => json_attributes(json!({
            "account_id": a.account_id,
            "account_name": a.account_name,
            "address": a.address,
            "total_due": a.total_due,
            "total_paid": a.total_paid,
            "current_balance": a.balance,
            "arrears": a.arrears,
            "amount_due": a.amount_due,
        })),
        None => Map::new(),
    };

    SensorReading {
        unique_id: format!("{}-account", suffix),
        name: entity_name(data, "余额"),
        icon: "mdi:water",
        state: account.and_then(|a| a.balance.clone()),
        attributes,
    }
}

pub fn bill_reading(data: &WaterData, entry_key: &str) -> SensorReading {
    let suffix = data
        .account
        .as_ref()
        .and_then(|a| a.account_id.as_ref())
        .map(|id| id.0.as_str())
        .unwrap_or(entry_key);
    let bill = latest_bill(&data.bills);

    let attributes = match bill {
        Some(b) => json_attributes(json!({
            "billing_month": b.billing_month,
            "read_date": b.read_date,
            "start_meter": b.start_meter,
            "end_meter": b.end_meter,
            "usage": b.usage,
            "charge": b.charge,
            "amount_due": b.amount_due,
            "late_fee": b.late_fee,
            "surcharge": b.surcharge,
            "payment_status": b.payment_status,
            "payment_date": b.payment_date,
            "recent_bills": data.bills,
        })),
        None => Map::new(),
    };

    SensorReading {
        unique_id: format!("{}-bill", suffix),
        name: entity_name(data, "账单"),
        icon: "mdi:receipt",
        state: bill.and_then(|b| b.amount_due.clone()),
        attributes,
    }
}

fn entity_name(data: &WaterData, kind: &str) -> String {
    match data.account.as_ref().and_then(|a| a.account_id.as_ref()) {
        Some(id) => format!("抚州自来水{}{}", id, kind),
        None => format!("抚州自来水{}", kind),
    }
}

fn json_attributes(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::water::{AccountId, AccountRecord};

    fn bill(month: &str, due: &str) -> BillRecord {
        BillRecord {
            billing_month: Some(month.to_string()),
            amount_due: Some(due.to_string()),
            ..BillRecord::default()
        }
    }

    fn snapshot() -> WaterData {
        WaterData {
            account: Some(AccountRecord {
                account_id: Some(AccountId("1234567".into())),
                account_name: Some("张三".into()),
                address: Some("抚州市某路1号".into()),
                balance: Some("12.30".into()),
                ..AccountRecord::default()
            }),
            bills: vec![bill("202411", "18.00"), bill("202501", "32.40")],
        }
    }

    #[test]
    fn latest_bill_picks_greatest_month_tag() {
        let data = snapshot();
        let latest = latest_bill(&data.bills).expect("bill present");
        assert_eq!(latest.billing_month.as_deref(), Some("202501"));
    }

    #[test]
    fn bill_reading_state_is_latest_due_amount() {
        let reading = bill_reading(&snapshot(), "entry-1");
        assert_eq!(reading.state.as_deref(), Some("32.40"));
        assert_eq!(reading.unique_id, "1234567-bill");
        assert_eq!(reading.attributes["billing_month"], "202501");
        assert_eq!(
            reading.attributes["recent_bills"].as_array().map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn balance_reading_state_and_attributes() {
        let reading = balance_reading(&snapshot(), "entry-1");
        assert_eq!(reading.state.as_deref(), Some("12.30"));
        assert_eq!(reading.name, "抚州自来水1234567余额");
        assert_eq!(reading.attributes["address"], "抚州市某路1号");
        // absent fields still appear, as nulls
        assert_eq!(reading.attributes["arrears"], Value::Null);
    }

    #[test]
    fn empty_snapshot_is_unknown_not_error() {
        let data = WaterData::default();
        let readings = readings(&data, "entry-1");
        assert_eq!(readings.len(), 2);
        for r in readings {
            assert_eq!(r.state, None);
            assert!(r.attributes.is_empty());
            assert!(r.unique_id.starts_with("entry-1-"));
        }
    }

    #[test]
    fn account_name_masking() {
        assert_eq!(mask_account_name(Some("张三")), "*三");
        assert_eq!(mask_account_name(Some("王")), "*");
        assert_eq!(mask_account_name(Some("")), "未知用户");
        assert_eq!(mask_account_name(None), "未知用户");
    }

    #[test]
    fn device_info_masks_and_falls_back() {
        let info = device_info(&snapshot(), "entry-1");
        assert_eq!(info.name, "户号：*三 - 1234567");
        assert_eq!(info.model, "抚州市某路1号");

        let empty = device_info(&WaterData::default(), "entry-1");
        assert_eq!(empty.name, "户号：未知用户 - 未知户号");
        assert_eq!(empty.model, "抚州公用水务");
    }

    #[test]
    fn instance_title_includes_account_id() {
        assert_eq!(instance_title("1234567"), "抚州公用水务 - 1234567");
    }
}
