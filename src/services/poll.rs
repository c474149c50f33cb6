//! The poll cycle: one sequential account+bill fetch per tick, plus the
//! steady-cadence loop the host seam drives.
//!
//! The two fetches are strictly ordered — the bill lookup needs the account
//! id resolved from the account lookup. A failed cycle is retryable: the
//! loop logs it and keeps the previous snapshot, the host convention for
//! transient update failures.

use chrono::Local;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::thread;
use std::time::{Duration, Instant};

use crate::client::{WaterClient, WaterClientError};
use crate::decode;
use crate::models::water::{AccountId, AccountRecord, WaterData};

#[derive(Debug)]
pub enum PollError {
    /// Underlying API client error; either fetch failing fails the cycle.
    Api(WaterClientError),
    /// The account lookup succeeded but returned no records.
    NoAccountData,
}

impl Display for PollError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Api(e) => write!(f, "api error: {}", e),
            PollError::NoAccountData => write!(f, "no account data returned"),
        }
    }
}

impl Error for PollError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PollError::Api(e) => Some(e),
            PollError::NoAccountData => None,
        }
    }
}

impl From<WaterClientError> for PollError {
    fn from(value: WaterClientError) -> Self {
        PollError::Api(value)
    }
}

/// Consumer of successful poll snapshots. The host (or whatever stands in
/// for it) implements this; the poll routine never depends on a runtime.
pub trait SnapshotSink {
    fn publish(&mut self, data: &WaterData);
}

/// Select the active account from the returned list.
///
/// A configured preferred id wins when present; otherwise the first record
/// is used and its id adopted as the effective id for the bill fetch.
/// Returns `None` only for an empty list.
fn resolve_account(
    mut accounts: Vec<AccountRecord>,
    preferred: Option<&AccountId>,
) -> Option<(AccountRecord, Option<AccountId>)> {
    if accounts.is_empty() {
        return None;
    }

    let matched = preferred.and_then(|wanted| {
        accounts
            .iter()
            .position(|a| a.account_id.as_ref() == Some(wanted))
    });
    if let Some(wanted) = preferred
        && matched.is_none()
    {
        warn!(
            "Configured account id {} not in server response; falling back to first record",
            wanted
        );
    }

    let account = accounts.swap_remove(matched.unwrap_or(0));
    let effective = account.account_id.clone();
    Some((account, effective))
}

/// Run one complete poll cycle.
pub fn poll_once(client: &WaterClient, preferred: Option<&AccountId>) -> Result<WaterData, PollError> {
    let accounts = client.fetch_account_info()?;
    let (account, account_id) = resolve_account(accounts, preferred).ok_or(PollError::NoAccountData)?;

    let mut bills = Vec::new();
    if let Some(id) = &account_id {
        let (start, end) = decode::month_range(Local::now().date_naive());
        debug!("Fetching bills for account {} over {}..{}", id, start, end);
        bills = client.fetch_bills(id, &start, &end)?;
    }

    info!(
        "Poll complete: account {}, {} bill(s)",
        account_id.as_ref().map(|id| id.0.as_str()).unwrap_or("-"),
        bills.len()
    );
    Ok(WaterData {
        account: Some(account),
        bills,
    })
}

/// Poll at a steady cadence forever, publishing each successful snapshot.
/// One poll in flight at a time; a failed cycle leaves the previous
/// snapshot in place.
pub fn run_loop(
    client: &WaterClient,
    preferred: Option<&AccountId>,
    interval: Duration,
    sink: &mut dyn SnapshotSink,
) {
    loop {
        let tick_start = Instant::now();

        match poll_once(client, preferred) {
            Ok(data) => sink.publish(&data),
            Err(e) => warn!("Poll failed, keeping previous snapshot: {}", e),
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::water::{BillEnvelope, BillRecord};

    fn account(id: &str) -> AccountRecord {
        AccountRecord {
            account_id: Some(AccountId(id.to_string())),
            ..AccountRecord::default()
        }
    }

    #[test]
    fn resolve_prefers_configured_id() {
        let accounts = vec![account("001"), account("002")];
        let wanted = AccountId("002".into());
        let (record, effective) = resolve_account(accounts, Some(&wanted)).expect("non-empty");
        assert_eq!(record.account_id, Some(wanted.clone()));
        assert_eq!(effective, Some(wanted));
    }

    #[test]
    fn resolve_falls_back_to_first_and_adopts_its_id() {
        let accounts = vec![account("001"), account("002")];
        let stale = AccountId("999".into());
        let (record, effective) = resolve_account(accounts, Some(&stale)).expect("non-empty");
        assert_eq!(record.account_id, Some(AccountId("001".into())));
        assert_eq!(effective, Some(AccountId("001".into())));
    }

    #[test]
    fn resolve_without_preference_adopts_first_id() {
        let accounts = vec![account("007")];
        let (_, effective) = resolve_account(accounts, None).expect("non-empty");
        assert_eq!(effective, Some(AccountId("007".into())));
    }

    #[test]
    fn resolve_empty_list_is_none() {
        assert!(resolve_account(Vec::new(), None).is_none());
    }

    #[test]
    fn resolve_tolerates_record_without_id() {
        let accounts = vec![AccountRecord::default()];
        let (record, effective) = resolve_account(accounts, None).expect("non-empty");
        assert_eq!(record.account_id, None);
        assert_eq!(effective, None);
    }

    #[test]
    fn bill_envelope_fixture_decodes() {
        let json = std::fs::read_to_string("tests/data/bill-envelope.json").expect("fixture present");
        let envelope: BillEnvelope = serde_json::from_str(&json).expect("parse envelope");
        assert!(envelope.success);
        let bills: Vec<BillRecord> =
            decode::parse_record_array(&envelope.data.expect("data present"), "bill").expect("decode data");
        assert_eq!(bills.len(), 2);
        assert_eq!(bills[1].billing_month.as_deref(), Some("202501"));
        assert_eq!(bills[1].payment_status.as_deref(), Some("已缴费"));
    }
}
