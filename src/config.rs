//! Minimal runtime configuration helpers.
//! Everything comes from the environment; only the APID token is required.

use std::time::Duration;
use std::{fs, path::Path};

use crate::client::BASE_URL;
use crate::models::water::AccountId;

/// Matches the upstream portal's refresh cadence.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Opaque identifier issued by the utility's web portal, raw or base64.
    pub apid: String,
    /// Optional preferred account number when the token covers several.
    pub account_id: Option<AccountId>,
    /// Polling cadence.
    pub poll_interval: Duration,
    /// Endpoint base, overridable for testing against a local stub.
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Prefer env var; fallback to apid.txt in working directory
        let apid = match std::env::var("FZGYSW_APID") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                let path = Path::new("apid.txt");
                match fs::read_to_string(path) {
                    Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => {
                        return Err(
                            "Missing APID: set FZGYSW_APID or provide apid.txt in working directory".to_string(),
                        );
                    }
                }
            }
        };

        let account_id = match std::env::var("FZGYSW_ACCOUNT_ID") {
            Ok(s) if !s.trim().is_empty() => Some(AccountId(s.trim().to_string())),
            _ => None,
        };

        let poll_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let base_url = std::env::var("FZGYSW_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| BASE_URL.to_string());

        Ok(Config {
            apid,
            account_id,
            poll_interval: Duration::from_secs(poll_secs),
            base_url,
        })
    }
}
