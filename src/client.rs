//! Blocking HTTP client for the Fuzhou Public Water web endpoints.
//!
//! - Two undocumented ASP.NET handlers behind the utility's WeChat portal:
//!   account lookup (GET) and bill lookup (POST).
//! - Requests must carry the Referer/Origin/User-Agent of the in-app browser
//!   flow or the server answers with an HTML error page.
//! - Account responses arrive GBK-encoded and are transcoded before parsing.

use encoding_rs::GB18030;
use log::{debug, warn};
use std::time::Duration;

use crate::decode::{self, DecodeError};
use crate::models::water::{AccountId, AccountRecord, BillEnvelope, BillRecord};

pub const BASE_URL: &str = "http://www.fzgysw.cn/weixincx/mnewmenu/ashx";

const PAGE_BASE_URL: &str = "http://www.fzgysw.cn/weixincx/mnewmenu";
const ORIGIN: &str = "http://www.fzgysw.cn";
const ACCOUNT_ENDPOINT: &str = "FrmZXJF.ashx";
const BILL_ENDPOINT: &str = "FrmYscxMX.ashx";

// Fixed search markers the handlers dispatch on.
const ACCOUNT_SEARCH_MARKER: &str = "TGlzdA==";
const BILL_SEARCH_MARKER: &str = "Select";

const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_4_1 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 \
     MicroMessenger/8.0.68(0x18004431) NetType/4G Language/zh_CN";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum WaterClientError {
    Transport(String),
    Http { status: u16 },
    Json(serde_json::Error),
    Decode(DecodeError),
}

impl core::fmt::Display for WaterClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WaterClientError::Transport(s) => write!(f, "transport error: {}", s),
            WaterClientError::Http { status } => write!(f, "http {}", status),
            WaterClientError::Json(e) => write!(f, "json error: {}", e),
            WaterClientError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WaterClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WaterClientError::Json(e) => Some(e),
            WaterClientError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WaterClientError {
    fn from(value: serde_json::Error) -> Self {
        WaterClientError::Json(value)
    }
}

impl From<DecodeError> for WaterClientError {
    fn from(value: DecodeError) -> Self {
        WaterClientError::Decode(value)
    }
}

fn map_ureq_err(err: ureq::Error) -> WaterClientError {
    match err {
        ureq::Error::StatusCode(status) => WaterClientError::Http { status },
        other => WaterClientError::Transport(other.to_string()),
    }
}

pub struct WaterClient {
    agent: ureq::Agent,
    base_url: String,
    apid_raw: String,
    apid_encoded: String,
}

impl WaterClient {
    pub fn new(apid: &str, base_url: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();
        let (apid_raw, apid_encoded) = decode::derive_apid_pair(apid);
        WaterClient {
            agent,
            base_url: base_url.into(),
            apid_raw,
            apid_encoded,
        }
    }

    /// Fetch the account list for the configured token.
    ///
    /// The body is GBK; transcode before handing it to the decoder.
    pub fn fetch_account_info(&self) -> Result<Vec<AccountRecord>, WaterClientError> {
        let url = format!("{}/{}", self.base_url, ACCOUNT_ENDPOINT);
        let referer = format!("{}/FrmZXJF.aspx?userid={}", PAGE_BASE_URL, self.apid_raw);

        let mut resp = self
            .agent
            .get(&url)
            .query("apid", &self.apid_encoded)
            .query("Search", ACCOUNT_SEARCH_MARKER)
            .header("Accept", "*/*")
            .header("Referer", &referer)
            .header("User-Agent", USER_AGENT)
            .header("X-Requested-With", "XMLHttpRequest")
            .call()
            .map_err(map_ureq_err)?;

        let raw = resp.body_mut().read_to_vec().map_err(map_ureq_err)?;
        let (text, _, had_errors) = GB18030.decode(&raw);
        if had_errors {
            debug!("Account response contained invalid GBK sequences");
        }
        Ok(decode::parse_record_array(&text, "account")?)
    }

    /// Fetch bills for one account over a `YYYYMM` month window.
    ///
    /// The response is an envelope whose `Data` field is a JSON-encoded
    /// string. A missing or false success flag is not an error; it just means
    /// no bills.
    pub fn fetch_bills(
        &self,
        account_id: &AccountId,
        start: &str,
        end: &str,
    ) -> Result<Vec<BillRecord>, WaterClientError> {
        let url = format!("{}/{}", self.base_url, BILL_ENDPOINT);
        let referer = format!(
            "{}/FrmYscxMX.aspx?YHBH={}&txtStart={}&txtEnd={}&apid={}",
            PAGE_BASE_URL, account_id, start, end, self.apid_encoded
        );

        let mut resp = self
            .agent
            .post(&url)
            .query("yhbh", &account_id.0)
            .query("txtStart", start)
            .query("txtEnd", end)
            .query("Search", BILL_SEARCH_MARKER)
            .query("apid", &self.apid_raw)
            .header("Accept", "*/*")
            .header("Referer", &referer)
            .header("Origin", ORIGIN)
            .header("User-Agent", USER_AGENT)
            .header("X-Requested-With", "XMLHttpRequest")
            .send_empty()
            .map_err(map_ureq_err)?;

        let text = resp.body_mut().read_to_string().map_err(map_ureq_err)?;
        let envelope: BillEnvelope = serde_json::from_str(&text)?;
        if !envelope.success {
            warn!("Bill lookup for account {} returned no success flag", account_id);
            return Ok(Vec::new());
        }

        let data = envelope.data.unwrap_or_else(|| "[]".to_string());
        Ok(decode::parse_record_array(&data, "bill")?)
    }
}
