pub mod models {
    pub mod water;
}

pub mod client;
pub mod config;
pub mod decode;
pub mod sensor;
pub mod services {
    pub mod poll;
}

use crate::client::WaterClient;
use crate::config::Config;
use crate::models::water::WaterData;
use crate::services::poll::{self, SnapshotSink};
use log::{debug, error, info};

/// Publishes each snapshot as the two sensor readings, rendered to the log.
/// Stands in for a host frontend's entity registry.
struct LogSink {
    entry_key: String,
}

impl SnapshotSink for LogSink {
    fn publish(&mut self, data: &WaterData) {
        let device = sensor::device_info(data, &self.entry_key);
        info!("Device: {} ({})", device.name, device.model);
        for reading in sensor::readings(data, &self.entry_key) {
            info!(
                "{} [{}]: {}",
                reading.name,
                reading.unique_id,
                reading.state.as_deref().unwrap_or("unknown")
            );
            debug!(
                "{} attributes: {}",
                reading.unique_id,
                serde_json::Value::Object(reading.attributes)
            );
        }
    }
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (poll_interval={}s, preferred_account={})",
        cfg.poll_interval.as_secs(),
        cfg.account_id.as_ref().map(|id| id.0.as_str()).unwrap_or("-")
    );

    // 2) Init client
    let client = WaterClient::new(&cfg.apid, cfg.base_url.clone());

    // 3) First refresh; failing here is a setup failure, not a retryable tick
    let data = poll::poll_once(&client, cfg.account_id.as_ref())
        .map_err(|e| format!("initial refresh failed: {}", e))?;
    if let Some(id) = data.account.as_ref().and_then(|a| a.account_id.as_ref()) {
        info!("Instance title: {}", sensor::instance_title(&id.0));
    }

    let mut sink = LogSink {
        entry_key: cfg.apid.clone(),
    };
    sink.publish(&data);

    // 4) Poll loop (steady cadence, previous snapshot kept on failure)
    info!("Starting poll loop: interval={}s", cfg.poll_interval.as_secs());
    poll::run_loop(&client, cfg.account_id.as_ref(), cfg.poll_interval, &mut sink);

    Ok(())
}

fn main() {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    info!(
        "fzgysw-water {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
