//! Tick-based scheduler: no external cron crate, just a once-a-minute check
//! against the two UTC schedules from §6 (scan: Mon/Wed/Fri 14:00, weekly:
//! Sun 14:00). Each schedule fires at most once per matching minute.

use chrono::{Datelike, Timelike, Utc};
use healthwatch_core::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const TICK_SECS: u64 = 60;
const SCAN_HOUR: u32 = 14;
const SCAN_MINUTE: u32 = 0;
const SCAN_WEEKDAYS: [chrono::Weekday; 3] = [chrono::Weekday::Mon, chrono::Weekday::Wed, chrono::Weekday::Fri];
const WEEKLY_HOUR: u32 = 14;
const WEEKLY_MINUTE: u32 = 0;
const WEEKLY_WEEKDAY: chrono::Weekday = chrono::Weekday::Sun;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[healthwatch-daemon] .env not loaded: {e} (using system environment)");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::load().expect("load healthwatch config"));
    let scan = Arc::new(healthwatch_orchestrator::build_scan_orchestrator(&config));
    let weekly = Arc::new(healthwatch_orchestrator::build_weekly_orchestrator(&config));

    tracing::info!("healthwatch daemon started, ticking every {TICK_SECS}s");

    let mut interval = tokio::time::interval(Duration::from_secs(TICK_SECS));
    let mut last_scan_minute: Option<i64> = None;
    let mut last_weekly_minute: Option<i64> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                let minute_epoch = now.timestamp() / 60;

                if SCAN_WEEKDAYS.contains(&now.weekday()) && now.hour() == SCAN_HOUR && now.minute() == SCAN_MINUTE
                    && last_scan_minute != Some(minute_epoch)
                {
                    last_scan_minute = Some(minute_epoch);
                    let scan = Arc::clone(&scan);
                    tokio::spawn(async move {
                        match scan.run().await {
                            Ok(report) => tracing::info!(?report, "scheduled scan complete"),
                            Err(e) => tracing::error!(error = %e, "scheduled scan failed"),
                        }
                    });
                }

                if now.weekday() == WEEKLY_WEEKDAY && now.hour() == WEEKLY_HOUR && now.minute() == WEEKLY_MINUTE
                    && last_weekly_minute != Some(minute_epoch)
                {
                    last_weekly_minute = Some(minute_epoch);
                    let weekly = Arc::clone(&weekly);
                    tokio::spawn(async move {
                        match weekly.run().await {
                            Ok(report) => tracing::info!(?report, "scheduled weekly run complete"),
                            Err(e) => tracing::error!(error = %e, "scheduled weekly run failed"),
                        }
                    });
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down daemon");
                break;
            }
        }
    }
}
