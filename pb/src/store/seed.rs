//! Demo data for the analytic store
//!
//! Generates a deterministic portfolio: every app/platform pair reports
//! daily metrics for every country over a fixed window. The same seed
//! always yields the same rows.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use eyre::{Context, Result, eyre};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{Connection, params};
use tracing::{debug, info};

/// Table and index definitions
pub const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS app_metrics (
    app_name TEXT NOT NULL,
    platform TEXT NOT NULL CHECK (platform IN ('iOS', 'Android')),
    date TEXT NOT NULL,
    country TEXT NOT NULL,
    installs INTEGER NOT NULL,
    in_app_revenue REAL NOT NULL,
    ads_revenue REAL NOT NULL,
    ua_cost REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_app_metrics_date ON app_metrics (date);
CREATE INDEX IF NOT EXISTS idx_app_metrics_app ON app_metrics (app_name, platform);";

const INSERT: &str = "INSERT INTO app_metrics \
(app_name, platform, date, country, installs, in_app_revenue, ads_revenue, ua_cost) \
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const APPS: &[(&str, &str)] = &[
    ("Paint Pro", "Android"),
    ("Paint Pro", "iOS"),
    ("Countdown", "Android"),
    ("Countdown", "iOS"),
    ("FitTrack", "Android"),
    ("FitTrack", "iOS"),
    ("NoteMaster", "Android"),
    ("NoteMaster", "iOS"),
    ("BudgetBuddy", "Android"),
    ("BudgetBuddy", "iOS"),
    ("QR Scaner", "iOS"),
    ("TimerX", "Android"),
];

const COUNTRIES: &[&str] = &["US", "GB", "DE", "FR", "CA", "BR", "IN", "AU"];

const RNG_SEED: u64 = 42;

/// One day of metrics for an app on a platform in a country
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub app_name: String,
    pub platform: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub country: String,
    pub installs: i64,
    pub in_app_revenue: f64,
    pub ads_revenue: f64,
    pub ua_cost: f64,
}

impl MetricRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        app_name: &str,
        platform: &str,
        date: &str,
        country: &str,
        installs: i64,
        in_app_revenue: f64,
        ads_revenue: f64,
        ua_cost: f64,
    ) -> Self {
        Self {
            app_name: app_name.to_string(),
            platform: platform.to_string(),
            date: date.to_string(),
            country: country.to_string(),
            installs,
            in_app_revenue,
            ads_revenue,
            ua_cost,
        }
    }
}

/// What a seed run wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub path: PathBuf,
    pub rows: usize,
}

/// Create the table and indexes if missing
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    debug!("create_schema: called");
    conn.execute_batch(SCHEMA)
}

/// Insert rows in a single transaction
pub fn insert_rows(conn: &mut Connection, rows: &[MetricRow]) -> rusqlite::Result<usize> {
    debug!(count = rows.len(), "insert_rows: called");
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(INSERT)?;
        for row in rows {
            stmt.execute(params![
                row.app_name,
                row.platform,
                row.date,
                row.country,
                row.installs,
                row.in_app_revenue,
                row.ads_revenue,
                row.ua_cost,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

/// Weekly cycle plus a mild monthly wave
fn seasonality(day_index: usize) -> f64 {
    use std::f64::consts::PI;
    1.0 + 0.15 * (2.0 * PI * (day_index % 7) as f64 / 7.0).sin() + 0.05 * (2.0 * PI * (day_index % 30) as f64 / 30.0).sin()
}

fn base_installs(app_name: &str, platform: &str) -> i64 {
    let base: i64 = match app_name {
        "Paint Pro" => 220,
        "Countdown" => 180,
        "FitTrack" => 260,
        "NoteMaster" => 200,
        "BudgetBuddy" => 240,
        "QR Scaner" => 190,
        "TimerX" => 210,
        _ => 200,
    };
    if platform == "iOS" { (base as f64 * 0.9) as i64 } else { base }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The deterministic demo portfolio, 2024-12-01 through 2025-08-15
pub fn demo_rows() -> Result<Vec<MetricRow>> {
    let start = NaiveDate::from_ymd_opt(2024, 12, 1).ok_or_else(|| eyre!("invalid start date"))?;
    let end = NaiveDate::from_ymd_opt(2025, 8, 15).ok_or_else(|| eyre!("invalid end date"))?;

    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let mut rows = Vec::new();
    // Runs across every series so each one starts at a different phase
    let mut day_index = 0usize;

    for &(app_name, platform) in APPS {
        let base = base_installs(app_name, platform) as f64;
        for &country in COUNTRIES {
            for day in start.iter_days().take_while(|d| *d <= end) {
                let installs = (base * seasonality(day_index) * rng.random_range(0.8..1.3)).max(0.0) as i64;
                let volume = installs as f64;
                rows.push(MetricRow {
                    app_name: app_name.to_string(),
                    platform: platform.to_string(),
                    date: day.format("%Y-%m-%d").to_string(),
                    country: country.to_string(),
                    installs,
                    in_app_revenue: round2(volume * rng.random_range(0.05..0.18)),
                    ads_revenue: round2(volume * rng.random_range(0.02..0.12)),
                    ua_cost: round2(volume * rng.random_range(0.02..0.16)),
                });
                day_index += 1;
            }
        }
    }

    Ok(rows)
}

/// Create (or reset) the store at `path` and fill it with the demo portfolio
pub fn seed_database(path: &Path) -> Result<SeedSummary> {
    debug!(?path, "seed_database: called");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context(format!("Failed to create directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path).context(format!("Failed to open store {}", path.display()))?;
    create_schema(&conn).context("Failed to create schema")?;
    conn.execute("DELETE FROM app_metrics", [])
        .context("Failed to clear app_metrics")?;

    let rows = demo_rows()?;
    let written = insert_rows(&mut conn, &rows).context("Failed to insert demo rows")?;
    info!(rows = written, path = %path.display(), "store seeded");

    Ok(SeedSummary {
        path: path.to_path_buf(),
        rows: written,
    })
}
