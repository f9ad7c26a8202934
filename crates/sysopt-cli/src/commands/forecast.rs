//! Disk forecast commands

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use sysopt_core::{CoreContext, DiskForecaster, Forecast, Prediction};
use tabled::Tabled;

use crate::output::{color_tier, print_json, print_table, print_warning, OutputFormat};

/// Row for growing directories
#[derive(Tabled)]
struct DirectoryRow {
    #[tabled(rename = "Directory")]
    path: String,
    #[tabled(rename = "Size (GB)")]
    size_gb: f64,
    #[tabled(rename = "Safe to clean")]
    safe: String,
}

/// Row for the usage trend
#[derive(Tabled, Serialize)]
struct TrendRow {
    #[tabled(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
    #[tabled(rename = "Used (GB)")]
    used_gb: f64,
}

/// Record a snapshot and predict when `volume` fills up
pub fn show_forecast(ctx: &CoreContext, volume: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let volume = volume.unwrap_or_else(|| ctx.config.primary_volume());
    let forecast = DiskForecaster::new(ctx).predict_exhaustion(&volume);

    match (format, &forecast) {
        (OutputFormat::Json, _) => print_json(&forecast)?,
        (OutputFormat::Table, Forecast::InsufficientData { reason, days_of_data }) => {
            print_warning(&format!("{} ({} snapshot(s) recorded)", reason, days_of_data));
        }
        (OutputFormat::Table, Forecast::Ready(prediction)) => print_prediction(&volume, prediction),
    }
    Ok(())
}

fn print_prediction(volume: &std::path::Path, p: &Prediction) {
    println!("{} {}", "Disk Forecast".bold(), volume.display().to_string().cyan());
    println!("{}", "=".repeat(50));
    println!("Growth rate:            {:.3} GB/day", p.growth_rate_gb_per_day);
    println!("Free space:             {:.2} GB", p.current_free_gb);
    println!("Used:                   {:.1}%", p.current_used_percent);
    match p.days_until_full {
        Some(days) => println!("Days until full:        {:.1}", days),
        None => println!("Days until full:        {}", "never at current rate".green()),
    }
    println!("Status:                 {}", color_tier(p.warning_tier));
    println!();
    println!("{}", p.recommendation);

    if p.disk_growing {
        println!();
        let rows: Vec<DirectoryRow> = p
            .growing_directories
            .iter()
            .map(|dir| DirectoryRow {
                path: dir.path.display().to_string(),
                size_gb: dir.size_gb,
                safe: if dir.safe_to_clean { "yes" } else { "no" }.to_string(),
            })
            .collect();
        print_table(&rows, "No large directories found");
    }
}

/// Print the recorded (timestamp, used GB) series
pub fn show_trend(ctx: &CoreContext, format: OutputFormat) -> Result<()> {
    let rows: Vec<TrendRow> = DiskForecaster::new(ctx)
        .historical_trend()
        .into_iter()
        .map(|(timestamp, used_gb)| TrendRow { timestamp, used_gb })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => print_table(&rows, "No disk history recorded yet"),
    }
    Ok(())
}
