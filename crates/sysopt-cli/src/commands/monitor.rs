//! Live telemetry commands

use anyhow::{bail, Result};
use colored::Colorize;
use std::time::{Duration, Instant};
use sysopt_core::{CoreContext, Metric, TelemetryCollector};
use tabled::Tabled;

use crate::output::{color_percent, format_bytes, print_json, print_table, OutputFormat};

const POLL_EVERY: Duration = Duration::from_millis(50);

/// Row for the rolling history table
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Disk")]
    disk: String,
    #[tabled(rename = "Net Sent")]
    sent: String,
    #[tabled(rename = "Net Received")]
    received: String,
}

/// Run the collector until `count` metrics were polled, then stop it
async fn collect(ctx: &CoreContext, count: usize) -> Result<(TelemetryCollector, Vec<Metric>)> {
    let collector = TelemetryCollector::new(ctx);
    let interval = collector.config().interval;
    let deadline = Instant::now() + interval * count as u32 + Duration::from_secs(5);

    collector.start();
    let mut metrics = Vec::with_capacity(count);
    while metrics.len() < count && Instant::now() < deadline {
        match collector.poll() {
            Some(metric) => metrics.push(metric),
            None => tokio::time::sleep(POLL_EVERY).await,
        }
    }
    collector.stop().await;

    if metrics.is_empty() {
        bail!(
            "no sample collected ({} sampling errors)",
            collector.sample_errors()
        );
    }
    Ok((collector, metrics))
}

/// Show static host facts and one fresh sample
pub async fn show_status(ctx: &CoreContext, format: OutputFormat) -> Result<()> {
    let (collector, mut metrics) = collect(ctx, 1).await?;
    let info = collector.cached_info();
    let Some(metric) = metrics.pop() else {
        bail!("no sample collected");
    };

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "info": info,
            "metric": metric,
        }))?,
        OutputFormat::Table => {
            println!("{}", "Host Status".bold());
            println!("{}", "=".repeat(50));
            let physical = info
                .physical_cores
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("Cores:                  {} logical / {} physical", info.logical_cores, physical);
            println!("Total memory:           {:.2} GB", info.total_memory_gb());
            println!("Boot time:              {}", info.boot_time.format("%Y-%m-%d %H:%M:%S UTC"));
            println!();

            println!("{}", "Current Usage".bold());
            println!("{}", "-".repeat(50));
            println!("CPU:                    {}", color_percent(metric.cpu_percent));
            println!(
                "Memory:                 {} ({} used, {} available)",
                color_percent(metric.memory_percent),
                format_bytes(metric.memory_used_bytes),
                format_bytes(metric.memory_available_bytes)
            );
            for volume in &metric.volumes {
                println!(
                    "Disk {:<18} {} ({} free of {})",
                    volume.mount_point.display(),
                    color_percent(volume.percent_used),
                    format_bytes(volume.free_bytes),
                    format_bytes(volume.total_bytes)
                );
            }
            println!(
                "Network:                {} sent, {} received",
                format_bytes(metric.net_sent_bytes),
                format_bytes(metric.net_recv_bytes)
            );
            println!("Processes:              {}", metric.process_count);
        }
    }

    Ok(())
}

/// Sample `samples` times and show the rolling history windows
pub async fn show_history(ctx: &CoreContext, samples: usize, format: OutputFormat) -> Result<()> {
    let (collector, _) = collect(ctx, samples.max(1)).await?;
    let history = collector.history();

    match format {
        OutputFormat::Json => print_json(&history)?,
        OutputFormat::Table => {
            let rows: Vec<HistoryRow> = history
                .cpu
                .iter()
                .zip(&history.memory)
                .zip(&history.disk)
                .zip(&history.network)
                .enumerate()
                .map(|(index, (((cpu, memory), disk), net))| HistoryRow {
                    index: index + 1,
                    cpu: format!("{:.1}%", cpu),
                    memory: format!("{:.1}%", memory),
                    disk: format!("{:.1}%", disk),
                    sent: format_bytes(net.sent_bytes),
                    received: format_bytes(net.recv_bytes),
                })
                .collect();
            print_table(&rows, "No samples recorded");
        }
    }

    Ok(())
}
