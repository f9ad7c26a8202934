//! Analyze and cleanup commands
//!
//! Nothing is deleted unless `--yes` is given; without it the plan is shown
//! and the command stops.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use sysopt_core::{
    ActionPlan, CoreContext, ExecutionHandle, ExecutionResult, OptimizationEngine, ProgressUpdate,
};
use tabled::Tabled;
use tokio::sync::mpsc;

use crate::output::{
    format_bytes, print_error, print_info, print_json, print_success, print_table,
    print_warning, progress_bar, OutputFormat,
};

/// Row for the per-category plan summary
#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Items")]
    count: usize,
    #[tabled(rename = "Size")]
    size: String,
}

/// Row for individual planned actions
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Action")]
    description: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn print_plan(plan: &ActionPlan, detailed: bool) {
    println!("{}", "Optimization Plan".bold());
    println!("{}", "=".repeat(50));

    let rows: Vec<CategoryRow> = plan
        .categories
        .iter()
        .map(|(category, summary)| CategoryRow {
            category: category.clone(),
            count: summary.count,
            size: format_bytes(summary.total_bytes),
        })
        .collect();
    print_table(&rows, "Nothing to optimize");

    if detailed && !plan.is_empty() {
        let rows: Vec<ActionRow> = plan
            .actions
            .iter()
            .map(|action| ActionRow {
                category: action.category.clone(),
                description: action.description.clone(),
                size: format_bytes(action.size_bytes),
                reason: action.reason.clone(),
            })
            .collect();
        print_table(&rows, "");
    }

    println!(
        "Total: {} files, {}",
        plan.total_files,
        format_bytes(plan.total_bytes).cyan()
    );
}

/// Show what a cleanup would do without changing anything
pub fn analyze(ctx: &CoreContext, detailed: bool, format: OutputFormat) -> Result<()> {
    let plan = OptimizationEngine::new(ctx).analyze();
    match format {
        OutputFormat::Json => print_json(&plan)?,
        OutputFormat::Table => print_plan(&plan, detailed),
    }
    Ok(())
}

/// Analyze, then apply the plan (optionally only some categories) if confirmed
pub async fn clean(
    ctx: &CoreContext,
    categories: Vec<String>,
    yes: bool,
    format: OutputFormat,
) -> Result<()> {
    let engine = OptimizationEngine::new(ctx);
    let plan = engine.analyze();
    let selected = (!categories.is_empty()).then_some(categories);

    if format == OutputFormat::Table {
        print_plan(&plan, false);
    }
    if plan.is_empty() {
        if format == OutputFormat::Json {
            print_json(&ExecutionResult::default())?;
        }
        return Ok(());
    }
    if !yes {
        if format == OutputFormat::Json {
            print_json(&plan)?;
        }
        print_warning("Nothing deleted. Re-run with --yes to apply this plan.");
        return Ok(());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = engine.execute(&plan, selected.as_deref(), Arc::new(tx));
    finish(handle, rx, format).await
}

/// Analyze and apply everything in one step
pub async fn boost(ctx: &CoreContext, yes: bool, format: OutputFormat) -> Result<()> {
    if !yes {
        print_warning(
            "Boost applies every proposed cleanup without showing the plan first. \
             Run `sysopt analyze` to review it, or re-run with --yes.",
        );
        return Ok(());
    }

    let engine = OptimizationEngine::new(ctx);
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = engine.one_click_boost(Arc::new(tx));
    finish(handle, rx, format).await
}

async fn finish(
    handle: ExecutionHandle,
    mut progress: mpsc::UnboundedReceiver<ProgressUpdate>,
    format: OutputFormat,
) -> Result<()> {
    let show_progress = format == OutputFormat::Table;
    let printer = tokio::spawn(async move {
        while let Some(update) = progress.recv().await {
            if show_progress {
                eprint!(
                    "\r{} {:>3}% {:<30}",
                    progress_bar(update.percent, 30),
                    update.percent,
                    update.category
                );
                let _ = std::io::stderr().flush();
            }
            if update.terminal {
                break;
            }
        }
        if show_progress {
            eprintln!();
        }
    });

    let result = handle.wait().await.context("optimization run did not complete")?;
    // The sender is gone once the run finishes, so the printer always ends
    let _ = printer.await;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_result(&result),
    }
    Ok(())
}

fn print_result(result: &ExecutionResult) {
    print_success(&format!(
        "Deleted {} files, freed {:.2} MB",
        result.files_deleted,
        result.space_freed_mb()
    ));
    print_info(&format!("{} actions completed", result.actions_completed.len()));
    if !result.errors.is_empty() {
        print_warning(&format!("{} actions failed:", result.errors.len()));
        for error in &result.errors {
            print_error(error);
        }
    }
}
