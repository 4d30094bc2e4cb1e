//! commerce-demo — runs the protocol's seven end-to-end scenarios
//! (ch.8) against an in-process settlement ledger and an injectable
//! clock. Nothing here talks to a network or a real clock; it exists to
//! give every other crate in the workspace a runnable demonstration.

mod scenarios;

use clap::Parser;
use scenarios::{Scenario, ScenarioReport};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "commerce-demo",
    version,
    about = "Runs the programmable-commerce-protocol reference scenarios end to end"
)]
struct Args {
    /// Run a single named scenario instead of the full set.
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,

    /// Print each scenario's report as pretty-printed JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let selected: Vec<Scenario> = match args.scenario {
        Some(s) => vec![s],
        None => Scenario::all().to_vec(),
    };

    let mut reports = Vec::with_capacity(selected.len());
    for scenario in selected {
        info!(scenario = scenario.name(), "running scenario");
        let report = scenarios::run(scenario).await;
        print_report(&report, args.json);
        reports.push(report);
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.replay_ok == Some(false))
        .map(|r| r.name.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("scenarios with a failed transcript replay: {:?}", failed);
    }

    Ok(())
}

fn print_report(report: &ScenarioReport, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_else(|e| e.to_string()));
        return;
    }
    println!(
        "{:<30} status={:<12} outcome={:<24} buyer={:<10} seller={:<10} replay_ok={:<6} receipt_fulfilled={}",
        report.name,
        report.final_status,
        report.final_outcome.clone().unwrap_or_else(|| "-".to_string()),
        report.buyer_balance.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
        report.seller_balance.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
        report.replay_ok.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
        report.receipt.as_ref().map(|r| r.fulfilled.to_string()).unwrap_or_else(|| "-".to_string()),
    );
    for note in &report.notes {
        println!("  note: {note}");
    }
}
