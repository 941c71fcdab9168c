//! ledger-cli: headless runner for the accumulated damages ledger.
//!
//! Usage:
//!   ledger-cli upsert --year 2025 --month 9 --actual 0 --budget 3000000 [--actor ops]
//!   ledger-cli series --year 2025
//!   ledger-cli load-prior-year --year 2025
//!   ledger-cli verify [--strict]
//!   ledger-cli --ipc-mode
//!
//! Common flags: --db ledger.db (default :memory:), --data-dir ./data

use anyhow::{anyhow, Result};
use ledger_core::{
    config::LedgerConfig,
    engine::{AccumulatedSeriesResponse, LedgerEngine},
    store::{LedgerStore, UpsertRequest},
    types::Year,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    UpsertMonthlyRecord {
        #[serde(flatten)]
        request: UpsertRequest,
        #[serde(default)]
        actor: Option<String>,
    },
    GetAccumulatedSeries {
        year: Year,
    },
    LoadPriorYearBase {
        year: Year,
        #[serde(default)]
        actor: Option<String>,
    },
    VerifyMigration,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let actor = string_arg(&args, "--actor");

    let config = LedgerConfig::load_or_default(data_dir)?;
    let store = LedgerStore::open(db)?;
    store.migrate()?;
    let engine = LedgerEngine::build(store, config);

    if ipc_mode {
        return run_ipc_loop(&engine);
    }

    let command = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing command: upsert | series | load-prior-year | verify"))?;

    match command {
        "upsert" => {
            let req = UpsertRequest::new(
                required_arg(&args, "--year")?,
                required_arg(&args, "--month")?,
                required_arg(&args, "--actual")?,
                required_arg(&args, "--budget")?,
            );
            let resp = engine.upsert_monthly_record_as(&req, actor)?;
            println!(
                "{} {}-{:02}: actual={} budget={}",
                if resp.created { "created" } else { "updated" },
                resp.record.year,
                resp.record.month,
                resp.record.actual_value,
                resp.record.budget_value
            );
        }
        "series" => {
            let year = required_arg(&args, "--year")?;
            let series = engine.get_accumulated_series(year)?;
            if args.iter().any(|a| a == "--json") {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                print_series(&series);
            }
        }
        "load-prior-year" => {
            let year = required_arg(&args, "--year")?;
            let resp = engine.load_prior_year_base_as(year, actor)?;
            println!("prior-year base {} <- {}: {:?}", resp.year, resp.source_year, resp.values);
        }
        "verify" => {
            let report = engine.verify_migration()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if args.iter().any(|a| a == "--strict") {
                report.ensure_consistent()?;
            }
        }
        other => return Err(anyhow!("unknown command: {other}")),
    }

    Ok(())
}

fn run_ipc_loop(engine: &LedgerEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::UpsertMonthlyRecord { request, actor } => engine
                .upsert_monthly_record_as(&request, actor.as_deref())
                .map(serde_json::to_value),
            IpcCommand::GetAccumulatedSeries { year } => engine
                .get_accumulated_series(year)
                .map(serde_json::to_value),
            IpcCommand::LoadPriorYearBase { year, actor } => engine
                .load_prior_year_base_as(year, actor.as_deref())
                .map(serde_json::to_value),
            IpcCommand::VerifyMigration => engine
                .verify_migration()
                .map(serde_json::to_value),
        };

        // Ledger errors go back to the client; only I/O failures end the loop.
        let line = match response {
            Ok(value) => value?,
            Err(e) => {
                log::warn!("ipc command failed: {e}");
                serde_json::json!({ "error": e.to_string(), "validation": e.is_validation() })
            }
        };
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_series(series: &AccumulatedSeriesResponse) {
    let h = &series.horizon;
    println!("=== DAMAGES {} ===", series.year);
    println!(
        "  horizon: month {} (calendar month {}, current year: {})",
        h.horizon_month, h.current_calendar_month, h.is_current_year
    );
    println!();
    println!("  mon      actual   cum actual   cum budget  cum prior yr  region");
    for m in &series.months {
        println!(
            "  {:>3} {:>11} {:>12} {:>12} {:>13}  {:?}",
            m.month,
            m.actual_value,
            m.cumulative_actual,
            m.cumulative_budget,
            m.cumulative_prior_year,
            m.region
        );
    }

    let k = &series.kpis;
    println!();
    println!("=== KPIs ===");
    println!("  actual to date:   {}", k.total_actual_to_date);
    println!("  budget to date:   {}", k.total_budget_to_date);
    println!("  prior yr to date: {}", k.total_prior_year_to_date);
    println!("  compliance:       {:.2}%", k.compliance_to_budget_percent);
    match k.year_over_year_variance_percent {
        Some(v) => println!("  YoY variance:     {v:+.2}%"),
        None => println!("  YoY variance:     n/a"),
    }
    println!("  generated:        {}", chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"));
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn required_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<T> {
    let raw = string_arg(args, flag).ok_or_else(|| anyhow!("missing {flag}"))?;
    raw.parse()
        .map_err(|_| anyhow!("invalid value for {flag}: {raw}"))
}
