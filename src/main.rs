//! sheetstage - rehearse assistant-generated spreadsheet plans.
//!
//! Loads a CSV sheet into the in-memory host document, captures the input
//! selection's formatting profile, stages a plan JSON as a reversible draft,
//! and then accepts it (rendering the canonical output block), rejects it
//! (proving exact restore), or applies it directly without a preview.

mod config;

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use sheetstage_core::preview::{PreviewManager, capture_range_formatting};
use sheetstage_core::storage::{csv_string, load_csv, write_csv};
use sheetstage_core::PlanResult;
use sheetstage_model::RangeRef;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: sheetstage [OPTIONS] <SHEET.csv>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <SHEET.csv>               Sheet to load into the in-memory document");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --plan <FILE>         Plan JSON produced by the plan service (required)");
    eprintln!("  -s, --selection <RANGE>   Input range the plan was generated from");
    eprintln!("                            (default: the sheet's used range)");
    eprintln!("  --reject                  Stage the draft, then roll it back");
    eprintln!("  --direct                  Skip the draft preview; render the output directly");
    eprintln!("  -o, --output <FILE>       Write the resulting sheet as CSV (default: stdout)");
    eprintln!("  --config <FILE>           Load settings from a TOML file");
    eprintln!("  --no-config               Ignore the user config file");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default, PartialEq)]
enum Decision {
    #[default]
    Accept,
    Reject,
    Direct,
}

#[derive(Debug, Default)]
struct Args {
    sheet: Option<PathBuf>,
    plan: Option<PathBuf>,
    selection: Option<String>,
    decision: Decision,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    no_config: bool,
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args::default();
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => return Err(String::new()),
            "-p" | "--plan" => {
                i += 1;
                let value = argv.get(i).ok_or("--plan requires a file path")?;
                args.plan = Some(PathBuf::from(value));
            }
            "-s" | "--selection" => {
                i += 1;
                let value = argv.get(i).ok_or("--selection requires a range address")?;
                args.selection = Some(value.to_string());
            }
            "--reject" => args.decision = Decision::Reject,
            "--direct" => args.decision = Decision::Direct,
            "-o" | "--output" => {
                i += 1;
                let value = argv.get(i).ok_or("--output requires a file path")?;
                args.output = Some(PathBuf::from(value));
            }
            "--config" => {
                i += 1;
                let value = argv.get(i).ok_or("--config requires a file path")?;
                args.config = Some(PathBuf::from(value));
            }
            "--no-config" => args.no_config = true,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if args.sheet.is_none() {
                    args.sheet = Some(PathBuf::from(&argv[i]));
                } else {
                    return Err(format!("Unexpected argument: {}", argv[i]));
                }
            }
        }
        i += 1;
    }
    Ok(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let (config, warnings) = config::load_config(args.config.as_ref(), args.no_config);
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }

    let sheet_path = args.sheet.context("no sheet file given")?;
    let plan_path = args.plan.context("no plan file given (use --plan)")?;

    let mut sheet = load_csv(&sheet_path)
        .with_context(|| format!("failed to load sheet {}", sheet_path.display()))?;

    let selection = match &args.selection {
        Some(addr) => RangeRef::parse(addr)?,
        None => sheet
            .used_range()
            .context("sheet is empty; pass --selection to anchor the output")?,
    };

    let plan_text = std::fs::read_to_string(&plan_path)
        .with_context(|| format!("failed to read plan {}", plan_path.display()))?;
    let plan: PlanResult = serde_json::from_str(&plan_text)
        .with_context(|| format!("failed to parse plan {}", plan_path.display()))?;

    let formatting = capture_range_formatting(&mut sheet, &selection)?;
    let mut manager = PreviewManager::with_policy(config.policy);

    match args.decision {
        Decision::Direct => {
            manager.apply_direct(&mut sheet, &plan, &formatting, &config.render)?;
            eprintln!("Applied plan directly against selection {}", selection);
        }
        Decision::Accept | Decision::Reject => {
            let ops = plan.sanitized_ops();
            manager.stage(&mut sheet, ops)?;
            let touched = manager.touched_ranges();
            eprintln!(
                "Staged {} op(s) across {} range(s): {}",
                ops.len(),
                touched.len(),
                touched.join(", ")
            );

            if args.decision == Decision::Reject {
                manager.reject(&mut sheet)?;
                eprintln!("Rejected preview; sheet restored");
            } else {
                manager.accept(&mut sheet, &plan, &formatting, &config.render)?;
                eprintln!("Accepted preview; rendered output next to {}", selection);
            }
        }
    }

    match &args.output {
        Some(path) => {
            write_csv(path, &sheet, None)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Exported to {}", path.display());
        }
        None => print!("{}", csv_string(&sheet, None)),
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}", message);
            }
            print_usage();
            std::process::exit(if message.is_empty() { 0 } else { 1 });
        }
    };

    if let Err(err) = run(args) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
