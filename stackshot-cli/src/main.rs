/*!
Stackshot CLI - interactive backup and restore of a local emulator's state.

Asks whether to back up or restore, runs S3, SQS and SNS in turn, and prints
a per-service summary.
*/

use clap::Parser;
use stackshot_core::{
    config::{DEFAULT_ENDPOINT_URL, DEFAULT_REGION},
    AwsConnector, EmulatorConfig, LocalFileStorage, Orchestrator, RunReport, SnapshotStore,
    StepOutcome,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::{Table, Tabled};
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "stackshot")]
#[command(about = "Back up or restore the S3, SQS and SNS state of a local emulator")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emulator endpoint shared by every service
    #[arg(long, env = "STACKSHOT_ENDPOINT_URL", default_value = DEFAULT_ENDPOINT_URL)]
    endpoint_url: String,

    /// Region used for every service
    #[arg(long, env = "STACKSHOT_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Directory holding the snapshot files
    #[arg(long, env = "STACKSHOT_DIR", default_value = ".")]
    dir: PathBuf,
}

/// What the user asked for at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Backup,
    Restore,
}

impl Choice {
    /// Case-insensitive `b` or `r`; surrounding whitespace is ignored
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "b" => Some(Choice::Backup),
            "r" => Some(Choice::Restore),
            _ => None,
        }
    }
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Containers")]
    containers: String,
    #[tabled(rename = "Items")]
    items: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = EmulatorConfig::default()
        .with_endpoint_url(cli.endpoint_url)
        .with_region(cli.region)
        .with_snapshot_dir(cli.dir);
    config.validate()?;
    debug!(?config, "Resolved emulator configuration");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let choice = prompt(&mut stdin.lock(), &mut stdout)?;

    let mut code = ExitCode::SUCCESS;
    match choice {
        None => println!("\n***Invalid choice - exiting***"),
        Some(choice) => {
            let report = run(choice, config).await?;
            print_summary(&report);
            if !report.all_completed() {
                code = ExitCode::FAILURE;
            }
        }
    }

    println!("\nThanks for using the LocalStack backup tool!\n");
    Ok(code)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Show the menu and read one choice
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<Choice>> {
    write!(output, "\n\n\n\n")?;
    writeln!(output, "What would you like to do?")?;
    writeln!(output, "    [b]ackup LocalStack state")?;
    writeln!(output, "    [r]estore LocalStack state\n")?;
    write!(output, "Please enter your choice 'b' or 'r': ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(Choice::parse(&line))
}

async fn run(choice: Choice, config: EmulatorConfig) -> Result<RunReport, anyhow::Error> {
    let store = SnapshotStore::new(LocalFileStorage::with_base_dir(&config.snapshot_dir));
    let connector = AwsConnector::new(config).await?;
    let orchestrator = Orchestrator::new(connector, store);

    let report = match choice {
        Choice::Backup => orchestrator.backup().await,
        Choice::Restore => orchestrator.restore().await,
    };

    if !report.all_completed() {
        error!(kind = %report.kind, "Run finished with incomplete steps");
    }
    Ok(report)
}

fn summary_rows(report: &RunReport) -> Vec<StepRow> {
    report
        .steps
        .iter()
        .map(|step| {
            let (containers, items, detail) = match &step.outcome {
                StepOutcome::Completed { containers, items } => {
                    (containers.to_string(), items.to_string(), String::new())
                }
                StepOutcome::Skipped { reason } => ("-".into(), "-".into(), reason.clone()),
                StepOutcome::Failed { error } => ("-".into(), "-".into(), error.clone()),
            };
            StepRow {
                service: step.service.to_string(),
                status: step.outcome.label().to_string(),
                containers,
                items,
                detail,
            }
        })
        .collect()
}

fn print_summary(report: &RunReport) {
    println!(
        "\n{} finished at {}",
        report.kind,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", Table::new(summary_rows(report)));
}
