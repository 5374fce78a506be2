//! Terminal upload client
//!
//! Usage:
//!   analyzer-client [FILE] [--endpoint <URL>] [--ics <PATH>] [--pdf <PATH>] [--log-level <LEVEL>]
//!
//! Example:
//!   analyzer-client contrato.pdf --ics vencimentos.ics --pdf analise.pdf

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use contract_analyzer::{calendar, report};
use contract_analyzer::client::{
    HttpTransport, Notifier, SelectedFile, SubmitOutcome, UploadClient, ViewState, DEFAULT_ENDPOINT,
    EMPTY_STATE_TEXT,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "analyzer-client", version, about = "Send a contract to the analysis server")]
struct Args {
    /// Contract to analyze (.pdf, .docx or .txt)
    file: Option<PathBuf>,

    /// Analysis endpoint
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Write the due dates of a successful analysis to this iCalendar file
    #[arg(long)]
    ics: Option<PathBuf>,

    /// Write a PDF report of a successful analysis to this file
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: Level,
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn alert(&mut self, message: &str) {
        eprintln!("{} {}", "!".red().bold(), message.red());
    }
}

fn print_view(view: &ViewState) {
    println!("{} {}", "Arquivo:".bold(), view.file_label);
    if view.result_visible {
        println!("{}", view.result_text);
    } else if view.empty_state_visible {
        println!("{}", EMPTY_STATE_TEXT.dimmed());
    }
}

fn export_calendar(analysis: &serde_json::Value, path: &Path) -> Result<()> {
    let dates = calendar::due_dates(analysis);
    if dates.is_empty() {
        eprintln!("{}", "Nenhuma data de vencimento para exportar".yellow());
        return Ok(());
    }

    let ics = calendar::to_ics(
        &dates,
        calendar::DEFAULT_TITLE,
        calendar::DEFAULT_DETAILS,
        chrono::Utc::now(),
    );
    std::fs::write(path, ics).with_context(|| format!("Failed to write {}", path.display()))?;

    println!();
    println!("{} {}", "Calendário salvo em".green(), path.display());
    for link in calendar::links(
        &dates,
        calendar::DEFAULT_TITLE,
        calendar::DEFAULT_DETAILS,
        calendar::DEFAULT_TIMEZONE,
    ) {
        println!("  {} ({})", link.description.bold(), link.date_iso);
        println!("    Google:  {}", link.google);
        println!("    Outlook: {}", link.outlook_live);
    }
    Ok(())
}

fn export_report(analysis: &serde_json::Value, path: &Path) -> Result<()> {
    let pdf = report::analysis_pdf(analysis)?;
    std::fs::write(path, pdf).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "Relatório salvo em".green(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut client = UploadClient::new(HttpTransport::new(&args.endpoint), TerminalNotifier);

    match &args.file {
        Some(path) => {
            let file = SelectedFile::from_path(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            client.on_file_selected([file]);
        }
        None => client.on_file_selected(Vec::new()),
    }

    let outcome = client.submit().await;
    print_view(client.view());

    match outcome {
        SubmitOutcome::Rendered(analysis) => {
            if let Some(path) = &args.ics {
                export_calendar(&analysis, path)?;
            }
            if let Some(path) = &args.pdf {
                export_report(&analysis, path)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}
