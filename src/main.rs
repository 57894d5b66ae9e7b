mod config;
mod dashboard;
mod document;
mod intake;
mod pdf_text;
mod policy;
mod review;
mod store;
mod structuring;
mod validator;

use clap::{Parser, Subcommand};
use config::{Config, LlmBackend};
use dashboard::Summary;
use document::DocumentType;
use intake::Intake;
use pdf_text::{PdfTextExtractor, SkipExtraction, TextExtractor};
use policy::StatusPolicy;
use review::ReviewEdits;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use store::export;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use validator::Validator;

#[derive(Parser)]
#[command(name = "docuflow")]
#[command(author, version, about = "Document intake with human review")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = ".config/docuflow.toml")]
    config: PathBuf,

    /// Use the mock extractor: no PDF parsing, no API calls
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, validate and store one or more PDFs
    Ingest {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// List documents waiting for review
    Queue,

    /// Approve a document, optionally correcting fields first
    Approve {
        id: i64,

        #[arg(long)]
        vendor: Option<String>,

        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        total: Option<f64>,

        /// Invoice, Receipt, Bill or Other
        #[arg(long = "type")]
        doc_type: Option<String>,
    },

    /// Show totals and the most recent documents
    Dashboard {
        /// How many ledger rows to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Write every stored document to a CSV file
    Export {
        /// Defaults to docuflow_audit_YYYYMMDD.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "docuflow failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the command ran but something it was asked to do failed.
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut cfg = Config::load_or_default(&cli.config)?;
    if cli.demo {
        cfg.llm.backend = LlmBackend::Demo;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    // a subscriber may already be installed when run() is driven from tests
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .try_init();

    let store = store::open_store(&cfg)?;
    let validator = Validator::from_policy(&cfg.policy);

    match cli.command {
        Commands::Ingest { files } => {
            let chain = structuring::build_chain(&cfg.llm).await?;
            info!(strategies = ?chain.names(), "Structuring chain ready");
            if chain.is_empty() {
                error!("No structuring strategy available, every document will fail");
            }

            let text: Box<dyn TextExtractor> = match cfg.llm.backend {
                LlmBackend::Demo => Box::new(SkipExtraction),
                _ => Box::new(PdfTextExtractor),
            };
            let policy = StatusPolicy::new(cfg.policy.auto_approve_threshold);
            info!(threshold = policy.threshold(), "Auto-approval threshold");
            let intake = Intake {
                text: text.as_ref(),
                structurer: &chain,
                validator: &validator,
                policy: &policy,
                store: store.as_ref(),
                upload_dir: cfg.upload_dir.as_deref().map(Path::new),
            };

            let mut all_ok = true;
            for file in &files {
                match intake.process(file).await {
                    Ok(outcome) => {
                        println!(
                            "#{} {} -> {} (confidence {}%)",
                            outcome.id,
                            file.display(),
                            outcome.status,
                            outcome.document.overall_confidence
                        );
                        for rule in &outcome.report.rules {
                            println!("    [{}] {}: {}", rule.status, rule.rule, rule.message);
                        }
                    }
                    Err(e) => {
                        error!(file = %file.display(), error = %e, "Intake failed");
                        eprintln!("Error: {}", e);
                        all_ok = false;
                    }
                }
            }
            Ok(all_ok)
        }

        Commands::Queue => {
            let items = review::pending(store.as_ref(), &validator);
            if items.is_empty() {
                println!("Review queue is empty.");
                return Ok(true);
            }

            println!("{} document(s) need review", items.len());
            for item in &items {
                let doc = &item.document;
                println!();
                println!(
                    "#{} {} (confidence {}%, uploaded {})",
                    item.record.id, item.record.filename, item.record.confidence, item.record.timestamp
                );
                println!(
                    "    type: {}  vendor: {}  date: {}  total: {}",
                    doc.document_type.map(|t| t.as_str()).unwrap_or("N/A"),
                    doc.vendor_name.as_deref().unwrap_or("N/A"),
                    doc.date.as_deref().unwrap_or("N/A"),
                    doc.total_amount
                        .as_ref()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                );
                for rule in &item.report.rules {
                    println!("    [{}] {}: {}", rule.status, rule.rule, rule.message);
                }
            }
            Ok(true)
        }

        Commands::Approve {
            id,
            vendor,
            date,
            total,
            doc_type,
        } => {
            let edits = ReviewEdits {
                vendor_name: vendor,
                date,
                total_amount: total,
                document_type: doc_type.map(DocumentType::from),
            };
            if review::approve(store.as_ref(), id, &edits)? {
                println!("Document #{} approved.", id);
                Ok(true)
            } else {
                eprintln!("No document with id {}", id);
                Ok(false)
            }
        }

        Commands::Dashboard { limit } => {
            let records = store.list_all();
            let Some(summary) = Summary::from_records(&records) else {
                println!("No documents processed yet.");
                return Ok(true);
            };

            println!("Processed:          {}", summary.processed);
            println!("Approved:           {}", summary.approved);
            println!("Approval rate:      {}%", summary.approval_rate);
            println!("Needs review:       {}", summary.needs_review);
            println!("Average confidence: {}%", summary.average_confidence);
            println!();
            println!(
                "{:>4}  {:<19}  {:<24}  {:<12}  {:>4}  {:<24}  {:>10}",
                "id", "timestamp", "filename", "status", "conf", "vendor", "total"
            );
            for r in dashboard::ledger(&records).into_iter().take(limit) {
                println!(
                    "{:>4}  {:<19}  {:<24}  {:<12}  {:>3}%  {:<24}  {:>10}",
                    r.id, r.timestamp, r.filename, r.status, r.confidence, r.vendor, r.total
                );
            }
            Ok(true)
        }

        Commands::Export { output } => {
            let path = output
                .unwrap_or_else(|| PathBuf::from(export::default_export_name(validator::today())));
            let rows = export::export_to_file(&store.list_all(), &path)?;
            println!("Exported {} document(s) to {}", rows, path.display());
            Ok(true)
        }
    }
}
