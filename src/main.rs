use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use partner_export::app::clean_notes_use_case::clean_notes_file;
use partner_export::app::dispatch_use_case::phones_from_rows;
use partner_export::config::Config;
use partner_export::logging;
use partner_export::pipeline::processing::enrich::ExportFilters;
use partner_export::server::{start_server, AppState};

#[derive(Parser)]
#[command(name = "partner_export")]
#[command(about = "Export Odoo partners with order statistics and notify them over WhatsApp")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export partners with order count and total to a CSV file
    Export {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        sales_rep: Option<String>,
        /// Row cap for the partner query
        #[arg(long)]
        max_rows: Option<u32>,
    },
    /// Send one text message to a list of phones, one at a time
    Dispatch {
        #[arg(long)]
        message: String,
        /// Explicit recipients. When omitted, phones come from the filtered export.
        #[arg(long = "phone")]
        phones: Vec<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        sales_rep: Option<String>,
    },
    /// Strip markup from the Notes column of an exported CSV
    CleanNotes {
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check Odoo credentials and WhatsApp configuration
    TestConnection,
    /// Start the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Export {
            city,
            sales_rep,
            max_rows,
        } => {
            let state = AppState::from_config(&config)?;
            let filters = ExportFilters {
                max_rows,
                ..ExportFilters::new(city, sales_rep)
            };
            match state.export.export(&filters).await {
                Ok(outcome) => {
                    println!("Exported {} partners to {}", outcome.count, outcome.path.display());
                }
                Err(e) if e.is_empty_result() => {
                    println!("{}", e);
                }
                Err(e) => {
                    error!("Export failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Dispatch {
            message,
            phones,
            city,
            sales_rep,
        } => {
            let state = AppState::from_config(&config)?;
            let phones = if phones.is_empty() {
                let rows = state.export.fetch_rows(&ExportFilters::new(city, sales_rep)).await?;
                phones_from_rows(&rows)
            } else {
                phones
            };
            info!("Dispatching to {} recipients", phones.len());
            let report = state.dispatch.send_bulk(phones, message).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CleanNotes { input, output } => {
            let summary = clean_notes_file(&input, output.as_deref())?;
            println!(
                "Cleaned column '{}' in {} rows -> {}",
                summary.notes_column,
                summary.rows,
                summary.output.display()
            );
        }
        Commands::TestConnection => {
            let state = AppState::from_config(&config)?;
            match state.export.test_connection().await {
                Ok(()) => println!("Odoo: connected to {}", config.odoo.url),
                Err(e) => println!("Odoo: {}", e),
            }
            if config.whatsapp.has_token() {
                let ok = state.dispatch.verify_credentials().await;
                println!("WhatsApp: {}", if ok { "credentials valid" } else { "credentials rejected" });
            } else {
                println!("WhatsApp: access token not configured");
            }
        }
        Commands::Serve { port } => {
            if let Some(metrics_port) = config.server.metrics_port {
                partner_export::metrics::init_metrics(metrics_port);
            }
            let state = Arc::new(AppState::from_config(&config)?);
            let port = port.unwrap_or(config.server.port);
            start_server(state, &config.server.host, port).await?;
        }
    }

    Ok(())
}
