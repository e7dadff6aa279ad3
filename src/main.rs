use billdesk::{
    api::{ApiClient, HttpTransport, Pagination},
    cache::QueryClient,
    config::{AppConfig, DEFAULT_CONFIG_PATH, database, load_app_configuration},
    core::{
        date_range::DateRange,
        format::{format_currency, format_display_date, format_percent},
        preferences::SqlitePreferenceStore,
        ui_mode::{UiMode, UiModeContext},
    },
    errors::{Error, Result},
    resources::{
        BillingClient,
        invoices::{InvoiceFilter, StatusFilter},
    },
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line front-end for the billing backend.
#[derive(Debug, Parser)]
#[command(name = "billdesk", version, about)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the UI mode, or set it to `simple` or `advanced`
    Mode {
        /// New mode
        mode: Option<String>,
    },
    /// List invoices
    Invoices {
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// `all`, `draft`, `finalized`, `partially-paid`, `paid` or `cancelled`
        #[arg(long, default_value = "all")]
        status: String,
        /// Search by number or party name
        #[arg(long)]
        search: Option<String>,
    },
    /// GST summary for a date range (YYYY-MM-DD)
    GstReport {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load settings, then run the command
    let config = load_app_configuration(&cli.config)
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    run(cli.command, &config)
        .await
        .inspect_err(|e| error!("{}", e))
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Mode { mode } => {
            let db = database::create_connection(&config.storage.database_url).await?;
            let ui = UiModeContext::load(Arc::new(SqlitePreferenceStore::new(db))).await;
            if let Some(mode) = mode {
                let mode: UiMode = mode.parse()?;
                ui.set_mode(mode).await?;
                info!(%mode, "UI mode saved");
            }
            let mode = ui.mode().unwrap_or_default();
            println!("UI mode: {}", ui.label("Simple", "Advanced").unwrap_or(mode.as_str()));
            Ok(())
        }
        Command::Invoices {
            page,
            status,
            search,
        } => {
            let client = billing_client(config)?;
            let filter = InvoiceFilter {
                pagination: Pagination {
                    page,
                    page_size: config.ui.page_size,
                },
                status: status.parse::<StatusFilter>()?,
                search,
                ..InvoiceFilter::default()
            };

            let list = client.invoices(&filter);
            let result = list.fetch().await;
            if let Some(e) = result.error {
                return Err(e.into());
            }
            let Some(page) = result.data else {
                return Ok(());
            };

            for invoice in &page.data {
                println!(
                    "{:<12} {:<24} {:<12} {:<15} {:>16}",
                    invoice.number.as_deref().unwrap_or("(draft)"),
                    invoice.party_name.as_deref().unwrap_or(&invoice.party_id),
                    format_display_date(invoice.issue_date),
                    invoice.status.as_str(),
                    format_currency(&invoice.total),
                );
            }
            println!(
                "Page {} of {} ({} invoices)",
                page.page,
                page.total_pages.max(1),
                page.total
            );
            Ok(())
        }
        Command::GstReport { from, to } => {
            let range = DateRange::with_dates(from, to, config.ui.max_range_months);
            if let Some(e) = range.error() {
                return Err(Error::validation(e.to_string()));
            }
            if !range.is_valid() {
                return Err(Error::validation("Enter both dates as YYYY-MM-DD"));
            }

            let client = billing_client(config)?;
            let report = client.gst_summary(&range);
            let result = report.fetch().await;
            if let Some(e) = result.error {
                return Err(e.into());
            }
            let Some(summary) = result.data else {
                return Ok(());
            };

            println!(
                "GST summary {} to {}",
                format_display_date(summary.from),
                format_display_date(summary.to)
            );
            for row in &summary.rows {
                println!(
                    "{:>6} {:>16} {:>14} {:>14} {:>14}",
                    format_percent(row.rate),
                    format_currency(&row.taxable_value),
                    format_currency(&row.cgst),
                    format_currency(&row.sgst),
                    format_currency(&row.igst),
                );
            }
            println!("Total tax: {}", format_currency(&summary.total_tax));
            Ok(())
        }
    }
}

fn billing_client(config: &AppConfig) -> Result<BillingClient> {
    let transport = HttpTransport::new(
        config.api.base_url.clone(),
        config.api.token.clone(),
        config.timeout(),
    )?;
    let api = ApiClient::new(Arc::new(transport), config.retry_policy());
    Ok(BillingClient::new(api, QueryClient::new()))
}
