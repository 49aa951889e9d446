//! Donation Tracker
//!
//! Keeps a local copy of the PayPal transaction history, one JSON batch per
//! month, and turns it into monthly donation and subscription summaries.
//! The yearly totals are published for the donations page.

mod adjustments;
mod config;
mod constants;
mod dedup;
mod donors;
mod exchange;
mod ledger;
mod nvp;
mod paypal;
mod reconcile;
mod record;
mod store;
mod summary;
mod upload;

use anyhow::Result;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{Config, FileConfig};
use donors::DonorPreferences;
use paypal::PayPalClient;
use reconcile::YearReport;
use store::TransactionStore;
use summary::month_name;

#[derive(Parser, Debug)]
#[command(name = "donation-tracker")]
#[command(about = "Monthly donation summaries reconciled from PayPal transaction history")]
struct Args {
    /// Data directory for transaction batches, summary snapshots and side files
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Path to the config file
    #[arg(short, long, default_value = constants::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Defaults to `update` for the current year
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch new transactions, summarize the year and publish the totals
    Update {
        /// Year to process (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Do not upload the totals
        #[arg(long)]
        skip_upload: bool,
    },

    /// Summarize stored transactions without contacting PayPal
    Summarize {
        /// Year to summarize (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Fetch one month in full and overwrite its stored batch
    Fetch {
        /// Month number (1-12)
        #[arg(long)]
        month: u32,

        /// Year of the month (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// List donors and what they gave
    Personal {
        /// Year to list (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Only print email addresses
        #[arg(long)]
        emails: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let now = Utc::now();
    let (current_year, current_month) = (now.year(), now.month());

    let command = args.command.unwrap_or(Command::Update {
        year: None,
        skip_upload: false,
    });

    match command {
        Command::Update { year, skip_upload } => {
            let year = resolve_year(year, current_year)?;
            let upload = year == current_year && !skip_upload;

            let file_config = FileConfig::load(&args.config)?;
            file_config.validate(upload)?;
            let config = Config::from_file(&file_config, args.data_dir);

            let rate = fetch_rate(&config).await?;
            let client = PayPalClient::new(config.paypal.clone());
            let report =
                reconcile::process_year(&client, &config, year, current_year, current_month, rate)
                    .await?;
            print_report(&report);
            if !report.updated_months.is_empty() {
                let months: Vec<&str> = report
                    .updated_months
                    .iter()
                    .map(|m| month_name(*m))
                    .collect();
                println!("\nUpdated batches: {}", months.join(", "));
            }

            match (&config.upload, upload) {
                (Some(target), true) => {
                    upload::upload(target, &report.donations).await?;
                    println!(
                        "\nUploaded totals to https://{}/{}/{}",
                        target.host, target.bucket, target.key
                    );
                }
                _ => tracing::info!(year, skip_upload, "not uploading totals"),
            }
            Ok(())
        }

        Command::Summarize { year } => {
            let year = resolve_year(year, current_year)?;
            let file_config = FileConfig::load(&args.config)?;
            file_config.validate(false)?;
            let config = Config::from_file(&file_config, args.data_dir);

            let rate = fetch_rate(&config).await?;
            let store = TransactionStore::load(&config.data_dir, year)?;
            match store.latest_record() {
                Some(latest) => println!("Latest stored transaction: {}", latest.timestamp),
                None => println!("No stored transactions for {}", year),
            }

            let report =
                reconcile::summarize_year(&config, &store, current_year, current_month, rate)?;
            print_report(&report);
            Ok(())
        }

        Command::Fetch { month, year } => {
            let year = resolve_year(year, current_year)?;
            check_month(month, year, current_year, current_month)?;

            let file_config = FileConfig::load(&args.config)?;
            file_config.validate(false)?;
            let config = Config::from_file(&file_config, args.data_dir);

            let client = PayPalClient::new(config.paypal.clone());
            let mut store = TransactionStore::empty(&config.data_dir, year);
            let count = paypal::fetch_and_save_month(&client, &mut store, month).await?;
            println!(
                "Saved {} transactions for {} {} to {}",
                count,
                month_name(month),
                year,
                store.batch_path(month).display()
            );
            Ok(())
        }

        Command::Personal { year, emails } => {
            let year = resolve_year(year, current_year)?;
            let file_config = FileConfig::load(&args.config)?;
            let config = Config::from_file(&file_config, args.data_dir);

            let store = TransactionStore::load(&config.data_dir, year)?;
            let prefs = DonorPreferences::load(&config.donors_path())?;
            let donors = donors::collect(store.records(), &prefs);
            print_donors(year, &donors, emails);
            Ok(())
        }
    }
}

/// `info` by default, `debug` with --verbose, RUST_LOG wins over both
fn init_logging(verbose: bool) {
    let default = if verbose {
        "donation_tracker=debug"
    } else {
        "donation_tracker=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

/// Current EUR to USD rate, refusing to continue on a zero rate
async fn fetch_rate(config: &Config) -> Result<f64> {
    let rate =
        exchange::fetch_eur_to_usd(&config.exchange_url, &config.exchange_access_key).await?;
    let rate = exchange::ensure_usable(rate)?;
    tracing::info!(rate, "EUR to USD exchange rate");
    Ok(rate)
}

/// Requested year, or the current one, within the years PayPal data exists for
fn resolve_year(year: Option<i32>, current_year: i32) -> Result<i32> {
    let year = year.unwrap_or(current_year);
    if !(constants::MIN_YEAR..=current_year).contains(&year) {
        anyhow::bail!(
            "Invalid year {}, must be between {} and {}",
            year,
            constants::MIN_YEAR,
            current_year
        );
    }
    Ok(year)
}

/// Months of the current year stop at the current month
fn check_month(month: u32, year: i32, current_year: i32, current_month: u32) -> Result<()> {
    let last = if year == current_year { current_month } else { 12 };
    if !(1..=last).contains(&month) {
        anyhow::bail!(
            "Invalid month {} for {}, must be between 1 and {}",
            month,
            year,
            last
        );
    }
    Ok(())
}

fn print_report(report: &YearReport) {
    if !report.other.is_empty() {
        println!("\nOther transactions ({}):", report.other.len());
        for record in &report.other {
            println!("  {}", record);
        }
        println!("  Total: {}", record::total_by_currency(&report.other));
    }

    println!("\n{} Donations", report.year);
    println!("=============================================");
    println!(
        "{:<10} {:>4} {:<26} {:>4} {:<26} {:<26}",
        "Month", "#", "One-time", "#", "Subscriptions", "Net"
    );
    println!("{}", "-".repeat(100));

    for (month, summary) in report.summaries.iter() {
        println!(
            "{:<10} {:>4} {:<26} {:>4} {:<26} {:<26}",
            month_name(month),
            summary.one_time_count,
            summary.one_time.to_string(),
            summary.subscription_count,
            summary.subscription.to_string(),
            summary.net_total().to_string(),
        );
    }

    println!("{}", "-".repeat(100));
    println!("Total: {}", report.total);
    println!("Fees:  {}", report.total.fees);

    let donations = &report.donations;
    println!("\nUSD donations:   ${:>12.2}", donations.usd_donations);
    println!("EUR donations:   €{:>12.2}", donations.eur_donations);
    println!("EUR to USD rate:  {:>12.4}", donations.eur_to_usd_rate);
    println!("Total (USD):     ${:>12.2}", donations.total_donations);
}

fn print_donors(year: i32, donors: &[donors::Donor], emails_only: bool) {
    if emails_only {
        for donor in donors {
            println!("{}", donor.email);
        }
        return;
    }

    println!("{} Donors", year);
    println!("=============================================");
    println!(
        "{:<30} {:<36} {:>5}  Total",
        "Name", "Email", "#"
    );
    println!("{}", "-".repeat(90));
    for donor in donors {
        let name = if donor.anonymous {
            "(anonymous)"
        } else {
            donor.name.as_str()
        };
        println!(
            "{:<30} {:<36} {:>5}  {}",
            name, donor.email, donor.count, donor.total
        );
    }
    println!("\n{} donor(s)", donors.len());
}
