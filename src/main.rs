use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use loanflow::application::envelope::{EnvelopeOrchestrator, EnvelopeSettings};
use loanflow::application::fields::{FieldSynthesizer, LenderIdentity};
use loanflow::application::loan_service::LoanService;
use loanflow::config::Config;
use loanflow::domain::amortization;
use loanflow::domain::loan::{Loan, PaymentFrequency};
use loanflow::domain::ports::Stores;
use loanflow::domain::schedule::PaymentScheduleEntry;
use loanflow::domain::state_machine::{Actor, TransitionRecord};
use loanflow::infrastructure::esign::DryRunSignatureProvider;
#[cfg(feature = "storage-rocksdb")]
use loanflow::infrastructure::rocksdb::RocksDBStore;
use loanflow::interfaces::bundle::LoanBundle;
use loanflow::interfaces::csv::schedule_writer::ScheduleWriter;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print an amortization schedule as CSV
    Schedule {
        #[arg(long)]
        principal: Decimal,
        /// Annual percentage rate, e.g. 9.99
        #[arg(long)]
        annual_rate: Decimal,
        #[arg(long)]
        periods: u32,
        #[arg(long, value_enum, default_value_t = Frequency::Weekly)]
        frequency: Frequency,
        /// Date the first period starts from (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,
    },
    /// Print the contract fields synthesized for a loan bundle as JSON
    Fields {
        /// Loan bundle JSON file
        bundle: PathBuf,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Run a loan bundle from creation to funding against the dry-run provider
    Simulate {
        /// Loan bundle JSON file
        bundle: PathBuf,
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl From<Frequency> for PaymentFrequency {
    fn from(value: Frequency) -> Self {
        match value {
            Frequency::Weekly => PaymentFrequency::Weekly,
            Frequency::Biweekly => PaymentFrequency::Biweekly,
            Frequency::Monthly => PaymentFrequency::Monthly,
        }
    }
}

#[derive(Serialize)]
struct SimulationReport {
    loan: Loan,
    schedule: Vec<PaymentScheduleEntry>,
    history: Vec<TransitionRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().into_diagnostic()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();

    match cli.command {
        Command::Schedule {
            principal,
            annual_rate,
            periods,
            frequency,
            start_date,
        } => {
            let frequency = PaymentFrequency::from(frequency);
            let rate = amortization::periodic_rate(annual_rate, frequency).into_diagnostic()?;
            let schedule =
                amortization::schedule(principal, rate, periods, start_date, frequency.period_days())
                    .into_diagnostic()?;

            let stdout = io::stdout();
            let mut writer = ScheduleWriter::new(stdout.lock());
            writer.write_schedule(&schedule).into_diagnostic()?;
        }
        Command::Fields { bundle, today } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let bundle = LoanBundle::from_reader(File::open(bundle).into_diagnostic()?)
                .into_diagnostic()?;
            let loan = Loan::new(
                bundle.loan,
                bundle.organization.id,
                bundle.borrower.id,
                Utc::now(),
            )
            .into_diagnostic()?;
            let schedule = amortization::schedule(
                loan.principal,
                loan.periodic_rate().into_diagnostic()?,
                loan.periods,
                today,
                loan.frequency.period_days(),
            )
            .into_diagnostic()?;

            let fields = FieldSynthesizer::new(config.lender)
                .synthesize(&loan, &bundle.borrower, &bundle.organization, &schedule, today)
                .into_diagnostic()?;
            serde_json::to_writer_pretty(io::stdout().lock(), &fields).into_diagnostic()?;
            println!();
        }
        Command::Simulate {
            bundle,
            today,
            db_path,
        } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let bundle = LoanBundle::from_reader(File::open(bundle).into_diagnostic()?)
                .into_diagnostic()?;
            let stores = open_stores(db_path.or(config.db_path))?;
            let report = simulate(stores, config.lender, config.envelope, bundle, today)
                .await
                .into_diagnostic()?;
            serde_json::to_writer_pretty(io::stdout().lock(), &report).into_diagnostic()?;
            println!();
        }
    }

    Ok(())
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(RocksDBStore::open(path).into_diagnostic()?.into_stores()),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            tracing::warn!(
                db_path = %path.display(),
                "Persistent storage requested but the storage-rocksdb feature is not enabled; falling back to in-memory storage"
            );
            Ok(Stores::in_memory())
        }
        None => Ok(Stores::in_memory()),
    }
}

async fn simulate(
    stores: Stores,
    lender: LenderIdentity,
    settings: EnvelopeSettings,
    bundle: LoanBundle,
    today: NaiveDate,
) -> loanflow::error::Result<SimulationReport> {
    let orchestrator = EnvelopeOrchestrator::new(
        FieldSynthesizer::new(lender),
        settings,
        Box::new(DryRunSignatureProvider::new()),
    );
    let service = LoanService::new(stores, orchestrator);
    let admin = Actor::Admin("cli".to_string());
    let application = bundle.application();

    service.register_organization(bundle.organization.clone()).await?;
    service.register_borrower(bundle.borrower.clone()).await?;
    let loan = service
        .create_loan(bundle.organization.id, bundle.borrower.id, bundle.loan)
        .await?;

    service.send_application(loan.id, admin.clone()).await?;
    service.open_application(loan.id).await?;
    service
        .complete_application(loan.id, &application, today)
        .await?;
    let submission = service.submit_envelope(loan.id, today, admin.clone()).await?;

    let signers = service
        .loan(loan.id)
        .await?
        .envelope
        .map(|envelope| envelope.signers)
        .unwrap_or_default();
    for signer in signers {
        service
            .record_signature(&submission.envelope_id, signer.role, Utc::now())
            .await?;
    }
    service.fund_loan(loan.id, admin).await?;

    Ok(SimulationReport {
        loan: service.loan(loan.id).await?,
        schedule: service.schedule(loan.id).await?.unwrap_or_default(),
        history: service.history(loan.id).await?,
    })
}
