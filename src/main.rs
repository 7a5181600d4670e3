use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use issuance_ledger::dates::{format_catalog_date, parse_date};
use issuance_ledger::{
    delete_all_persons, delete_person, enroll_person, export_ledger_csv, list_persons,
    record_usage, refresh_person, setup_database, update_person_attributes, AppConfig, Catalog,
    IssuanceEngine, ItemLedgerEntry, PersonInput,
};

#[derive(Parser)]
#[command(
    name = "issuance-ledger",
    about = "Supply issuance scheduling and ledger reconciliation",
    version
)]
struct Cli {
    /// TOML config file (defaults to $ISSUANCE_LEDGER_CONFIG, then built-ins)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluation date, YYYY-MM-DD (defaults to today)
    #[arg(long, global = true, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Enroll a person and compute their initial ledger
    Enroll {
        #[arg(long)]
        name: String,

        #[command(flatten)]
        person: PersonArgs,
    },

    /// List enrolled persons
    List,

    /// Show a person's ledger, appending anything newly due
    Show {
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record consumption on one issuance
    Use {
        id: String,
        item: String,
        /// Issuance position within the item (0-based)
        index: usize,
        count: u32,
    },

    /// Replace a person's dates (e.g. add a maternity window)
    Update {
        id: String,

        #[command(flatten)]
        person: PersonArgs,
    },

    /// Delete one person
    Delete { id: String },

    /// Delete every person
    DeleteAll,

    /// Compute a ledger without touching the database
    Schedule {
        #[command(flatten)]
        person: PersonArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a person's ledger as CSV
    Export { id: String, path: PathBuf },
}

#[derive(Args)]
struct PersonArgs {
    /// male or female
    #[arg(long)]
    gender: String,

    /// Service start date
    #[arg(long)]
    start: String,

    /// Promotion date
    #[arg(long)]
    promotion: String,

    #[arg(long)]
    maternity_start: Option<String>,

    /// Maternity leave length in months
    #[arg(long)]
    maternity_months: Option<u32>,
}

impl From<PersonArgs> for PersonInput {
    fn from(args: PersonArgs) -> Self {
        PersonInput {
            gender: Some(args.gender),
            service_start_date: Some(args.start),
            promotion_date: Some(args.promotion),
            maternity_leave_start: args.maternity_start,
            maternity_leave_duration: args.maternity_months,
        }
    }
}

fn parse_as_of(raw: &str) -> Result<NaiveDate, String> {
    parse_date("--as-of", raw).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // "now" is read once here and passed down explicitly
    let now = cli
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Commands::Init => {
            open_database(&config)?;
            println!("✓ Database initialized at {:?}", config.database_path);
        }

        Commands::Enroll { name, person } => {
            let engine = load_engine(&config)?;
            let conn = open_database(&config)?;
            let person = enroll_person(&conn, &engine, &name, &PersonInput::from(person), now)?;

            println!("✓ Enrolled {} ({})", person.name, person.id);
            print_ledger(&person.ledger);
        }

        Commands::List => {
            let conn = open_database(&config)?;
            let persons = list_persons(&conn)?;

            for person in &persons {
                println!(
                    "{}  {:<30} {:<6} start {}  promotion {}",
                    person.id,
                    person.name,
                    person.attributes.gender,
                    format_catalog_date(person.attributes.service_start_date),
                    format_catalog_date(person.attributes.promotion_date),
                );
            }
            println!("{} persons", persons.len());
        }

        Commands::Show { id, json } => {
            let engine = load_engine(&config)?;
            let mut conn = open_database(&config)?;
            let (person, report) = refresh_person(&mut conn, &engine, &id, now)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&person)?);
            } else {
                println!("{} ({}) as of {}", person.name, person.id, format_catalog_date(now));
                if report.changed() {
                    println!("✓ {}", report.summary());
                }
                print_ledger(&person.ledger);
            }
        }

        Commands::Use { id, item, index, count } => {
            let mut conn = open_database(&config)?;
            record_usage(&mut conn, &id, &item, index, count)?;
            println!("✓ {} #{}: used {}", item, index, count);
        }

        Commands::Update { id, person } => {
            let conn = open_database(&config)?;
            let person = update_person_attributes(&conn, &id, &PersonInput::from(person))?;
            println!("✓ Updated {} ({})", person.name, person.id);
        }

        Commands::Delete { id } => {
            let conn = open_database(&config)?;
            delete_person(&conn, &id)?;
            println!("✓ Deleted {}", id);
        }

        Commands::DeleteAll => {
            let conn = open_database(&config)?;
            let deleted = delete_all_persons(&conn)?;
            println!("✓ Deleted {} persons", deleted);
        }

        Commands::Schedule { person, json } => {
            let engine = load_engine(&config)?;
            let ledger = engine.compute_from_input(&PersonInput::from(person), now)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&ledger)?);
            } else {
                print_ledger(&ledger);
            }
        }

        Commands::Export { id, path } => {
            let engine = load_engine(&config)?;
            let mut conn = open_database(&config)?;
            let (person, _) = refresh_person(&mut conn, &engine, &id, now)?;

            export_ledger_csv(&person.ledger, &path)?;
            println!("✓ Exported ledger of {} to {:?}", person.name, path);
        }
    }

    Ok(())
}

fn load_engine(config: &AppConfig) -> Result<IssuanceEngine> {
    let catalog = Catalog::from_dir(&config.catalog_dir)
        .with_context(|| format!("Failed to load catalog from {:?}", config.catalog_dir))?;
    Ok(IssuanceEngine::new(catalog))
}

fn open_database(config: &AppConfig) -> Result<Connection> {
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn print_ledger(ledger: &[ItemLedgerEntry]) {
    for entry in ledger {
        println!(
            "\n{}  (total {}, used {}, cash {:.2})",
            entry.name,
            entry.total_quantity,
            entry.total_used(),
            entry.cash
        );

        if entry.issuances.is_empty() {
            println!("    (nothing issued yet)");
        }

        for (index, issuance) in entry.issuances.iter().enumerate() {
            println!(
                "    #{:<3} {}  qty {}  used {}  left {}",
                index,
                format_catalog_date(issuance.date),
                issuance.quantity,
                issuance.used_count,
                issuance.remaining()
            );
        }
    }
}
