// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use clinic_records::{
    fetch_report, init_tracing, total_patients, ClinicError, ClinicSession, Config, EditTarget,
    Prompt, ReportFilter, Resolved, SqliteStore, VisitDraft, VisitEdit, VisitPage,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Barangay clinic medical records")]
struct Cli {
    /// SQLite database file (overrides CLINIC_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Init,
    /// Load citizens from a CSV file (name,age,address)
    ImportCitizens { path: PathBuf },
    /// Load nurses from a CSV file (name,specialization)
    ImportNurses { path: PathBuf },
    /// Register a citizen, asking for anything missing
    AddCitizen {
        name: String,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        address: Option<String>,
    },
    AddNurse {
        name: String,
        #[arg(long)]
        specialization: Option<String>,
    },
    /// Record a visit. Citizen and nurse may be names or ids.
    AddVisit {
        #[arg(long)]
        citizen: String,
        #[arg(long)]
        nurse: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Filled from the citizen on file when the name matches exactly
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long, default_value = "")]
        symptoms: String,
        #[arg(long, default_value = "")]
        diagnosis: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change a visit. Omitted fields keep their current values.
    EditVisit {
        id: i64,
        #[arg(long)]
        citizen: Option<String>,
        #[arg(long)]
        nurse: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        symptoms: Option<String>,
        #[arg(long)]
        diagnosis: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    DeleteVisit { id: i64 },
    /// Show one page of visits, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        search: Option<String>,
    },
    /// Visit totals by diagnosis, nurse and patient
    Report {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Browse records in the terminal (default)
    Ui,
}

fn main() {
    init_tracing("warn");

    if let Err(err) = run(Cli::parse()) {
        match err.downcast_ref::<ClinicError>() {
            Some(e) if e.is_user_error() => eprintln!("❌ {}", e),
            _ => eprintln!("❌ Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;

    if let Some(Command::Init) = cli.command {
        println!("✓ Database ready at {}", config.db_path.display());
        println!("✓ Citizens on file: {}", total_patients(&store)?);
        return Ok(());
    }

    let mut session = ClinicSession::open(store, config.page_size)?;

    match cli.command.unwrap_or(Command::Ui) {
        Command::Init => {}
        Command::ImportCitizens { path } => {
            println!("📂 Loading citizens from {}...", path.display());
            let summary = session.import_citizens(&path)?;
            println!("✓ Inserted {} citizens ({} already on file)", summary.inserted, summary.skipped);
        }
        Command::ImportNurses { path } => {
            println!("📂 Loading nurses from {}...", path.display());
            let summary = session.import_nurses(&path)?;
            println!("✓ Inserted {} nurses ({} already on file)", summary.inserted, summary.skipped);
        }
        Command::AddCitizen { name, age, address } => {
            let resolved =
                session.register_citizen(&name, age, address.as_deref(), prompt().as_mut())?;
            report_resolution("citizen", &resolved);
        }
        Command::AddNurse {
            name,
            specialization,
        } => {
            let resolved =
                session.register_nurse(&name, specialization.as_deref(), prompt().as_mut())?;
            report_resolution("nurse", &resolved);
        }
        Command::AddVisit {
            citizen,
            nurse,
            date,
            age,
            address,
            symptoms,
            diagnosis,
            notes,
        } => {
            let mut draft = VisitDraft {
                citizen,
                nurse,
                visit_date: date.unwrap_or_else(|| {
                    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
                }),
                symptoms,
                diagnosis,
                notes,
                ..Default::default()
            };
            draft.autofill(session.cache());
            if let Some(age) = age {
                draft.age = age;
            }
            if let Some(address) = address {
                draft.address = address;
            }

            let visit = session.create_visit(&draft, prompt().as_mut())?;
            println!("✅ Saved visit #{} on {}", visit.id, visit.visit_date);
        }
        Command::EditVisit {
            id,
            citizen,
            nurse,
            date,
            age,
            address,
            symptoms,
            diagnosis,
            notes,
        } => {
            let record = session.visit(id)?;
            let mut edit = VisitEdit::prefill(&record, session.cache());
            let overrides = [
                (&mut edit.citizen, citizen),
                (&mut edit.nurse, nurse),
                (&mut edit.visit_date, date),
                (&mut edit.age, age),
                (&mut edit.address, address),
                (&mut edit.symptoms, symptoms),
                (&mut edit.diagnosis, diagnosis),
                (&mut edit.notes, notes),
            ];
            for (field, value) in overrides {
                if let Some(value) = value {
                    *field = value;
                }
            }

            let visit = session.update_visit(&EditTarget::from(&record), &edit)?;
            println!("✅ Updated visit #{}", visit.id);
        }
        Command::DeleteVisit { id } => {
            session.delete_visit(id)?;
            println!("🗑️  Deleted visit #{}", id);
        }
        Command::List { page, search } => {
            let index = page.saturating_sub(1);
            let visits = match search.as_deref() {
                Some(query) => session.search_visits(query, index)?,
                None => session.list_visits(index)?,
            };
            print_page(&visits);
        }
        Command::Report { from, to } => {
            let report = fetch_report(session.store(), &ReportFilter { from, to })?;

            println!("📊 Visits: {}", report.total);
            for (title, tally) in [
                ("Diagnosis", &report.by_diagnosis),
                ("Nurse", &report.by_nurse),
                ("Patient", &report.by_patient),
            ] {
                println!("\n{}", title);
                println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                for (name, count) in tally {
                    println!("  {:<36} {:>5}", name, count);
                }
            }
        }
        Command::Ui => run_ui_mode(session)?,
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn prompt() -> Box<dyn Prompt> {
    Box::new(clinic_records::TerminalPrompt::new())
}

#[cfg(not(feature = "tui"))]
fn prompt() -> Box<dyn Prompt> {
    Box::new(clinic_records::NonInteractive)
}

fn report_resolution(noun: &str, resolved: &Resolved) {
    match resolved {
        Resolved::Created(id) => println!("✅ Created {} #{}", noun, id),
        Resolved::Matched { id, kind } => {
            println!("✓ Already on file as {} #{} ({:?} match)", noun, id, kind)
        }
        Resolved::ById(id) | Resolved::Kept(id) => println!("✓ Using {} #{}", noun, id),
    }
}

fn print_page(visits: &VisitPage) {
    println!(
        "🩺 Visits {} (page {}/{})",
        visits.total,
        visits.page + 1,
        visits.page_count().max(1)
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for record in &visits.rows {
        let visit = &record.visit;
        println!(
            "#{:<5} {:<11} {:<24} {:<22} {}",
            visit.id,
            visit.visit_date.format("%-m/%-d/%Y"),
            record
                .citizen_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", visit.citizen_id)),
            record
                .nurse_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", visit.nurse_id)),
            visit.diagnosis.as_deref().unwrap_or("-"),
        );
    }

    if visits.has_next() {
        println!("\n… more with --page {}", visits.page + 2);
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(session: ClinicSession<SqliteStore>) -> Result<()> {
    println!("🖥️  Loading Clinic Records UI...\n");

    let mut app = ui::App::new(session)?;
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_session: ClinicSession<SqliteStore>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the subcommands: clinic-records --help");
    std::process::exit(1);
}
