// Clinic Records - Core Library
// Exposes all modules for use in the CLI, the stats server, and tests

pub mod normalize;  // Name normalization for matching
pub mod error;
pub mod models;     // Citizens, nurses, visits
pub mod store;      // Record Store query interface + SQLite backend
pub mod prompt;     // Prompt Surface
pub mod resolver;   // Entity Resolver
pub mod cache;      // Reference cache of citizens and nurses
pub mod search;
pub mod session;    // Visit forms: create / edit / delete / list
pub mod reports;
pub mod import;     // CSV bulk load
pub mod config;

// Re-export commonly used types
pub use error::{ClinicError, Result};
pub use models::{
    Citizen, CitizenPatch, CitizenSummary, NewCitizen, NewNurse, Nurse, NurseSummary, Visit,
    VisitPayload, VisitRecord,
};
pub use store::{
    Filter, Query, RecordStore, Row, Selection, SqliteStore, StoreError, Table,
};
pub use prompt::{NonInteractive, Prompt, ScriptedPrompt};
#[cfg(feature = "tui")]
pub use prompt::TerminalPrompt;
pub use resolver::{
    find_match, lookup, resolve_for_edit, resolve_or_create,
    Candidate, EntityKind, Identifier, MatchKind, ResolveMode, Resolved,
};
pub use cache::ReferenceCache;
pub use search::VisitSearch;
pub use session::{
    collect_new_citizen, ClinicSession, EditTarget, ValidDraft, VisitDraft, VisitEdit, VisitPage,
    DEFAULT_PAGE_SIZE,
};
pub use reports::{fetch_report, total_patients, Report, ReportFilter};
pub use import::ImportSummary;
pub use config::{init_tracing, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
