// 📥 CSV Import - bulk load citizens and nurses
//
// citizens.csv: name,age,address
// nurses.csv:   name,specialization
//
// A row whose normalized name already exists (on file or earlier in the same
// file) is skipped rather than duplicated.

use crate::cache::ReferenceCache;
use crate::models::{non_blank, Citizen, NewCitizen, NewNurse, Nurse};
use crate::normalize::normalize;
use crate::session::{insert_one, ClinicSession};
use crate::store::{RecordStore, Table};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct CitizenRow {
    name: String,
    age: u32,
    address: String,
}

#[derive(Debug, Deserialize)]
struct NurseRow {
    name: String,
    #[serde(default)]
    specialization: Option<String>,
}

impl<S: RecordStore> ClinicSession<S> {
    pub fn import_citizens(&mut self, path: &Path) -> Result<ImportSummary> {
        let file = open(path)?;
        let (store, cache) = self.parts_mut();
        import_citizens_from(store, cache, file, &source_name(path))
    }

    pub fn import_nurses(&mut self, path: &Path) -> Result<ImportSummary> {
        let file = open(path)?;
        let (store, cache) = self.parts_mut();
        import_nurses_from(store, cache, file, &source_name(path))
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.csv")
        .to_string()
}

fn known(names: impl Iterator<Item = String>) -> Vec<String> {
    names.map(|n| normalize(&n)).filter(|n| !n.is_empty()).collect()
}

pub fn import_citizens_from<S, R>(
    store: &S,
    cache: &mut ReferenceCache,
    reader: R,
    source: &str,
) -> Result<ImportSummary>
where
    S: RecordStore + ?Sized,
    R: Read,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen = known(cache.citizens().iter().map(|c| c.name.clone()));
    let mut summary = ImportSummary::default();

    for (line_num, result) in reader.deserialize::<CitizenRow>().enumerate() {
        let row = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", line_num + 2, source)
        })?;

        let key = normalize(&row.name);
        if key.is_empty() || seen.contains(&key) {
            debug!(name = %row.name, "skipping existing citizen");
            summary.skipped += 1;
            continue;
        }

        let new = NewCitizen {
            name: row.name,
            age: row.age,
            address: row.address,
        };
        let citizen: Citizen = insert_one(store, Table::Citizens, &new)
            .with_context(|| format!("Failed to insert citizen from line {}", line_num + 2))?;

        seen.push(key);
        cache.citizens_mut().push(citizen);
        summary.inserted += 1;
    }

    info!(source, inserted = summary.inserted, skipped = summary.skipped, "imported citizens");
    Ok(summary)
}

pub fn import_nurses_from<S, R>(
    store: &S,
    cache: &mut ReferenceCache,
    reader: R,
    source: &str,
) -> Result<ImportSummary>
where
    S: RecordStore + ?Sized,
    R: Read,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen = known(cache.nurses().iter().map(|n| n.name.clone()));
    let mut summary = ImportSummary::default();

    for (line_num, result) in reader.deserialize::<NurseRow>().enumerate() {
        let row = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", line_num + 2, source)
        })?;

        let key = normalize(&row.name);
        if key.is_empty() || seen.contains(&key) {
            debug!(name = %row.name, "skipping existing nurse");
            summary.skipped += 1;
            continue;
        }

        let new = NewNurse {
            name: row.name,
            specialization: row.specialization.as_deref().and_then(non_blank),
        };
        let nurse: Nurse = insert_one(store, Table::Nurses, &new)
            .with_context(|| format!("Failed to insert nurse from line {}", line_num + 2))?;

        seen.push(key);
        cache.nurses_mut().push(nurse);
        summary.inserted += 1;
    }

    info!(source, inserted = summary.inserted, skipped = summary.skipped, "imported nurses");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn session() -> ClinicSession<SqliteStore> {
        ClinicSession::open(SqliteStore::open_in_memory().unwrap(), 8).unwrap()
    }

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_import_citizens_skips_known_names() {
        let mut session = session();
        let file = csv_file(
            "name,age,address\n\
             Ana Reyes,30,Rizal St\n\
             Ben Santos,44,Mabini St\n\
             ANA REYES Jr.,31,Rizal St\n",
        );

        let summary = session.import_citizens(file.path()).unwrap();
        assert_eq!(summary, ImportSummary { inserted: 2, skipped: 1 });
        assert_eq!(session.cache().citizens().len(), 2);

        // Importing again inserts nothing
        let again = session.import_citizens(file.path()).unwrap();
        assert_eq!(again, ImportSummary { inserted: 0, skipped: 3 });
        assert_eq!(session.store().count(Table::Citizens, &[]).unwrap(), 2);
    }

    #[test]
    fn test_import_nurses_blank_specialization() {
        let mut session = session();
        let file = csv_file("name,specialization\nJuan Dela Cruz,\nLiza Soberano,Pediatrics\n");

        let summary = session.import_nurses(file.path()).unwrap();

        assert_eq!(summary.inserted, 2);
        let specs: Vec<Option<&str>> = session
            .cache()
            .nurses()
            .iter()
            .map(|n| n.specialization.as_deref())
            .collect();
        assert_eq!(specs, vec![None, Some("Pediatrics")]);
    }

    #[test]
    fn test_bad_row_reports_line() {
        let mut session = session();
        let file = csv_file("name,age,address\nAna Reyes,thirty,Rizal St\n");

        let err = session.import_citizens(file.path()).unwrap_err();

        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_missing_file() {
        let mut session = session();
        let err = session
            .import_nurses(Path::new("/nonexistent/nurses.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
