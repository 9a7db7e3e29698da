// 📊 Reports - visit tallies over an optional date window

use crate::cache::decode_rows;
use crate::error::Result;
use crate::models::VisitRecord;
use crate::store::{Filter, Query, RecordStore, Table};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Inclusive lower bound on visit date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on visit date
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total: usize,
    pub by_diagnosis: Vec<(String, usize)>,
    pub by_nurse: Vec<(String, usize)>,
    pub by_patient: Vec<(String, usize)>,
}

impl Report {
    /// Tally records in the order given; each key keeps its first-seen position
    pub fn from_records(records: &[VisitRecord]) -> Self {
        let mut report = Report {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            let diagnosis = record
                .visit
                .diagnosis
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or("Unspecified");
            bump(&mut report.by_diagnosis, diagnosis);

            let nurse = record
                .nurse_name()
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", record.visit.nurse_id));
            bump(&mut report.by_nurse, &nurse);

            let patient = record
                .citizen_name()
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", record.visit.citizen_id));
            bump(&mut report.by_patient, &patient);
        }

        report
    }
}

fn bump(tally: &mut Vec<(String, usize)>, key: &str) {
    match tally.iter_mut().find(|(k, _)| k.as_str() == key) {
        Some((_, n)) => *n += 1,
        None => tally.push((key.to_string(), 1)),
    }
}

/// Visits within the window, newest first, tallied
pub fn fetch_report<S: RecordStore + ?Sized>(store: &S, filter: &ReportFilter) -> Result<Report> {
    let mut query = Query::from(Table::MedicalVisits)
        .embed(Table::Citizens, &["name", "age", "address"])
        .embed(Table::Nurses, &["name", "specialization"])
        .order("visit_date", false);

    if let Some(from) = filter.from {
        query = query.filter(Filter::gte("visit_date", from.to_string()));
    }
    if let Some(to) = filter.to {
        query = query.filter(Filter::lte("visit_date", to.to_string()));
    }

    let selection = store.select(&query)?;
    let records: Vec<VisitRecord> = decode_rows(Table::MedicalVisits, selection.rows)?;

    tracing::debug!(visits = records.len(), ?filter, "report fetched");
    Ok(Report::from_records(&records))
}

/// Number of citizens on file
pub fn total_patients<S: RecordStore + ?Sized>(store: &S) -> Result<usize> {
    Ok(store.count(Table::Citizens, &[])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use serde_json::json;

    fn seed() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = |v: serde_json::Value| {
            v.as_array()
                .unwrap()
                .iter()
                .map(|r| r.as_object().cloned().unwrap())
                .collect::<Vec<_>>()
        };

        store
            .insert(
                Table::Citizens,
                rows(json!([
                    {"citizen_id": 1, "name": "Ana Reyes", "age": 30, "address": "Rizal St"},
                    {"citizen_id": 2, "name": "Ben Santos", "age": 44, "address": "Mabini St"}
                ])),
            )
            .unwrap();
        store
            .insert(
                Table::Nurses,
                rows(json!([{"nurse_id": 9, "name": "Juan Dela Cruz"}])),
            )
            .unwrap();
        store
            .insert(
                Table::MedicalVisits,
                rows(json!([
                    {"citizen_id": 1, "nurse_id": 9, "visit_date": "2024-01-10", "diagnosis": "Flu"},
                    {"citizen_id": 2, "nurse_id": 9, "visit_date": "2024-02-10", "diagnosis": null},
                    {"citizen_id": 1, "nurse_id": 9, "visit_date": "2024-03-10", "diagnosis": "Flu"}
                ])),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_report_tallies_first_seen_order() {
        let store = seed();
        let report = fetch_report(&store, &ReportFilter::default()).unwrap();

        assert_eq!(report.total, 3);
        // Newest first: Flu (Mar), Unspecified (Feb), Flu (Jan)
        assert_eq!(
            report.by_diagnosis,
            vec![("Flu".to_string(), 2), ("Unspecified".to_string(), 1)]
        );
        assert_eq!(report.by_nurse, vec![("Juan Dela Cruz".to_string(), 3)]);
        assert_eq!(
            report.by_patient,
            vec![("Ana Reyes".to_string(), 2), ("Ben Santos".to_string(), 1)]
        );
    }

    #[test]
    fn test_report_date_window_is_inclusive() {
        let store = seed();
        let filter = ReportFilter {
            from: NaiveDate::from_ymd_opt(2024, 2, 10),
            to: NaiveDate::from_ymd_opt(2024, 3, 10),
        };

        let report = fetch_report(&store, &filter).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.by_patient[0].0, "Ana Reyes");
    }

    #[test]
    fn test_missing_names_fall_back_to_ids() {
        let store = seed();
        let selection = store
            .select(&Query::from(Table::MedicalVisits).order("visit_date", true))
            .unwrap();
        let records: Vec<VisitRecord> = decode_rows(Table::MedicalVisits, selection.rows).unwrap();

        let report = Report::from_records(&records);

        assert_eq!(report.by_nurse, vec![("#9".to_string(), 3)]);
        assert_eq!(report.by_patient[0], ("#1".to_string(), 2));
    }

    #[test]
    fn test_blank_names_fall_back_to_ids() {
        let store = seed();
        let query = Query::from(Table::MedicalVisits)
            .embed(Table::Citizens, &["name", "age", "address"])
            .embed(Table::Nurses, &["name", "specialization"])
            .order("visit_date", true);
        let selection = store.select(&query).unwrap();
        let mut records: Vec<VisitRecord> =
            decode_rows(Table::MedicalVisits, selection.rows).unwrap();
        for record in &mut records {
            if let Some(nurse) = record.nurse.as_mut() {
                nurse.name = String::new();
            }
            if let Some(citizen) = record.citizen.as_mut() {
                citizen.name = "  ".to_string();
            }
        }

        let report = Report::from_records(&records);

        assert_eq!(report.by_nurse, vec![("#9".to_string(), 3)]);
        assert_eq!(
            report.by_patient,
            vec![("#1".to_string(), 2), ("#2".to_string(), 1)]
        );
    }

    #[test]
    fn test_total_patients() {
        assert_eq!(total_patients(&seed()).unwrap(), 2);
        assert_eq!(total_patients(&SqliteStore::open_in_memory().unwrap()).unwrap(), 0);
    }
}
