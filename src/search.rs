// 🔎 Visit Search - free-text filter over loaded visit rows
//
// "fever 30 rizal" → visits where a field mentions fever, the citizen is 30,
// and some field mentions rizal. Every token must hit.

use crate::models::VisitRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    /// All-digit token: compared against the citizen's age as written
    Age(String),
    /// Anything else: substring of one of the text fields
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitSearch {
    terms: Vec<Term>,
}

impl VisitSearch {
    pub fn parse(query: &str) -> Self {
        let terms = query
            .to_lowercase()
            .split_whitespace()
            .map(|token| {
                if token.chars().all(|c| c.is_ascii_digit()) {
                    Term::Age(token.to_string())
                } else {
                    Term::Text(token.to_string())
                }
            })
            .collect();

        VisitSearch { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, record: &VisitRecord) -> bool {
        if self.terms.is_empty() {
            return true;
        }

        let haystack = searchable_fields(record);
        let age = record.citizen.as_ref().map(|c| c.age.to_string());

        self.terms.iter().all(|term| match term {
            Term::Age(wanted) => age.as_deref() == Some(wanted.as_str()),
            Term::Text(needle) => haystack.iter().any(|field| field.contains(needle.as_str())),
        })
    }

    /// Keep the matching records, in order
    pub fn filter(&self, records: Vec<VisitRecord>) -> Vec<VisitRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn searchable_fields(record: &VisitRecord) -> Vec<String> {
    let visit = &record.visit;
    let mut fields = vec![
        visit.visit_date.format("%Y-%m-%d").to_string(),
        visit.visit_date.format("%-m/%-d/%Y").to_string(),
    ];

    let optional = [
        record.citizen_name(),
        record.nurse_name(),
        visit.symptoms.as_deref(),
        visit.diagnosis.as_deref(),
        record.citizen.as_ref().map(|c| c.address.as_str()),
        visit.notes.as_deref(),
    ];
    fields.extend(optional.into_iter().flatten().map(str::to_lowercase));

    fields
}
