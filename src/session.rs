// 🏥 Clinic Session - the visit forms, wired to the resolver and the store
//
// Owns the record store and the reference cache. Every write that needs a
// citizen or nurse resolves it first, so a visit is only ever written with
// ids that came out of the resolver.

use crate::cache::{decode_rows, ReferenceCache};
use crate::error::{ClinicError, Result};
use crate::models::{
    non_blank, Citizen, CitizenPatch, NewCitizen, NewNurse, Nurse, Visit, VisitPayload,
    VisitRecord,
};
use crate::prompt::Prompt;
use crate::resolver::{self, EntityKind, Identifier, Resolved};
use crate::search::VisitSearch;
use crate::store::{to_row, Filter, Query, RecordStore, StoreError, Table};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

/// Rows fetched before an in-memory search is applied
pub const SEARCH_WINDOW: usize = 1000;

pub const DEFAULT_PAGE_SIZE: usize = 8;

// ============================================================================
// FORMS
// ============================================================================

/// New-visit form, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitDraft {
    pub citizen: String,
    pub nurse: String,
    pub visit_date: String,
    pub age: String,
    pub address: String,
    pub symptoms: String,
    pub diagnosis: String,
    pub notes: String,
}

/// A draft that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub citizen: Identifier,
    pub nurse: Identifier,
    pub visit_date: NaiveDate,
    pub age: u32,
    pub address: String,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

impl VisitDraft {
    /// Fill age and address when the typed citizen name is exactly a known citizen
    pub fn autofill(&mut self, cache: &ReferenceCache) -> bool {
        match cache.citizen_named(&self.citizen) {
            Some(citizen) => {
                self.age = citizen.age.to_string();
                self.address = citizen.address.clone();
                true
            }
            None => false,
        }
    }

    /// Check every field, in form order, before anything touches the store
    pub fn validate(&self) -> Result<ValidDraft> {
        let (citizen, nurse) = match (Identifier::parse(&self.citizen), Identifier::parse(&self.nurse)) {
            (Some(citizen), Some(nurse)) => (citizen, nurse),
            _ => return Err(ClinicError::MissingField("a citizen and nurse")),
        };

        if self.visit_date.trim().is_empty() {
            return Err(ClinicError::MissingField("a visit date"));
        }
        let visit_date = parse_date(&self.visit_date)?;

        if self.age.trim().is_empty() {
            return Err(ClinicError::MissingField("an age"));
        }
        let age = parse_age(&self.age)?;

        if self.address.trim().is_empty() {
            return Err(ClinicError::MissingField("an address"));
        }

        Ok(ValidDraft {
            citizen,
            nurse,
            visit_date,
            age,
            address: self.address.trim().to_string(),
            symptoms: non_blank(&self.symptoms),
            diagnosis: non_blank(&self.diagnosis),
            notes: non_blank(&self.notes),
        })
    }
}

/// The visit being edited, and the ids it referenced when the form opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTarget {
    pub visit_id: i64,
    pub citizen_id: i64,
    pub nurse_id: i64,
}

impl From<&VisitRecord> for EditTarget {
    fn from(record: &VisitRecord) -> Self {
        EditTarget {
            visit_id: record.visit.id,
            citizen_id: record.visit.citizen_id,
            nurse_id: record.visit.nurse_id,
        }
    }
}

/// Edit-visit form, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitEdit {
    pub citizen: String,
    pub nurse: String,
    pub visit_date: String,
    pub age: String,
    pub address: String,
    pub symptoms: String,
    pub diagnosis: String,
    pub notes: String,
}

impl VisitEdit {
    /// Open the edit form on an existing visit.
    ///
    /// Names come from the embedded rows, then the cache, then the raw id.
    pub fn prefill(record: &VisitRecord, cache: &ReferenceCache) -> Self {
        let visit = &record.visit;
        let cached_citizen = cache.citizen(visit.citizen_id);

        let citizen = record
            .citizen_name()
            .map(str::to_string)
            .or_else(|| cached_citizen.map(|c| c.name.clone()))
            .unwrap_or_else(|| visit.citizen_id.to_string());

        let nurse = record
            .nurse_name()
            .map(str::to_string)
            .or_else(|| cache.nurse(visit.nurse_id).map(|n| n.name.clone()))
            .unwrap_or_else(|| visit.nurse_id.to_string());

        let (age, address) = match (&record.citizen, cached_citizen) {
            (Some(embedded), _) => (embedded.age.to_string(), embedded.address.clone()),
            (None, Some(cached)) => (cached.age.to_string(), cached.address.clone()),
            (None, None) => (String::new(), String::new()),
        };

        VisitEdit {
            citizen,
            nurse,
            visit_date: visit.visit_date.format("%Y-%m-%d").to_string(),
            age,
            address,
            symptoms: visit.symptoms.clone().unwrap_or_default(),
            diagnosis: visit.diagnosis.clone().unwrap_or_default(),
            notes: visit.notes.clone().unwrap_or_default(),
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ClinicError::InvalidDate(raw.trim().to_string()))
}

fn parse_age(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ClinicError::InvalidAge(raw.trim().to_string()))
}

// ============================================================================
// PAGES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct VisitPage {
    pub rows: Vec<VisitRecord>,
    /// Zero-based page index
    pub page: usize,
    pub page_size: usize,
    /// Rows across every page
    pub total: usize,
}

impl VisitPage {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        (self.page + 1) * self.page_size < self.total
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size.max(1))
    }

    /// Page to show once a row on this page has been deleted
    pub fn page_after_delete(&self) -> usize {
        if self.rows.len() == 1 && self.page > 0 {
            self.page - 1
        } else {
            self.page
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct ClinicSession<S: RecordStore> {
    store: S,
    cache: ReferenceCache,
    page_size: usize,
}

impl<S: RecordStore> ClinicSession<S> {
    /// Wrap a store and load the citizen and nurse lists
    pub fn open(store: S, page_size: usize) -> Result<Self> {
        let cache = ReferenceCache::load(&store)?;
        Ok(ClinicSession {
            store,
            cache,
            page_size: page_size.max(1),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Store and cache borrowed together, for bulk loaders
    pub(crate) fn parts_mut(&mut self) -> (&S, &mut ReferenceCache) {
        (&self.store, &mut self.cache)
    }

    pub fn refresh_references(&mut self) -> Result<()> {
        self.cache = ReferenceCache::load(&self.store)?;
        Ok(())
    }

    /// Save a new visit, creating its citizen or nurse on confirmation
    pub fn create_visit<P: Prompt + ?Sized>(
        &mut self,
        draft: &VisitDraft,
        prompt: &mut P,
    ) -> Result<Visit> {
        let valid = draft.validate()?;
        let store = &self.store;

        let citizen = resolver::resolve_or_create(
            &valid.citizen,
            self.cache.citizens_mut(),
            EntityKind::Citizen,
            prompt,
            |name, prompt| {
                collect_new_citizen(store, name, Some(valid.age), Some(&valid.address), prompt)
            },
        )?;

        let nurse = resolver::resolve_or_create(
            &valid.nurse,
            self.cache.nurses_mut(),
            EntityKind::Nurse,
            prompt,
            |name, _| insert_nurse(store, name, None),
        )?;

        let payload = VisitPayload {
            citizen_id: citizen.id(),
            nurse_id: nurse.id(),
            visit_date: valid.visit_date,
            symptoms: valid.symptoms,
            diagnosis: valid.diagnosis,
            notes: valid.notes,
        };

        let visit: Visit = insert_one(&self.store, Table::MedicalVisits, &payload)?;
        info!(
            visit_id = visit.id,
            citizen_id = visit.citizen_id,
            nurse_id = visit.nurse_id,
            "visit created"
        );
        Ok(visit)
    }

    /// Resolve a citizen by name, creating it on confirmation.
    /// Missing age or address is asked for.
    pub fn register_citizen<P: Prompt + ?Sized>(
        &mut self,
        name: &str,
        age: Option<u32>,
        address: Option<&str>,
        prompt: &mut P,
    ) -> Result<Resolved> {
        let identifier = Identifier::parse(name).ok_or(ClinicError::MissingField("a citizen name"))?;
        let store = &self.store;

        resolver::resolve_or_create(
            &identifier,
            self.cache.citizens_mut(),
            EntityKind::Citizen,
            prompt,
            |name, prompt| collect_new_citizen(store, name, age, address, prompt),
        )
    }

    pub fn register_nurse<P: Prompt + ?Sized>(
        &mut self,
        name: &str,
        specialization: Option<&str>,
        prompt: &mut P,
    ) -> Result<Resolved> {
        let identifier = Identifier::parse(name).ok_or(ClinicError::MissingField("a nurse name"))?;
        let store = &self.store;

        resolver::resolve_or_create(
            &identifier,
            self.cache.nurses_mut(),
            EntityKind::Nurse,
            prompt,
            |name, _| insert_nurse(store, name, specialization),
        )
    }

    /// Save an edited visit.
    ///
    /// Never creates. The citizen row is updated first (address, age, and a
    /// rename when the typed name matched nobody), then the visit. A failed
    /// visit update leaves the citizen update in place.
    pub fn update_visit(&mut self, target: &EditTarget, edit: &VisitEdit) -> Result<Visit> {
        if edit.visit_date.trim().is_empty() {
            return Err(ClinicError::Required("Visit date"));
        }
        let visit_date = parse_date(&edit.visit_date)?;

        if edit.address.trim().is_empty() {
            return Err(ClinicError::Required("Address"));
        }
        let age = match edit.age.trim() {
            "" => None,
            raw => Some(parse_age(raw)?),
        };

        let citizen_identifier = Identifier::parse(&edit.citizen);
        let citizen = resolver::resolve_for_edit(
            citizen_identifier.as_ref(),
            self.cache.citizens(),
            EntityKind::Citizen,
            Some(target.citizen_id),
        )?;
        let nurse = resolver::resolve_for_edit(
            Identifier::parse(&edit.nurse).as_ref(),
            self.cache.nurses(),
            EntityKind::Nurse,
            Some(target.nurse_id),
        )?;

        let mut patch = CitizenPatch {
            address: Some(edit.address.trim().to_string()),
            age,
            ..Default::default()
        };
        if let (Resolved::Kept(_), Some(Identifier::Name(typed))) = (citizen, &citizen_identifier) {
            if self.cache.citizen_named(typed).is_none() {
                info!(citizen_id = citizen.id(), new_name = %typed, "renaming citizen");
                patch.name = Some(typed.clone());
            }
        }

        let updated = self.store.update(
            Table::Citizens,
            to_row(&patch)?,
            &[Filter::eq("citizen_id", citizen.id())],
        )?;
        match decode_rows::<Citizen>(Table::Citizens, updated)?.into_iter().next() {
            Some(row) => self.cache.merge_citizen(row),
            None => warn!(citizen_id = citizen.id(), "citizen update matched no row"),
        }

        let payload = VisitPayload {
            citizen_id: citizen.id(),
            nurse_id: nurse.id(),
            visit_date,
            symptoms: non_blank(&edit.symptoms),
            diagnosis: non_blank(&edit.diagnosis),
            notes: non_blank(&edit.notes),
        };

        let rows = self.store.update(
            Table::MedicalVisits,
            to_row(&payload)?,
            &[Filter::eq("visit_id", target.visit_id)],
        )?;
        let visit = decode_rows::<Visit>(Table::MedicalVisits, rows)?
            .into_iter()
            .next()
            .ok_or(ClinicError::VisitNotFound(target.visit_id))?;

        info!(visit_id = visit.id, "visit updated");
        Ok(visit)
    }

    pub fn delete_visit(&mut self, visit_id: i64) -> Result<()> {
        let filters = [Filter::eq("visit_id", visit_id)];
        if self.store.count(Table::MedicalVisits, &filters)? == 0 {
            return Err(ClinicError::VisitNotFound(visit_id));
        }

        self.store.delete(Table::MedicalVisits, &filters)?;
        info!(visit_id, "visit deleted");
        Ok(())
    }

    /// A single visit with its citizen and nurse embedded
    pub fn visit(&self, visit_id: i64) -> Result<VisitRecord> {
        let selection = self.store.select(&visits_query().eq("visit_id", visit_id))?;
        decode_rows(Table::MedicalVisits, selection.rows)?
            .into_iter()
            .next()
            .ok_or(ClinicError::VisitNotFound(visit_id))
    }

    /// One page of visits, newest first
    pub fn list_visits(&self, page: usize) -> Result<VisitPage> {
        let Some((start, end)) = self.page_bounds(page) else {
            let total = self.store.count(Table::MedicalVisits, &[])?;
            debug!(page, total, "page out of range");
            return Ok(VisitPage {
                rows: Vec::new(),
                page,
                page_size: self.page_size,
                total,
            });
        };

        let selection = self
            .store
            .select(&visits_query().range(start, end).with_count())?;

        let rows = decode_rows(Table::MedicalVisits, selection.rows)?;
        let total = selection.count.unwrap_or(0);

        debug!(page, total, "listed visits");
        Ok(VisitPage {
            rows,
            page,
            page_size: self.page_size,
            total,
        })
    }

    /// One page of the visits matching a free-text query.
    ///
    /// Only the newest rows up to the search window are searched.
    pub fn search_visits(&self, query: &str, page: usize) -> Result<VisitPage> {
        let search = VisitSearch::parse(query);
        if search.is_empty() {
            return self.list_visits(page);
        }

        let selection = self
            .store
            .select(&visits_query().range(0, SEARCH_WINDOW))?;
        let records: Vec<VisitRecord> = decode_rows(Table::MedicalVisits, selection.rows)?;

        let matched = search.filter(records);
        let total = matched.len();
        let rows = match self.page_bounds(page) {
            Some((start, _)) => matched.into_iter().skip(start).take(self.page_size).collect(),
            None => Vec::new(),
        };

        debug!(%query, page, total, "searched visits");
        Ok(VisitPage {
            rows,
            page,
            page_size: self.page_size,
            total,
        })
    }

    /// Inclusive row range of a page. `None` when it lies beyond any
    /// offset the store can address.
    fn page_bounds(&self, page: usize) -> Option<(usize, usize)> {
        let start = page.checked_mul(self.page_size)?;
        let end = start.checked_add(self.page_size - 1)?;
        (end <= i64::MAX as usize).then_some((start, end))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn visits_query() -> Query {
    Query::from(Table::MedicalVisits)
        .embed(Table::Citizens, &["name", "age", "address"])
        .embed(Table::Nurses, &["name", "specialization"])
        .order("visit_date", false)
        .order("created_at", false)
}

/// Insert a single row and decode what the store hands back
pub(crate) fn insert_one<S, T, R>(store: &S, table: Table, value: &T) -> Result<R>
where
    S: RecordStore + ?Sized,
    T: Serialize,
    R: DeserializeOwned,
{
    let rows = store.insert(table, vec![to_row(value)?])?;
    decode_rows(table, rows)?
        .into_iter()
        .next()
        .ok_or(ClinicError::Store(StoreError::NothingInserted(table)))
}

fn insert_nurse<S: RecordStore + ?Sized>(
    store: &S,
    name: &str,
    specialization: Option<&str>,
) -> Result<Nurse> {
    let nurse = NewNurse {
        name: name.to_string(),
        specialization: specialization.and_then(non_blank),
    };
    insert_one(store, Table::Nurses, &nurse)
}

/// Gather a new citizen's fields and insert it.
///
/// Only fields not already supplied are asked for. A cancelled prompt, an
/// invalid age or an empty address aborts before the insert.
pub fn collect_new_citizen<S, P>(
    store: &S,
    name: &str,
    age: Option<u32>,
    address: Option<&str>,
    prompt: &mut P,
) -> Result<Citizen>
where
    S: RecordStore + ?Sized,
    P: Prompt + ?Sized,
{
    let cancelled = || ClinicError::Cancelled {
        kind: EntityKind::Citizen,
        name: name.to_string(),
    };

    let age = match age {
        Some(age) => age,
        None => {
            let raw = prompt
                .prompt_text(&format!("Enter age for new citizen {}:", name))
                .ok_or_else(cancelled)?;
            parse_age(&raw)?
        }
    };

    let address = match address {
        Some(address) => address.to_string(),
        None => prompt
            .prompt_text(&format!("Enter address for new citizen {}:", name))
            .ok_or_else(cancelled)?,
    };
    if address.trim().is_empty() {
        return Err(ClinicError::Required("Address"));
    }

    let citizen = NewCitizen {
        name: name.to_string(),
        age,
        address: address.trim().to_string(),
    };
    insert_one(store, Table::Citizens, &citizen)
}

// ============================================================================
// TESTS
// ============================================================================
