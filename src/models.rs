// 🩺 Clinic records - citizens, nurses and the visits that link them

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CITIZEN
// ============================================================================

/// A patient on file. Identity is the id; names are not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    #[serde(rename = "citizen_id")]
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub address: String,
}

/// Insert payload for a citizen (the store assigns the id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCitizen {
    pub name: String,
    pub age: u32,
    pub address: String,
}

/// Partial citizen update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitizenPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

// ============================================================================
// NURSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nurse {
    #[serde(rename = "nurse_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNurse {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

// ============================================================================
// VISIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    #[serde(rename = "visit_id")]
    pub id: i64,
    pub citizen_id: i64,
    pub nurse_id: i64,
    pub visit_date: NaiveDate,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Visit write payload, used for both insert and update.
/// Both references must already resolve to existing records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitPayload {
    pub citizen_id: i64,
    pub nurse_id: i64,
    pub visit_date: NaiveDate,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

/// Citizen columns embedded in a visit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitizenSummary {
    pub name: String,
    pub age: u32,
    pub address: String,
}

/// Nurse columns embedded in a visit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NurseSummary {
    pub name: String,
    #[serde(default)]
    pub specialization: Option<String>,
}

/// A visit joined with the citizen and nurse it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(flatten)]
    pub visit: Visit,
    #[serde(rename = "citizens", default)]
    pub citizen: Option<CitizenSummary>,
    #[serde(rename = "nurses", default)]
    pub nurse: Option<NurseSummary>,
}

impl VisitRecord {
    pub fn citizen_name(&self) -> Option<&str> {
        self.citizen.as_ref().map(|c| c.name.as_str())
    }

    pub fn nurse_name(&self) -> Option<&str> {
        self.nurse.as_ref().map(|n| n.name.as_str())
    }
}

/// Turn a form text field into an optional column value (blank → None)
pub fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visit_record_decodes_embedded_rows() {
        let value = json!({
            "visit_id": 3,
            "citizen_id": 5,
            "nurse_id": 9,
            "visit_date": "2024-03-01",
            "symptoms": "cough",
            "diagnosis": null,
            "notes": null,
            "created_at": "2024-03-01T08:30:00.000Z",
            "citizens": {"name": "Ana Reyes", "age": 30, "address": "Rizal St"},
            "nurses": {"name": "Juan Dela Cruz", "specialization": null}
        });

        let record: VisitRecord = serde_json::from_value(value).unwrap();

        assert_eq!(record.visit.id, 3);
        assert_eq!(record.visit.visit_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(record.visit.symptoms.as_deref(), Some("cough"));
        assert_eq!(record.citizen_name(), Some("Ana Reyes"));
        assert_eq!(record.nurse_name(), Some("Juan Dela Cruz"));
    }

    #[test]
    fn test_citizen_patch_skips_unset_fields() {
        let patch = CitizenPatch {
            address: Some("Rizal St".to_string()),
            ..Default::default()
        };

        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"address": "Rizal St"}));
        assert_eq!(serde_json::to_value(CitizenPatch::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  "), None);
        assert_eq!(non_blank("fever"), Some("fever".to_string()));
    }
}
