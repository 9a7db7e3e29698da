// 🔍 Entity Resolver - typed names → canonical record ids
//
// Problem solved:
// - "ana reyes", "Ana Reyes", "ANA REYES JR." → the same citizen id
// - "dela cruz" → nurse "Juan Dela Cruz" without creating a duplicate
// - A name nobody knows → confirm with the user, then create exactly once
//
// Matching chain (first stage that finds a candidate wins):
// 1. Numeric input → trusted as an id, no matching at all
// 2. Exact match on normalized names
// 3. Token subset: every query token appears in the candidate name
// 4. Substring either way (create flow only)
// 5. Surname: last query token is one of the name's tokens (create flow, nurses only)

use crate::error::{ClinicError, Result};
use crate::models::{Citizen, Nurse};
use crate::normalize::normalize;
use crate::prompt::Prompt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// IDENTIFIER
// ============================================================================

/// What the user typed into a citizen or nurse field.
///
/// Anything that parses entirely as an integer is an id. This is fixed
/// policy: a citizen literally named "2" cannot be looked up by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Id(i64),
    Name(String),
}

impl Identifier {
    /// Parse raw field text. Blank input is no identifier at all.
    pub fn parse(raw: &str) -> Option<Identifier> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match trimmed.parse::<i64>() {
            Ok(id) => Some(Identifier::Id(id)),
            Err(_) => Some(Identifier::Name(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{}", id),
            Identifier::Name(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// CANDIDATES
// ============================================================================

/// A record the resolver can match a name against
pub trait Candidate {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

impl Candidate for Citizen {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Candidate for Nurse {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Citizen,
    Nurse,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Citizen => "Citizen",
            EntityKind::Nurse => "Nurse",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            EntityKind::Citizen => "citizen",
            EntityKind::Nurse => "nurse",
        }
    }

    /// Nurses are often named by surname alone ("Nurse Cruz")
    fn allows_surname_match(&self) -> bool {
        matches!(self, EntityKind::Nurse)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which form the resolution runs for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// New-visit form: may create records, uses the full fallback chain
    Create,
    /// Edit-visit form: never creates, falls back to the previous id
    Edit,
}

// ============================================================================
// MATCHING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    Exact,
    TokenSubset,
    Substring,
    Surname,
}

/// How an identifier ended up as an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// Numeric input taken as the id without checking it exists
    ById(i64),
    /// Matched an existing candidate by name
    Matched { id: i64, kind: MatchKind },
    /// Created after the user confirmed
    Created(i64),
    /// Edit flow: nothing matched, kept the visit's previous id
    Kept(i64),
}

impl Resolved {
    pub fn id(&self) -> i64 {
        match self {
            Resolved::ById(id) | Resolved::Created(id) | Resolved::Kept(id) => *id,
            Resolved::Matched { id, .. } => *id,
        }
    }
}

/// Find the candidate a typed name refers to.
///
/// Pure: looks only at the query and the candidates. Candidates whose name
/// normalizes to nothing never match. Within a stage the first candidate in
/// list order wins.
pub fn find_match<C: Candidate>(
    query: &str,
    candidates: &[C],
    kind: EntityKind,
    mode: ResolveMode,
) -> Option<(i64, MatchKind)> {
    find_match_preferring(query, candidates, kind, mode, None)
}

/// `find_match`, except that within a stage `preferred` wins over earlier
/// candidates when it matches at that stage too. Names are not unique.
fn find_match_preferring<C: Candidate>(
    query: &str,
    candidates: &[C],
    kind: EntityKind,
    mode: ResolveMode,
    preferred: Option<i64>,
) -> Option<(i64, MatchKind)> {
    let target = normalize(query);
    if target.is_empty() {
        return None;
    }

    let normalized: Vec<(i64, String)> = candidates
        .iter()
        .map(|c| (c.id(), normalize(c.name())))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    let pick = |accepts: &dyn Fn(&str) -> bool| -> Option<i64> {
        preferred
            .and_then(|p| normalized.iter().find(|(id, name)| *id == p && accepts(name)))
            .or_else(|| normalized.iter().find(|(_, name)| accepts(name)))
            .map(|(id, _)| *id)
    };

    // Stage 1: exact
    if let Some(id) = pick(&|name: &str| name == target) {
        return Some((id, MatchKind::Exact));
    }

    // Stage 2: every query token inside the candidate name
    let query_tokens: Vec<&str> = target.split(' ').collect();
    if let Some(id) = pick(&|name: &str| query_tokens.iter().all(|t| name.contains(t))) {
        return Some((id, MatchKind::TokenSubset));
    }

    if mode == ResolveMode::Edit {
        return None;
    }

    // Stage 3: containment either way
    let contains_either = |name: &str| name.contains(target.as_str()) || target.contains(name);
    if let Some(id) = pick(&contains_either) {
        return Some((id, MatchKind::Substring));
    }

    // Stage 4: surname
    if kind.allows_surname_match() && query_tokens.len() > 1 {
        let last = query_tokens[query_tokens.len() - 1];
        if let Some(id) = pick(&|name: &str| name.split(' ').any(|t| t == last)) {
            return Some((id, MatchKind::Surname));
        }
    }

    None
}

/// Resolve without side effects: numeric ids pass straight through,
/// names go through `find_match`. `None` means nothing matched.
pub fn lookup<C: Candidate>(
    identifier: &Identifier,
    candidates: &[C],
    kind: EntityKind,
    mode: ResolveMode,
) -> Option<Resolved> {
    match identifier {
        Identifier::Id(id) => Some(Resolved::ById(*id)),
        Identifier::Name(name) => {
            let found = find_match(name, candidates, kind, mode);
            if let Some((id, match_kind)) = found {
                debug!(%kind, %name, id, ?match_kind, "resolved by name");
            }
            found.map(|(id, match_kind)| Resolved::Matched {
                id,
                kind: match_kind,
            })
        }
    }
}

// ============================================================================
// FLOWS
// ============================================================================

/// Create flow: resolve the identifier, or create a new record.
///
/// On a miss the user is asked to confirm creation. Declining aborts with
/// `ClinicError::Cancelled` and `create` is never called. On confirmation
/// `create` builds and stores the record (it may prompt for missing fields)
/// and the result is appended to `references` straight away.
pub fn resolve_or_create<C, P, F>(
    identifier: &Identifier,
    references: &mut Vec<C>,
    kind: EntityKind,
    prompt: &mut P,
    create: F,
) -> Result<Resolved>
where
    C: Candidate,
    P: Prompt + ?Sized,
    F: FnOnce(&str, &mut P) -> Result<C>,
{
    if let Some(resolved) = lookup(identifier, references.as_slice(), kind, ResolveMode::Create) {
        return Ok(resolved);
    }

    let name = identifier.to_string();
    let question = format!(
        "{} \"{}\" not found. Create new {}?",
        kind.label(),
        name,
        kind.noun()
    );

    if !prompt.confirm(&question) {
        info!(%kind, %name, "creation declined");
        return Err(ClinicError::Cancelled { kind, name });
    }

    let created = create(&name, prompt)?;
    let id = created.id();
    references.push(created);

    info!(%kind, %name, id, "created new record");
    Ok(Resolved::Created(id))
}

/// Edit flow: resolve the identifier without ever creating.
///
/// A miss (or a blank field) keeps `previous`, the id the edited visit
/// already references. When several candidates share a name, `previous`
/// wins within the stage it matches at. With no previous id the miss is a blocking
/// `ClinicError::Unresolved`.
pub fn resolve_for_edit<C: Candidate>(
    identifier: Option<&Identifier>,
    candidates: &[C],
    kind: EntityKind,
    previous: Option<i64>,
) -> Result<Resolved> {
    match identifier {
        Some(Identifier::Id(id)) => return Ok(Resolved::ById(*id)),
        Some(Identifier::Name(name)) => {
            if let Some((id, match_kind)) =
                find_match_preferring(name, candidates, kind, ResolveMode::Edit, previous)
            {
                debug!(%kind, %name, id, ?match_kind, "resolved by name");
                return Ok(Resolved::Matched {
                    id,
                    kind: match_kind,
                });
            }
        }
        None => {}
    }

    let name = identifier.map(|i| i.to_string()).unwrap_or_default();

    match previous {
        Some(id) => {
            warn!(%kind, %name, id, "not found, keeping original id");
            Ok(Resolved::Kept(id))
        }
        None => Err(ClinicError::Unresolved { kind, name }),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompt;

    fn nurse(id: i64, name: &str) -> Nurse {
        Nurse {
            id,
            name: name.to_string(),
            specialization: None,
        }
    }

    fn citizen(id: i64, name: &str) -> Citizen {
        Citizen {
            id,
            name: name.to_string(),
            age: 30,
            address: "Rizal St".to_string(),
        }
    }

    fn name(s: &str) -> Identifier {
        Identifier::Name(s.to_string())
    }

    #[test]
    fn test_identifier_parse() {
        assert_eq!(Identifier::parse(" 42 "), Some(Identifier::Id(42)));
        assert_eq!(Identifier::parse("Ana Reyes"), Some(name("Ana Reyes")));
        assert_eq!(Identifier::parse("42 Ana"), Some(name("42 Ana")));
        assert_eq!(Identifier::parse("   "), None);
    }

    #[test]
    fn test_numeric_input_skips_name_matching() {
        // A citizen literally named "42" is not what "42" resolves to
        let citizens = vec![citizen(1, "42"), citizen(2, "Ana")];
        let resolved = lookup(
            &Identifier::parse("42").unwrap(),
            &citizens,
            EntityKind::Citizen,
            ResolveMode::Create,
        );

        assert_eq!(resolved, Some(Resolved::ById(42)));
    }

    #[test]
    fn test_numeric_input_never_prompts_or_creates() {
        let mut citizens: Vec<Citizen> = Vec::new();
        let mut prompt = ScriptedPrompt::new();

        let resolved = resolve_or_create(
            &Identifier::Id(42),
            &mut citizens,
            EntityKind::Citizen,
            &mut prompt,
            |_, _| panic!("must not create"),
        )
        .unwrap();

        assert_eq!(resolved, Resolved::ById(42));
        assert!(prompt.asked.is_empty());
    }

    #[test]
    fn test_exact_match_ignores_case_punctuation_suffix() {
        let citizens = vec![citizen(1, "Ben Santos"), citizen(2, "John O'Brien Jr.")];

        assert_eq!(
            find_match("john obrien", &citizens, EntityKind::Citizen, ResolveMode::Edit),
            Some((2, MatchKind::Exact))
        );
    }

    #[test]
    fn test_token_subset_match() {
        let citizens = vec![citizen(1, "Maria Dela Cruz")];

        assert_eq!(
            find_match("dela cruz", &citizens, EntityKind::Citizen, ResolveMode::Edit),
            Some((1, MatchKind::TokenSubset))
        );
        assert_eq!(
            find_match("cruz maria", &citizens, EntityKind::Citizen, ResolveMode::Edit),
            Some((1, MatchKind::TokenSubset))
        );
    }

    #[test]
    fn test_exact_beats_earlier_token_subset() {
        let citizens = vec![citizen(1, "Ana Reyes Santos"), citizen(2, "Ana Reyes")];

        assert_eq!(
            find_match("Ana Reyes", &citizens, EntityKind::Citizen, ResolveMode::Create),
            Some((2, MatchKind::Exact))
        );
    }

    #[test]
    fn test_substring_only_on_create() {
        // "ana reyesx" is not a token subset of "ana reyes", but contains it
        let citizens = vec![citizen(1, "Ana Reyes")];

        assert_eq!(
            find_match("Ana Reyesx", &citizens, EntityKind::Citizen, ResolveMode::Create),
            Some((1, MatchKind::Substring))
        );
        assert_eq!(
            find_match("Ana Reyesx", &citizens, EntityKind::Citizen, ResolveMode::Edit),
            None
        );
    }

    #[test]
    fn test_surname_match_for_nurses_on_create() {
        let nurses = vec![nurse(9, "Juan Dela Cruz")];

        assert_eq!(
            find_match("Maria Cruz", &nurses, EntityKind::Nurse, ResolveMode::Create),
            Some((9, MatchKind::Surname))
        );
        assert_eq!(
            find_match("Maria Cruz", &nurses, EntityKind::Nurse, ResolveMode::Edit),
            None
        );
    }

    #[test]
    fn test_surname_match_not_for_citizens() {
        let citizens = vec![citizen(9, "Juan Dela Cruz")];

        assert_eq!(
            find_match("Maria Cruz", &citizens, EntityKind::Citizen, ResolveMode::Create),
            None
        );
    }

    #[test]
    fn test_surname_needs_multiple_tokens() {
        let nurses = vec![nurse(9, "Juan Dela Cruz")];

        // Single token "pedro" contains nothing and is contained by nothing
        assert_eq!(
            find_match("Pedro", &nurses, EntityKind::Nurse, ResolveMode::Create),
            None
        );
    }

    #[test]
    fn test_dela_cruz_resolves_nurse_on_create() {
        let mut nurses = vec![nurse(9, "Juan Dela Cruz")];
        let mut prompt = ScriptedPrompt::new();

        let resolved = resolve_or_create(
            &name("dela cruz"),
            &mut nurses,
            EntityKind::Nurse,
            &mut prompt,
            |_, _| panic!("must not create"),
        )
        .unwrap();

        assert_eq!(resolved.id(), 9);
        assert_eq!(nurses.len(), 1);
    }

    #[test]
    fn test_blank_candidate_names_never_match() {
        let citizens = vec![citizen(1, "Jr."), citizen(2, "Ana")];

        assert_eq!(
            find_match("Ana Reyes", &citizens, EntityKind::Citizen, ResolveMode::Create),
            Some((2, MatchKind::Substring))
        );
    }

    #[test]
    fn test_punctuation_only_query_matches_nothing() {
        let citizens = vec![citizen(1, "Ana")];
        assert_eq!(
            find_match("?!", &citizens, EntityKind::Citizen, ResolveMode::Create),
            None
        );
    }

    #[test]
    fn test_edit_falls_back_to_previous_id() {
        let citizens = vec![citizen(1, "Ana Reyes")];

        let resolved = resolve_for_edit(
            Some(&name("Nobody Known")),
            &citizens,
            EntityKind::Citizen,
            Some(7),
        )
        .unwrap();

        assert_eq!(resolved, Resolved::Kept(7));
    }

    #[test]
    fn test_edit_blank_keeps_previous_id() {
        let citizens = vec![citizen(1, "Ana Reyes")];
        let resolved = resolve_for_edit(None, &citizens, EntityKind::Citizen, Some(7)).unwrap();
        assert_eq!(resolved, Resolved::Kept(7));
    }

    #[test]
    fn test_edit_prefers_previous_id_among_same_names() {
        let citizens = vec![citizen(3, "Ana Reyes"), citizen(5, "Ana Reyes")];

        let resolved = resolve_for_edit(
            Some(&name("Ana Reyes")),
            &citizens,
            EntityKind::Citizen,
            Some(5),
        )
        .unwrap();
        assert_eq!(
            resolved,
            Resolved::Matched {
                id: 5,
                kind: MatchKind::Exact
            }
        );

        // A better match on another record still wins over the previous id
        let citizens = vec![citizen(3, "Ana Reyes"), citizen(5, "Ana Reyes Cruz")];
        let resolved = resolve_for_edit(
            Some(&name("Ana Reyes")),
            &citizens,
            EntityKind::Citizen,
            Some(5),
        )
        .unwrap();
        assert_eq!(resolved.id(), 3);
    }

    #[test]
    fn test_edit_without_previous_id_blocks() {
        let nurses = vec![nurse(9, "Juan Dela Cruz")];

        let err = resolve_for_edit(Some(&name("Pedro")), &nurses, EntityKind::Nurse, None)
            .unwrap_err();

        assert!(matches!(err, ClinicError::Unresolved { kind: EntityKind::Nurse, .. }));
        assert_eq!(
            err.to_string(),
            "Nurse \"Pedro\" not found. Please select an existing nurse."
        );
    }

    #[test]
    fn test_create_declined_creates_nothing() {
        let mut citizens = vec![citizen(1, "Ana Reyes")];
        let mut prompt = ScriptedPrompt::new().confirming(false);
        let mut called = false;

        let err = resolve_or_create(
            &name("Pedro Penduko"),
            &mut citizens,
            EntityKind::Citizen,
            &mut prompt,
            |_, _| {
                called = true;
                Ok(citizen(2, "Pedro Penduko"))
            },
        )
        .unwrap_err();

        assert!(matches!(err, ClinicError::Cancelled { .. }));
        assert!(!called);
        assert_eq!(citizens.len(), 1);
        assert_eq!(
            prompt.asked,
            vec!["Citizen \"Pedro Penduko\" not found. Create new citizen?"]
        );
    }

    #[test]
    fn test_create_confirmed_appends_reference() {
        let mut nurses = vec![nurse(9, "Juan Dela Cruz")];
        let mut prompt = ScriptedPrompt::new().confirming(true);

        let resolved = resolve_or_create(
            &name("Pedro"),
            &mut nurses,
            EntityKind::Nurse,
            &mut prompt,
            |name, _| Ok(nurse(10, name)),
        )
        .unwrap();

        assert_eq!(resolved, Resolved::Created(10));
        assert_eq!(nurses.len(), 2);

        // The new nurse is visible to the next resolution without a refetch
        let again = lookup(&name("pedro"), &nurses, EntityKind::Nurse, ResolveMode::Edit);
        assert_eq!(again.map(|r| r.id()), Some(10));
    }

    #[test]
    fn test_create_callback_error_propagates() {
        let mut nurses: Vec<Nurse> = Vec::new();
        let mut prompt = ScriptedPrompt::new().confirming(true);

        let err = resolve_or_create(
            &name("Pedro"),
            &mut nurses,
            EntityKind::Nurse,
            &mut prompt,
            |_, _| Err(ClinicError::Required("Name")),
        )
        .unwrap_err();

        assert!(matches!(err, ClinicError::Required("Name")));
        assert!(nurses.is_empty());
    }
}
