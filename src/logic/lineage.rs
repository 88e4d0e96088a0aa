use std::collections::{HashMap, HashSet};

use crate::model::{normalize_external_id, Material};

/// Lookup table of everything a batch may reference by external id: materials
/// already persisted (bulk-fetched up front) plus sibling drafts being
/// created in the same request. Passed explicitly through the pipeline so
/// each request is isolated.
#[derive(Debug, Default)]
pub struct ResolutionScope {
    persisted: HashMap<String, Material>,
    drafts: HashSet<String>,
}

impl ResolutionScope {
    pub fn from_persisted(materials: Vec<Material>) -> Self {
        let persisted = materials
            .into_iter()
            .map(|m| (normalize_external_id(&m.external_id), m))
            .collect();
        Self {
            persisted,
            drafts: HashSet::new(),
        }
    }

    /// Make an in-batch draft addressable by its external id, so later (or
    /// earlier, on the second resolution pass) siblings can declare it as a
    /// parent.
    pub fn register_draft(&mut self, external_id: &str) {
        self.drafts.insert(normalize_external_id(external_id));
    }

    pub fn contains(&self, external_id: &str) -> bool {
        let key = normalize_external_id(external_id);
        self.persisted.contains_key(&key) || self.drafts.contains(&key)
    }

    pub fn persisted(&self, external_id: &str) -> Option<&Material> {
        self.persisted.get(&normalize_external_id(external_id))
    }
}

/// Outcome of parent resolution for one material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLineage {
    /// Expected parent set after save: existing parents then newly declared
    /// ones, first-seen order, no duplicates. Normalized.
    pub expected_ids: Vec<String>,
    /// The subset of `expected_ids` that resolved against the scope.
    /// Anything missing here at validation time fails as "must exist".
    pub resolved_ids: Vec<String>,
}

/// Resolve declared parent references against the scope.
///
/// An unresolved reference is not an error here: the batch may still supply
/// the missing material from a sibling entry before validation compares the
/// expected and resolved sets. Existing parents are always part of both sets;
/// omission never drops lineage.
pub fn resolve_parents(
    existing_parents: &[String],
    declared_refs: &[String],
    scope: &ResolutionScope,
) -> ResolvedLineage {
    let mut expected_ids: Vec<String> = Vec::new();
    for id in existing_parents.iter().chain(declared_refs.iter()) {
        let id = normalize_external_id(id);
        if !expected_ids.contains(&id) {
            expected_ids.push(id);
        }
    }

    let existing: HashSet<String> = existing_parents
        .iter()
        .map(|id| normalize_external_id(id))
        .collect();

    let resolved_ids = expected_ids
        .iter()
        .filter(|id| existing.contains(*id) || scope.contains(id))
        .cloned()
        .collect();

    ResolvedLineage {
        expected_ids,
        resolved_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaterialType, Metadatum};
    use chrono::Utc;

    fn material(external_id: &str) -> Material {
        Material {
            id: 1,
            external_id: external_id.to_string(),
            name: "m".to_string(),
            material_type: MaterialType {
                id: 1,
                name: "steel".to_string(),
            },
            metadata: Vec::<Metadatum>::new(),
            parents: vec![],
            children: vec![],
            created_at: Utc::now(),
        }
    }

    const A: &str = "aaaaaaaa-0000-0000-0000-000000000000";
    const B: &str = "bbbbbbbb-0000-0000-0000-000000000000";
    const C: &str = "cccccccc-0000-0000-0000-000000000000";

    #[test]
    fn expected_ids_union_existing_then_declared_without_duplicates() {
        let scope = ResolutionScope::default();
        let lineage = resolve_parents(
            &[A.to_string(), B.to_string()],
            &[B.to_string(), C.to_string()],
            &scope,
        );
        assert_eq!(lineage.expected_ids, vec![A, B, C]);
    }

    #[test]
    fn existing_parents_resolve_without_scope_lookup() {
        let scope = ResolutionScope::default();
        let lineage = resolve_parents(&[A.to_string()], &[], &scope);
        assert_eq!(lineage.resolved_ids, vec![A]);
    }

    #[test]
    fn declared_parents_resolve_against_persisted_and_drafts() {
        let mut scope = ResolutionScope::from_persisted(vec![material(B)]);
        scope.register_draft(C);
        let lineage = resolve_parents(&[], &[B.to_string(), C.to_string()], &scope);
        assert_eq!(lineage.resolved_ids, vec![B, C]);
    }

    #[test]
    fn unresolved_reference_is_left_for_validation() {
        let scope = ResolutionScope::default();
        let lineage = resolve_parents(&[], &[C.to_string()], &scope);
        assert_eq!(lineage.expected_ids, vec![C]);
        assert!(lineage.resolved_ids.is_empty());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let scope = ResolutionScope::from_persisted(vec![material(B)]);
        let upper = B.to_ascii_uppercase();
        assert!(scope.contains(&upper));
        let lineage = resolve_parents(&[], &[upper], &scope);
        assert_eq!(lineage.resolved_ids, vec![B]);
    }
}
