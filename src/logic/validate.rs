use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::model::{is_valid_external_id, normalize_external_id, MaterialDraft};

use super::lineage::ResolutionScope;

pub const BLANK: &str = "can't be blank";
pub const MUST_EXIST: &str = "must exist";
pub const TAKEN: &str = "has already been taken";
pub const DUPLICATE_REFERENCE: &str = "is referenced more than once in the batch";
pub const SELF_PARENT: &str = "can't include the material itself";

/// Flat, addressable error map: field path to messages. Nested entity
/// failures are pulled up under namespaced paths (`metadata.key`,
/// `materials.name`, ...) so a single map can represent the whole request.
/// Serialized verbatim as a 422 body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<String, Vec<String>>);

impl ErrorMap {
    /// Add a message under a path, suppressing exact duplicates.
    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let messages = self.0.entry(path.into()).or_default();
        let message = message.into();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, path: &str) -> Option<&Vec<String>> {
        self.0.get(path)
    }
}

/// Whether errors are reported for a single-material request or for a batch.
/// The prefix is part of the external contract: a blank name surfaces as
/// `name` on `POST /materials` but `materials.name` on `POST /material_batches`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    Single,
    Batch,
}

impl ErrorContext {
    fn path(&self, field: &str) -> String {
        match self {
            ErrorContext::Single => field.to_string(),
            ErrorContext::Batch => format!("materials.{}", field),
        }
    }
}

/// Validate every built material and aggregate failures into one flat map.
/// Walks material-level fields, metadata rows, and the expected-vs-resolved
/// parent sets. An empty result is the green light for the bulk write.
pub fn validate_drafts(
    drafts: &[MaterialDraft],
    scope: &ResolutionScope,
    context: ErrorContext,
) -> ErrorMap {
    let mut errors = ErrorMap::default();

    // Two specs claiming the same external id inside one batch would race
    // each other on the same row; rejected outright.
    let mut seen: HashMap<String, usize> = HashMap::new();
    for draft in drafts {
        *seen
            .entry(normalize_external_id(&draft.external_id))
            .or_insert(0) += 1;
    }

    for draft in drafts {
        let own_id = normalize_external_id(&draft.external_id);

        if draft.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            errors.add(context.path("name"), BLANK);
        }

        if draft.material_type.is_none() {
            errors.add(context.path("material_type"), MUST_EXIST);
        }

        if !is_valid_external_id(&draft.external_id) {
            errors.add(
                context.path("external_id"),
                format!("({}) is not a valid UUID", draft.external_id),
            );
        } else if seen.get(&own_id).copied().unwrap_or(0) > 1 {
            errors.add(context.path("external_id"), DUPLICATE_REFERENCE);
        } else if scope
            .persisted(&own_id)
            .map_or(false, |other| Some(other.id) != draft.id)
        {
            // Covers both a creation colliding with a persisted id and an
            // update re-identifying onto another material's id.
            errors.add(context.path("external_id"), TAKEN);
        }

        if draft.expected_parent_ids.contains(&own_id) {
            errors.add(context.path("parents"), SELF_PARENT);
        }
        if draft.resolved_parent_ids.len() != draft.expected_parent_ids.len() {
            errors.add(context.path("parents"), MUST_EXIST);
        }

        for metadatum in &draft.metadata {
            if metadatum
                .key
                .as_deref()
                .map_or(true, |k| k.trim().is_empty())
            {
                errors.add(context.path("metadata.key"), BLANK);
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaterialType, MetadatumDraft};

    fn valid_draft() -> MaterialDraft {
        MaterialDraft {
            id: None,
            external_id: "c317e710-297d-0134-035e-2cbc32c89153".to_string(),
            name: Some("rod".to_string()),
            material_type: Some(MaterialType {
                id: 1,
                name: "steel".to_string(),
            }),
            ..MaterialDraft::default()
        }
    }

    #[test]
    fn valid_draft_produces_no_errors() {
        let errors = validate_drafts(
            &[valid_draft()],
            &ResolutionScope::default(),
            ErrorContext::Single,
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_name_and_type_fail_required_validation() {
        let mut draft = valid_draft();
        draft.name = None;
        draft.material_type = None;

        let errors = validate_drafts(&[draft], &ResolutionScope::default(), ErrorContext::Single);
        assert_eq!(errors.messages("name").unwrap(), &vec![BLANK.to_string()]);
        assert_eq!(
            errors.messages("material_type").unwrap(),
            &vec![MUST_EXIST.to_string()]
        );
    }

    #[test]
    fn malformed_external_id_echoes_the_value() {
        let mut draft = valid_draft();
        draft.external_id = "wibble".to_string();

        let errors = validate_drafts(&[draft], &ResolutionScope::default(), ErrorContext::Single);
        assert_eq!(
            errors.messages("external_id").unwrap(),
            &vec!["(wibble) is not a valid UUID".to_string()]
        );
    }

    #[test]
    fn unresolved_parent_fails_as_must_exist() {
        let mut draft = valid_draft();
        draft.expected_parent_ids = vec!["aaaaaaaa-0000-0000-0000-000000000000".to_string()];
        draft.resolved_parent_ids = vec![];

        let errors = validate_drafts(&[draft], &ResolutionScope::default(), ErrorContext::Single);
        assert_eq!(
            errors.messages("parents").unwrap(),
            &vec![MUST_EXIST.to_string()]
        );
    }

    #[test]
    fn self_parenting_is_rejected() {
        let mut draft = valid_draft();
        let own = draft.external_id.clone();
        draft.expected_parent_ids = vec![own.clone()];
        draft.resolved_parent_ids = vec![own];

        let errors = validate_drafts(&[draft], &ResolutionScope::default(), ErrorContext::Single);
        assert_eq!(
            errors.messages("parents").unwrap(),
            &vec![SELF_PARENT.to_string()]
        );
    }

    #[test]
    fn blank_metadata_key_is_namespaced_per_context() {
        let mut draft = valid_draft();
        draft.metadata.push(MetadatumDraft {
            id: None,
            key: None,
            value: Some("v".to_string()),
            dirty: true,
        });

        let single = validate_drafts(
            std::slice::from_ref(&draft),
            &ResolutionScope::default(),
            ErrorContext::Single,
        );
        assert!(single.messages("metadata.key").is_some());

        let batch = validate_drafts(&[draft], &ResolutionScope::default(), ErrorContext::Batch);
        assert!(batch.messages("materials.metadata.key").is_some());
        assert!(batch.messages("metadata.key").is_none());
    }

    #[test]
    fn duplicate_batch_references_are_rejected() {
        let a = valid_draft();
        let mut b = valid_draft();
        b.external_id = a.external_id.to_ascii_uppercase();

        let errors = validate_drafts(&[a, b], &ResolutionScope::default(), ErrorContext::Batch);
        assert_eq!(
            errors.messages("materials.external_id").unwrap(),
            &vec![DUPLICATE_REFERENCE.to_string()]
        );
    }

    #[test]
    fn repeated_messages_are_suppressed() {
        let mut a = valid_draft();
        a.name = None;
        let mut b = valid_draft();
        b.name = None;
        b.external_id = "aaaaaaaa-0000-0000-0000-000000000000".to_string();

        let errors = validate_drafts(&[a, b], &ResolutionScope::default(), ErrorContext::Batch);
        assert_eq!(errors.messages("materials.name").unwrap().len(), 1);
    }
}
