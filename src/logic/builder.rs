use std::collections::HashMap;

use crate::logic::lineage::{resolve_parents, ResolutionScope};
use crate::logic::metadata_merge;
use crate::model::{
    generate_external_id, normalize_external_id, Material, MaterialDraft, MaterialSpec,
    MaterialType, MetadatumDraft,
};

/// Build an in-memory material from a request spec, either from scratch or
/// on top of an existing record.
///
/// Pure transform: type resolution runs against the pre-fetched `types` map
/// and parents against the scope, and nothing is rejected here. Missing
/// required fields stay `None` so the validation pass can aggregate errors
/// uniformly over new and updated materials.
///
/// Partial-update semantics: attributes and the type fall back to the
/// existing material's values when the spec omits them; metadata merges by
/// key and parents only ever grow.
pub fn build_material(
    existing: Option<&Material>,
    spec: &MaterialSpec,
    types: &HashMap<String, MaterialType>,
    scope: &ResolutionScope,
) -> MaterialDraft {
    let name = spec
        .attributes
        .name
        .clone()
        .or_else(|| existing.map(|m| m.name.clone()));

    // The update path may re-identify a material with a fresh external id;
    // the create path accepts a client-supplied id (spec id or attribute)
    // and generates one otherwise.
    let external_id = match existing {
        Some(material) => spec
            .attributes
            .external_id
            .clone()
            .unwrap_or_else(|| material.external_id.clone()),
        None => spec
            .attributes
            .external_id
            .clone()
            .or_else(|| spec.id.clone())
            .unwrap_or_else(generate_external_id),
    };

    let material_type = match spec.material_type_name() {
        Some(name) => types.get(name).cloned(),
        None => existing.map(|m| m.material_type.clone()),
    };

    let existing_metadata: Vec<MetadatumDraft> = existing
        .map(|m| {
            m.metadata
                .iter()
                .map(|md| MetadatumDraft {
                    id: md.id,
                    key: Some(md.key.clone()),
                    value: md.value.clone(),
                    dirty: false,
                })
                .collect()
        })
        .unwrap_or_default();
    let metadata = metadata_merge::merge(existing_metadata, &spec.metadata_pairs());

    let existing_parent_ids: Vec<String> = existing
        .map(|m| {
            m.parents
                .iter()
                .map(|p| normalize_external_id(p))
                .collect()
        })
        .unwrap_or_default();
    let lineage = resolve_parents(&existing_parent_ids, &spec.parent_refs(), scope);

    let dirty = match existing {
        None => true,
        Some(material) => {
            name.as_deref() != Some(material.name.as_str())
                || normalize_external_id(&external_id)
                    != normalize_external_id(&material.external_id)
                || material_type.as_ref().map(|t| t.id) != Some(material.material_type.id)
        }
    };

    MaterialDraft {
        id: existing.map(|m| m.id),
        external_id,
        name,
        material_type,
        metadata,
        existing_parent_ids,
        resolved_parent_ids: lineage.resolved_ids,
        expected_parent_ids: lineage.expected_ids,
        dirty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        is_valid_external_id, MaterialAttributes, MaterialRelationships, MaterialTypeRef,
        MaterialTypeRefAttributes, MaterialTypeRefData, Metadatum, MetadataRef,
        MetadatumAttributes, MetadatumSpec, ParentRef, ParentsRef,
    };
    use chrono::Utc;

    fn steel() -> MaterialType {
        MaterialType {
            id: 7,
            name: "steel".to_string(),
        }
    }

    fn types() -> HashMap<String, MaterialType> {
        HashMap::from([("steel".to_string(), steel())])
    }

    fn spec(name: Option<&str>, type_name: Option<&str>) -> MaterialSpec {
        MaterialSpec {
            id: None,
            attributes: MaterialAttributes {
                name: name.map(str::to_string),
                external_id: None,
            },
            relationships: MaterialRelationships {
                material_type: type_name.map(|n| MaterialTypeRef {
                    data: MaterialTypeRefData {
                        attributes: MaterialTypeRefAttributes {
                            name: Some(n.to_string()),
                        },
                    },
                }),
                metadata: None,
                parents: None,
            },
        }
    }

    fn existing_material() -> Material {
        Material {
            id: 3,
            external_id: "c317e710-297d-0134-035e-2cbc32c89153".to_string(),
            name: "rod".to_string(),
            material_type: steel(),
            metadata: vec![Metadatum {
                id: Some(11),
                key: "len".to_string(),
                value: Some("3m".to_string()),
            }],
            parents: vec!["aaaaaaaa-0000-0000-0000-000000000000".to_string()],
            children: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn creates_with_generated_external_id() {
        let draft = build_material(
            None,
            &spec(Some("rod"), Some("steel")),
            &types(),
            &ResolutionScope::default(),
        );
        assert!(draft.is_new());
        assert!(draft.dirty);
        assert!(is_valid_external_id(&draft.external_id));
        assert_eq!(draft.name.as_deref(), Some("rod"));
        assert_eq!(draft.material_type, Some(steel()));
    }

    #[test]
    fn unresolved_type_name_leaves_type_empty() {
        let draft = build_material(
            None,
            &spec(Some("rod"), Some("plutonium")),
            &types(),
            &ResolutionScope::default(),
        );
        assert!(draft.material_type.is_none());
    }

    #[test]
    fn missing_name_is_deferred_to_validation() {
        let draft = build_material(
            None,
            &spec(None, Some("steel")),
            &types(),
            &ResolutionScope::default(),
        );
        assert!(draft.name.is_none());
    }

    #[test]
    fn update_preserves_omitted_fields() {
        let material = existing_material();
        let draft = build_material(
            Some(&material),
            &MaterialSpec::default(),
            &types(),
            &ResolutionScope::default(),
        );
        assert_eq!(draft.id, Some(3));
        assert_eq!(draft.name.as_deref(), Some("rod"));
        assert_eq!(draft.external_id, material.external_id);
        assert_eq!(draft.material_type, Some(steel()));
        assert_eq!(draft.metadata.len(), 1);
        assert!(!draft.dirty);
    }

    #[test]
    fn update_merges_metadata_and_keeps_parents() {
        let material = existing_material();
        let mut spec = spec(None, None);
        spec.relationships.metadata = Some(MetadataRef {
            data: vec![
                MetadatumSpec {
                    attributes: MetadatumAttributes {
                        key: Some("len".to_string()),
                        value: Some("4m".to_string()),
                    },
                },
                MetadatumSpec {
                    attributes: MetadatumAttributes {
                        key: Some("grade".to_string()),
                        value: Some("A".to_string()),
                    },
                },
            ],
        });

        let draft = build_material(Some(&material), &spec, &types(), &ResolutionScope::default());
        assert_eq!(draft.metadata.len(), 2);
        assert_eq!(draft.metadata[0].id, Some(11));
        assert_eq!(draft.metadata[0].value.as_deref(), Some("4m"));
        assert_eq!(
            draft.expected_parent_ids,
            vec!["aaaaaaaa-0000-0000-0000-000000000000".to_string()]
        );
        // Attribute row untouched, so the material row itself is clean.
        assert!(!draft.dirty);
    }

    #[test]
    fn declared_parents_extend_the_expected_set() {
        let material = existing_material();
        let mut spec = spec(None, None);
        spec.relationships.parents = Some(ParentsRef {
            data: vec![ParentRef {
                id: "bbbbbbbb-0000-0000-0000-000000000000".to_string(),
            }],
        });

        let draft = build_material(Some(&material), &spec, &types(), &ResolutionScope::default());
        assert_eq!(
            draft.expected_parent_ids,
            vec![
                "aaaaaaaa-0000-0000-0000-000000000000".to_string(),
                "bbbbbbbb-0000-0000-0000-000000000000".to_string()
            ]
        );
        // The new reference did not resolve, so it is not attached yet.
        assert_eq!(
            draft.resolved_parent_ids,
            vec!["aaaaaaaa-0000-0000-0000-000000000000".to_string()]
        );
        assert!(draft.new_parent_ids().is_empty());
    }

    #[test]
    fn rename_marks_the_row_dirty() {
        let material = existing_material();
        let draft = build_material(
            Some(&material),
            &spec(Some("bar"), None),
            &types(),
            &ResolutionScope::default(),
        );
        assert!(draft.dirty);
    }
}
