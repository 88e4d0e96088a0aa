use anyhow::{anyhow, Result};
use itertools::Itertools;
use std::collections::HashMap;

use crate::logic::builder::build_material;
use crate::logic::lineage::ResolutionScope;
use crate::logic::validate::{self, validate_drafts, ErrorContext, ErrorMap};
use crate::model::{
    normalize_external_id, BatchWrite, DerivativeWrite, Material, MaterialDraft, MaterialSpec,
    MaterialType, MaterialWrite, MetadatumWrite,
};
use crate::store::traits::Store;

/// Outcome of one batch call: either every material committed in one
/// transaction, or nothing was written. There is no partial success.
/// `Invalid` carries the aggregated error map from validation;
/// `CommitFailed` is a write that passed validation but was rejected by the
/// database (e.g. a uniqueness race) and has already rolled back. Store
/// failures during resolution surface as `Err` and are the caller's fault
/// domain, not the client's.
#[derive(Debug)]
pub enum BatchResult {
    Committed(Vec<Material>),
    Invalid(ErrorMap),
    CommitFailed(anyhow::Error),
}

/// Run the full pipeline for one request: resolve, build, validate, commit.
///
/// Specs are processed in input order and the committed material list
/// preserves that order, so callers can zip responses back to requests
/// positionally. A spec carrying an `id` that resolves to a persisted
/// material becomes an update; one carrying an unknown `id` becomes a
/// creation under that client-supplied external id.
pub async fn process<S: Store + ?Sized>(
    store: &S,
    specs: &[MaterialSpec],
    context: ErrorContext,
) -> Result<BatchResult> {
    if context == ErrorContext::Batch && specs.is_empty() {
        let mut errors = ErrorMap::default();
        errors.add("materials", validate::BLANK);
        return Ok(BatchResult::Invalid(errors));
    }

    // RESOLVED: one bulk fetch covering every external id the request can
    // reference (primary ids, client-supplied ids, parent refs), and one for
    // every type name.
    let referenced_ids: Vec<String> = specs
        .iter()
        .flat_map(|spec| {
            spec.id
                .iter()
                .chain(spec.attributes.external_id.iter())
                .cloned()
                .chain(spec.parent_refs())
        })
        .map(|id| normalize_external_id(&id))
        .unique()
        .collect();
    let mut scope = ResolutionScope::from_persisted(
        store.find_materials_by_external_ids(&referenced_ids).await?,
    );

    let type_names: Vec<String> = specs
        .iter()
        .filter_map(|spec| spec.material_type_name().map(str::to_string))
        .unique()
        .collect();
    let types: HashMap<String, MaterialType> = store
        .find_material_types_by_names(&type_names)
        .await?
        .into_iter()
        .map(|t| (t.name.clone(), t))
        .collect();

    // BUILT: first pass constructs every draft and registers its external id
    // so siblings can reference it; the second pass re-resolves parents,
    // which is what makes forward references within the batch work.
    let mut drafts: Vec<MaterialDraft> = Vec::with_capacity(specs.len());
    for spec in specs {
        let existing = spec
            .id
            .as_deref()
            .and_then(|id| scope.persisted(id))
            .cloned();
        let draft = build_material(existing.as_ref(), spec, &types, &scope);
        scope.register_draft(&draft.external_id);
        drafts.push(draft);
    }
    for draft in &mut drafts {
        draft.resolved_parent_ids = draft
            .expected_parent_ids
            .iter()
            .filter(|id| draft.existing_parent_ids.contains(id) || scope.contains(id))
            .cloned()
            .collect();
    }

    // VALIDATED: all-or-nothing. One invalid material rolls back the lot.
    let errors = validate_drafts(&drafts, &scope, context);
    if !errors.is_empty() {
        return Ok(BatchResult::Invalid(errors));
    }

    // COMMITTED: assemble the explicit diff (dirty rows only) and hand it to
    // the gateway as one transaction.
    let write = assemble_write(&drafts)?;
    match store.save_batch(write).await {
        Ok(materials) => Ok(BatchResult::Committed(materials)),
        Err(err) => Ok(BatchResult::CommitFailed(err)),
    }
}

fn assemble_write(drafts: &[MaterialDraft]) -> Result<BatchWrite> {
    let mut write = BatchWrite::default();

    for draft in drafts {
        let external_id = normalize_external_id(&draft.external_id);

        if draft.dirty {
            write.materials.push(MaterialWrite {
                id: draft.id,
                external_id: external_id.clone(),
                name: draft
                    .name
                    .clone()
                    .ok_or_else(|| anyhow!("validated draft has no name"))?,
                material_type_id: draft
                    .material_type
                    .as_ref()
                    .map(|t| t.id)
                    .ok_or_else(|| anyhow!("validated draft has no material type"))?,
            });
        }

        for metadatum in draft.metadata.iter().filter(|m| m.dirty) {
            write.metadata.push(MetadatumWrite {
                id: metadatum.id,
                material_external_id: external_id.clone(),
                key: metadatum
                    .key
                    .clone()
                    .ok_or_else(|| anyhow!("validated metadatum has no key"))?,
                value: metadatum.value.clone(),
            });
        }

        for parent in draft.new_parent_ids() {
            write.derivatives.push(DerivativeWrite {
                parent_external_id: parent,
                child_external_id: external_id.clone(),
            });
        }

        write.touched.push(external_id);
    }

    Ok(write)
}
