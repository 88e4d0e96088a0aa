use crate::model::{Id, MaterialType};

/// An in-memory material built from one request spec, not yet validated or
/// persisted. Missing required fields are carried as `None` and rejected by
/// the validation pass rather than at construction time, so new and updated
/// materials flow through the same pipeline.
#[derive(Debug, Clone, Default)]
pub struct MaterialDraft {
    /// Row id when the draft updates an existing material.
    pub id: Option<Id>,
    /// External id exactly as supplied (or generated). Kept raw so format
    /// errors can echo the offending value back to the caller.
    pub external_id: String,
    pub name: Option<String>,
    pub material_type: Option<MaterialType>,
    pub metadata: Vec<MetadatumDraft>,
    /// Parents already attached before this request, normalized.
    pub existing_parent_ids: Vec<String>,
    /// Declared parents that resolved against the scope, normalized.
    pub resolved_parent_ids: Vec<String>,
    /// existing ++ declared, first-seen order, no duplicates. The parent set
    /// after save must equal exactly this.
    pub expected_parent_ids: Vec<String>,
    /// True when the material row itself is new or has changed attributes.
    /// Untouched rows are skipped by the bulk write.
    pub dirty: bool,
}

impl MaterialDraft {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Parents declared by this request that were not already attached.
    /// These become derivative edges on commit.
    pub fn new_parent_ids(&self) -> Vec<String> {
        self.resolved_parent_ids
            .iter()
            .filter(|p| !self.existing_parent_ids.contains(p))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadatumDraft {
    pub id: Option<Id>,
    pub key: Option<String>,
    pub value: Option<String>,
    /// Set when the row is new or its value changed; clean rows are skipped
    /// by the bulk write.
    pub dirty: bool,
}

/// The explicit diff handed to the persistence gateway: every row here is
/// new or modified, and the whole set is written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct BatchWrite {
    pub materials: Vec<MaterialWrite>,
    pub metadata: Vec<MetadatumWrite>,
    pub derivatives: Vec<DerivativeWrite>,
    /// External ids of every material in the request, in input order, used
    /// to reload the response set after commit.
    pub touched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MaterialWrite {
    pub id: Option<Id>,
    pub external_id: String,
    pub name: String,
    pub material_type_id: Id,
}

#[derive(Debug, Clone)]
pub struct MetadatumWrite {
    pub id: Option<Id>,
    /// Owning material, by external id; new materials have no row id until
    /// the transaction assigns one.
    pub material_external_id: String,
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeWrite {
    pub parent_external_id: String,
    pub child_external_id: String,
}
