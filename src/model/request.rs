use serde::Deserialize;

/// Typed request schemas for the JSON wire shapes. Unknown fields are ignored
/// by serde rather than filtered ad hoc, so each endpoint accepts exactly the
/// shape declared here.
///
/// Single material endpoints take `{"data": <material spec>}`; the batch
/// endpoint nests specs under `data.relationships.materials.data`.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialEnvelope {
    pub data: MaterialSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialSpec {
    /// External id of an already-persisted material this spec refers to.
    /// Only meaningful inside a batch; single-material updates carry the id
    /// in the URL instead.
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: MaterialAttributes,
    #[serde(default)]
    pub relationships: MaterialRelationships,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialAttributes {
    pub name: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialRelationships {
    pub material_type: Option<MaterialTypeRef>,
    pub metadata: Option<MetadataRef>,
    pub parents: Option<ParentsRef>,
}

/// `{"data": {"attributes": {"name": ...}}}`. Types are referenced by name
/// and resolved against the store, never created through this API.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialTypeRef {
    pub data: MaterialTypeRefData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialTypeRefData {
    #[serde(default)]
    pub attributes: MaterialTypeRefAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialTypeRefAttributes {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRef {
    pub data: Vec<MetadatumSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadatumSpec {
    #[serde(default)]
    pub attributes: MetadatumAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadatumAttributes {
    pub key: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentsRef {
    pub data: Vec<ParentRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchEnvelope {
    pub data: BatchSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchSpec {
    #[serde(default)]
    pub relationships: BatchRelationships,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRelationships {
    pub materials: Option<BatchMaterialsRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchMaterialsRef {
    pub data: Vec<MaterialSpec>,
}

impl MaterialSpec {
    /// Type name declared by this spec, if any.
    pub fn material_type_name(&self) -> Option<&str> {
        self.relationships
            .material_type
            .as_ref()
            .and_then(|r| r.data.attributes.name.as_deref())
    }

    /// Metadata key/value pairs declared by this spec, in request order.
    pub fn metadata_pairs(&self) -> Vec<(Option<String>, Option<String>)> {
        self.relationships
            .metadata
            .as_ref()
            .map(|m| {
                m.data
                    .iter()
                    .map(|d| (d.attributes.key.clone(), d.attributes.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parent external ids declared by this spec, in request order.
    pub fn parent_refs(&self) -> Vec<String> {
        self.relationships
            .parents
            .as_ref()
            .map(|p| p.data.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }
}

impl BatchEnvelope {
    pub fn material_specs(self) -> Vec<MaterialSpec> {
        self.data
            .relationships
            .materials
            .map(|m| m.data)
            .unwrap_or_default()
    }
}
