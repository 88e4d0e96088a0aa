use crate::model::{BatchWrite, Id, Material, MaterialFilter, MaterialType};
use anyhow::Result;

#[async_trait::async_trait]
pub trait MaterialTypeStore: Send + Sync {
    async fn get_material_type(&self, id: Id) -> Result<Option<MaterialType>>;
    async fn list_material_types(&self) -> Result<Vec<MaterialType>>;
    /// Bulk lookup by name, for resolving every type reference in a batch
    /// with one query.
    async fn find_material_types_by_names(&self, names: &[String]) -> Result<Vec<MaterialType>>;
    /// Types are not creatable through the API; this exists for seeding.
    async fn upsert_material_type(&self, name: &str) -> Result<MaterialType>;
}

#[async_trait::async_trait]
pub trait MaterialStore: Send + Sync {
    /// Lookup by external id, case-insensitive.
    async fn get_material(&self, external_id: &str) -> Result<Option<Material>>;
    /// Bulk lookup used to build the resolution scope for a whole request in
    /// one query instead of one per item.
    async fn find_materials_by_external_ids(&self, external_ids: &[String])
        -> Result<Vec<Material>>;
    async fn list_materials(&self, filter: Option<MaterialFilter>) -> Result<Vec<Material>>;
    /// Persist one request's diff: material upserts, metadata rows, and
    /// derivative edges, all inside a single transaction. A failure anywhere
    /// leaves the store untouched. Returns the materials named in
    /// `write.touched`, reloaded, in that order.
    async fn save_batch(&self, write: BatchWrite) -> Result<Vec<Material>>;
}

pub trait Store: MaterialTypeStore + MaterialStore + Send + Sync {}
