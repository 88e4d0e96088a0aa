use anyhow::Result;
use log::info;

use crate::store::traits::Store;

/// Material types the API can resolve by name. There is no type-creation
/// endpoint, so a fresh database needs these provisioned before materials
/// referencing them can be created.
const DEFAULT_MATERIAL_TYPES: &[&str] = &["steel", "aluminium", "glass", "polymer", "composite"];

/// Load a starter set of material types. Idempotent: re-running leaves
/// existing rows untouched.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    for name in DEFAULT_MATERIAL_TYPES {
        let material_type = store.upsert_material_type(name).await?;
        info!("seeded material type '{}' (id {})", material_type.name, material_type.id);
    }
    Ok(())
}
