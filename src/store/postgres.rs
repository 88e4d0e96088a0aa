use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashMap;

use crate::model::{
    normalize_external_id, BatchWrite, Id, Material, MaterialFilter, MaterialType, Metadatum,
};
use crate::store::traits::{MaterialStore, MaterialTypeStore, Store};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load full material records (type, metadata, lineage) for a set of
    /// material rows fetched by the caller. Three queries total regardless
    /// of how many materials are involved.
    async fn assemble_materials(&self, rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Material>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Id> = rows.iter().map(|row| row.get("id")).collect();

        let metadata_rows = sqlx::query(
            "SELECT id, material_id, key, value FROM metadata WHERE material_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch metadata")?;

        let mut metadata_by_material: HashMap<Id, Vec<Metadatum>> = HashMap::new();
        for row in metadata_rows {
            metadata_by_material
                .entry(row.get("material_id"))
                .or_default()
                .push(Metadatum {
                    id: Some(row.get("id")),
                    key: row.get("key"),
                    value: row.get("value"),
                });
        }

        let edge_rows = sqlx::query(
            r#"
            SELECT d.parent_id, d.child_id,
                   p.external_id AS parent_external_id,
                   c.external_id AS child_external_id
            FROM material_derivatives d
            JOIN materials p ON p.id = d.parent_id
            JOIN materials c ON c.id = d.child_id
            WHERE d.parent_id = ANY($1) OR d.child_id = ANY($1)
            ORDER BY d.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch derivative edges")?;

        let mut parents_by_material: HashMap<Id, Vec<String>> = HashMap::new();
        let mut children_by_material: HashMap<Id, Vec<String>> = HashMap::new();
        for row in edge_rows {
            let parent_id: Id = row.get("parent_id");
            let child_id: Id = row.get("child_id");
            parents_by_material
                .entry(child_id)
                .or_default()
                .push(row.get("parent_external_id"));
            children_by_material
                .entry(parent_id)
                .or_default()
                .push(row.get("child_external_id"));
        }

        let materials = rows
            .into_iter()
            .map(|row| {
                let id: Id = row.get("id");
                Material {
                    id,
                    external_id: row.get("external_id"),
                    name: row.get("name"),
                    material_type: MaterialType {
                        id: row.get("material_type_id"),
                        name: row.get("material_type_name"),
                    },
                    metadata: metadata_by_material.remove(&id).unwrap_or_default(),
                    parents: parents_by_material.remove(&id).unwrap_or_default(),
                    children: children_by_material.remove(&id).unwrap_or_default(),
                    created_at: row.get("created_at"),
                }
            })
            .collect();

        Ok(materials)
    }
}

const MATERIAL_SELECT: &str = r#"
    SELECT m.id, m.external_id, m.name, m.created_at,
           t.id AS material_type_id, t.name AS material_type_name
    FROM materials m
    JOIN material_types t ON t.id = m.material_type_id
"#;

#[async_trait::async_trait]
impl MaterialTypeStore for PostgresStore {
    async fn get_material_type(&self, id: Id) -> Result<Option<MaterialType>> {
        let row = sqlx::query("SELECT id, name FROM material_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch material type")?;

        Ok(row.map(|row| MaterialType {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    async fn list_material_types(&self) -> Result<Vec<MaterialType>> {
        let rows = sqlx::query("SELECT id, name FROM material_types ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list material types")?;

        Ok(rows
            .into_iter()
            .map(|row| MaterialType {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn find_material_types_by_names(&self, names: &[String]) -> Result<Vec<MaterialType>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT id, name FROM material_types WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch material types by name")?;

        Ok(rows
            .into_iter()
            .map(|row| MaterialType {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn upsert_material_type(&self, name: &str) -> Result<MaterialType> {
        let row = sqlx::query(
            r#"
            INSERT INTO material_types (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET updated_at = NOW()
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert material type")?;

        Ok(MaterialType {
            id: row.get("id"),
            name: row.get("name"),
        })
    }
}

#[async_trait::async_trait]
impl MaterialStore for PostgresStore {
    async fn get_material(&self, external_id: &str) -> Result<Option<Material>> {
        let rows = sqlx::query(&format!("{} WHERE m.external_id = $1", MATERIAL_SELECT))
            .bind(normalize_external_id(external_id))
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch material")?;

        Ok(self.assemble_materials(rows).await?.into_iter().next())
    }

    async fn find_materials_by_external_ids(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<Material>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = external_ids
            .iter()
            .map(|id| normalize_external_id(id))
            .collect();
        let rows = sqlx::query(&format!(
            "{} WHERE m.external_id = ANY($1) ORDER BY m.id",
            MATERIAL_SELECT
        ))
        .bind(&keys)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch materials by external id")?;

        self.assemble_materials(rows).await
    }

    async fn list_materials(&self, filter: Option<MaterialFilter>) -> Result<Vec<Material>> {
        let filter = filter.unwrap_or_default();

        // An unknown type name matches nothing rather than everything.
        let material_type_id = match &filter.material_type {
            Some(name) => {
                let row = sqlx::query("SELECT id FROM material_types WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
                    .context("Failed to resolve material type filter")?;
                match row {
                    Some(row) => Some(row.get::<Id, _>("id")),
                    None => return Ok(Vec::new()),
                }
            }
            None => None,
        };

        let rows = sqlx::query(&format!(
            r#"{}
            WHERE ($1::text IS NULL OR m.name = $1)
              AND ($2::bigint IS NULL OR m.material_type_id = $2)
              AND ($3::timestamptz IS NULL OR m.created_at <= $3)
              AND ($4::timestamptz IS NULL OR m.created_at >= $4)
            ORDER BY m.id
            "#,
            MATERIAL_SELECT
        ))
        .bind(filter.name)
        .bind(material_type_id)
        .bind(filter.created_before)
        .bind(filter.created_after)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list materials")?;

        self.assemble_materials(rows).await
    }

    async fn save_batch(&self, write: BatchWrite) -> Result<Vec<Material>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for material in &write.materials {
            match material.id {
                Some(id) => {
                    sqlx::query(
                        r#"
                        UPDATE materials
                        SET external_id = $1, name = $2, material_type_id = $3, updated_at = NOW()
                        WHERE id = $4
                        "#,
                    )
                    .bind(&material.external_id)
                    .bind(&material.name)
                    .bind(material.material_type_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update material")?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO materials (external_id, name, material_type_id) VALUES ($1, $2, $3)",
                    )
                    .bind(&material.external_id)
                    .bind(&material.name)
                    .bind(material.material_type_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to insert material")?;
                }
            }
        }

        // Assign foreign keys now that every touched material has a row id.
        // Derivative endpoints may also reference pre-existing materials
        // outside the touched set.
        let mut referenced: Vec<String> = write.touched.clone();
        for edge in &write.derivatives {
            referenced.push(edge.parent_external_id.clone());
            referenced.push(edge.child_external_id.clone());
        }
        for metadatum in &write.metadata {
            referenced.push(metadatum.material_external_id.clone());
        }
        referenced.sort();
        referenced.dedup();

        let id_rows = sqlx::query("SELECT id, external_id FROM materials WHERE external_id = ANY($1)")
            .bind(&referenced)
            .fetch_all(&mut *tx)
            .await
            .context("Failed to map external ids")?;
        let ids_by_external: HashMap<String, Id> = id_rows
            .into_iter()
            .map(|row| (row.get("external_id"), row.get("id")))
            .collect();
        let id_of = |external_id: &str| -> Result<Id> {
            ids_by_external
                .get(external_id)
                .copied()
                .ok_or_else(|| anyhow!("material {} missing after upsert", external_id))
        };

        for metadatum in &write.metadata {
            match metadatum.id {
                Some(id) => {
                    sqlx::query("UPDATE metadata SET value = $1, updated_at = NOW() WHERE id = $2")
                        .bind(&metadatum.value)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to update metadatum")?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO metadata (material_id, key, value) VALUES ($1, $2, $3)",
                    )
                    .bind(id_of(&metadatum.material_external_id)?)
                    .bind(&metadatum.key)
                    .bind(&metadatum.value)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to insert metadatum")?;
                }
            }
        }

        for edge in &write.derivatives {
            sqlx::query(
                r#"
                INSERT INTO material_derivatives (parent_id, child_id)
                VALUES ($1, $2)
                ON CONFLICT (parent_id, child_id) DO NOTHING
                "#,
            )
            .bind(id_of(&edge.parent_external_id)?)
            .bind(id_of(&edge.child_external_id)?)
            .execute(&mut *tx)
            .await
            .context("Failed to insert derivative edge")?;
        }

        tx.commit().await.context("Failed to commit batch")?;

        // Reload outside the transaction, preserving input order.
        let mut reloaded: HashMap<String, Material> = self
            .find_materials_by_external_ids(&write.touched)
            .await?
            .into_iter()
            .map(|m| (m.external_id.clone(), m))
            .collect();

        Ok(write
            .touched
            .iter()
            .filter_map(|external_id| reloaded.remove(external_id))
            .collect())
    }
}

impl Store for PostgresStore {}
