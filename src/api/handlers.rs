use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logic::{batch, ErrorContext, ErrorMap};
use crate::model::{
    BatchEnvelope, Id, Material, MaterialEnvelope, MaterialFilter, MaterialType,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

/// Serialized material: external UUID as the wire id, resolved type,
/// metadata in storage order, lineage as external ids.
#[derive(Debug, Serialize)]
pub struct MaterialResponse {
    pub id: String,
    pub name: String,
    pub material_type: MaterialTypeResponse,
    pub metadata: Vec<MetadatumResponse>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MaterialTypeResponse {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MetadatumResponse {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub materials: Vec<MaterialResponse>,
}

impl From<Material> for MaterialResponse {
    fn from(material: Material) -> Self {
        Self {
            id: material.external_id,
            name: material.name,
            material_type: MaterialTypeResponse {
                id: material.material_type.id,
                name: material.material_type.name,
            },
            metadata: material
                .metadata
                .into_iter()
                .map(|m| MetadatumResponse {
                    key: m.key,
                    value: m.value,
                })
                .collect(),
            parents: material.parents,
            children: material.children,
            created_at: material.created_at.to_rfc3339(),
        }
    }
}

impl From<MaterialType> for MaterialTypeResponse {
    fn from(material_type: MaterialType) -> Self {
        Self {
            id: material_type.id,
            name: material_type.name,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("validation failed")]
    Validation(ErrorMap),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(&message))).into_response()
            }
            ApiError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(errors)).into_response()
            }
            ApiError::Internal(err) => {
                log::error!("internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("internal server error")),
                )
                    .into_response()
            }
        }
    }
}

/// A write that passed in-memory validation but failed at commit time (e.g.
/// a uniqueness race) has already rolled back; report it in the error-map
/// shape rather than as a server fault.
fn commit_failure(err: anyhow::Error) -> ApiError {
    log::warn!("batch commit failed: {:#}", err);
    let mut errors = ErrorMap::default();
    errors.add("base", format!("{}", err));
    ApiError::Validation(errors)
}

#[derive(Debug, Deserialize)]
pub struct MaterialListQuery {
    pub name: Option<String>,
    pub material_type: Option<String>,
    pub created_before: Option<String>,
    pub created_after: Option<String>,
}

fn parse_timestamp(field: &str, value: &Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
            Err(_) => {
                let mut errors = ErrorMap::default();
                errors.add(field, format!("({}) is not a valid ISO-8601 timestamp", raw));
                Err(ApiError::Validation(errors))
            }
        },
    }
}

// GET /materials
pub async fn list_materials<S: Store>(
    State(store): State<AppState<S>>,
    Query(query): Query<MaterialListQuery>,
) -> Result<Json<ListResponse<MaterialResponse>>, ApiError> {
    let filter = MaterialFilter {
        name: query.name,
        material_type: query.material_type,
        created_before: parse_timestamp("created_before", &query.created_before)?,
        created_after: parse_timestamp("created_after", &query.created_after)?,
    };
    let filter = if filter.is_empty() { None } else { Some(filter) };

    let materials = store.list_materials(filter).await?;
    let items: Vec<MaterialResponse> = materials.into_iter().map(Into::into).collect();
    let total = items.len();

    Ok(Json(ListResponse { items, total }))
}

// GET /materials/:external_id
pub async fn get_material<S: Store>(
    State(store): State<AppState<S>>,
    Path(external_id): Path<String>,
) -> Result<Json<MaterialResponse>, ApiError> {
    match store.get_material(&external_id).await? {
        Some(material) => Ok(Json(material.into())),
        None => Err(ApiError::NotFound(format!(
            "Material '{}' not found",
            external_id
        ))),
    }
}

// POST /materials
pub async fn create_material<S: Store>(
    State(store): State<AppState<S>>,
    Json(envelope): Json<MaterialEnvelope>,
) -> Result<(StatusCode, Json<MaterialResponse>), ApiError> {
    let mut spec = envelope.data;
    // A bare creation never refers to an existing row; client-supplied ids
    // arrive through the external_id attribute.
    spec.id = None;

    match batch::process(&*store, &[spec], ErrorContext::Single).await {
        Ok(batch::BatchResult::Committed(mut materials)) => {
            let material = materials
                .pop()
                .ok_or_else(|| anyhow::anyhow!("commit returned no material"))?;
            Ok((StatusCode::CREATED, Json(material.into())))
        }
        Ok(batch::BatchResult::Invalid(errors)) => Err(ApiError::Validation(errors)),
        Ok(batch::BatchResult::CommitFailed(err)) => Err(commit_failure(err)),
        Err(err) => Err(ApiError::Internal(err)),
    }
}

// PUT /materials/:external_id
pub async fn update_material<S: Store>(
    State(store): State<AppState<S>>,
    Path(external_id): Path<String>,
    Json(envelope): Json<MaterialEnvelope>,
) -> Result<Json<MaterialResponse>, ApiError> {
    if store.get_material(&external_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Material '{}' not found",
            external_id
        )));
    }

    let mut spec = envelope.data;
    spec.id = Some(external_id);

    match batch::process(&*store, &[spec], ErrorContext::Single).await {
        Ok(batch::BatchResult::Committed(mut materials)) => {
            let material = materials
                .pop()
                .ok_or_else(|| anyhow::anyhow!("commit returned no material"))?;
            Ok(Json(material.into()))
        }
        Ok(batch::BatchResult::Invalid(errors)) => Err(ApiError::Validation(errors)),
        Ok(batch::BatchResult::CommitFailed(err)) => Err(commit_failure(err)),
        Err(err) => Err(ApiError::Internal(err)),
    }
}

// POST /material_batches
pub async fn create_material_batch<S: Store>(
    State(store): State<AppState<S>>,
    Json(envelope): Json<BatchEnvelope>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let specs = envelope.material_specs();

    match batch::process(&*store, &specs, ErrorContext::Batch).await {
        Ok(batch::BatchResult::Committed(materials)) => Ok((
            StatusCode::CREATED,
            Json(BatchResponse {
                materials: materials.into_iter().map(Into::into).collect(),
            }),
        )),
        Ok(batch::BatchResult::Invalid(errors)) => Err(ApiError::Validation(errors)),
        Ok(batch::BatchResult::CommitFailed(err)) => Err(commit_failure(err)),
        Err(err) => Err(ApiError::Internal(err)),
    }
}

// GET /material_types
pub async fn list_material_types<S: Store>(
    State(store): State<AppState<S>>,
) -> Result<Json<ListResponse<MaterialTypeResponse>>, ApiError> {
    let types = store.list_material_types().await?;
    let items: Vec<MaterialTypeResponse> = types.into_iter().map(Into::into).collect();
    let total = items.len();

    Ok(Json(ListResponse { items, total }))
}

// GET /material_types/:id
pub async fn get_material_type<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<MaterialTypeResponse>, ApiError> {
    match store.get_material_type(id).await? {
        Some(material_type) => Ok(Json(material_type.into())),
        None => Err(ApiError::NotFound(format!(
            "Material type '{}' not found",
            id
        ))),
    }
}
