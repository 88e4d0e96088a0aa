use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Materials
        .route(
            "/materials",
            get(handlers::list_materials::<S>).post(handlers::create_material::<S>),
        )
        .route(
            "/materials/:external_id",
            get(handlers::get_material::<S>).put(handlers::update_material::<S>),
        )
        // Batched create/update with all-or-nothing semantics
        .route(
            "/material_batches",
            post(handlers::create_material_batch::<S>),
        )
        // Material types - READ-ONLY (types are provisioned out of band)
        .route("/material_types", get(handlers::list_material_types::<S>))
        .route(
            "/material_types/:id",
            get(handlers::get_material_type::<S>),
        )
}
