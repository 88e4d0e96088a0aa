pub mod batch;
pub mod builder;
pub mod lineage;
pub mod metadata_merge;
pub mod validate;

pub use batch::{process, BatchResult};
pub use builder::build_material;
pub use lineage::{resolve_parents, ResolutionScope, ResolvedLineage};
pub use validate::{validate_drafts, ErrorContext, ErrorMap};
