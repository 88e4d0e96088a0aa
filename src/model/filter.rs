use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Predicates supported by the materials listing. All bounds are inclusive;
/// `material_type` matches by type name and an unknown name matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
}

impl MaterialFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.material_type.is_none()
            && self.created_before.is_none()
            && self.created_after.is_none()
    }
}
