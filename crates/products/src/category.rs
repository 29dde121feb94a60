use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallyerp_core::error::require_non_blank;
use tallyerp_core::{CategoryId, DomainResult, Entity};

/// Product category. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }
}

/// Caller-supplied fields for creating or replacing a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryDraft {
    pub(crate) fn validated(self) -> DomainResult<Self> {
        Ok(Self {
            name: require_non_blank("name", &self.name)?,
            description: normalize_optional(self.description),
        })
    }
}

/// Trim optional free text, collapsing blank values to `None`.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
