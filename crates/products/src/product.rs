use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallyerp_core::error::require_non_blank;
use tallyerp_core::{CategoryId, DomainError, DomainResult, Entity, ProductId};

use crate::category::normalize_optional;

/// Unit of measure used when a product is created without one.
pub const DEFAULT_UNIT: &str = "pcs";

/// A stocked product.
///
/// Stock on hand is deliberately absent: it is derived from the stock
/// transaction log by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique product code (SKU).
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    pub description: Option<String>,
    pub unit: String,
    /// Purchase price in minor currency units.
    pub cost_price: i64,
    /// Sale price in minor currency units.
    pub selling_price: i64,
    /// Reorder threshold; the stock summary flags products below it.
    pub min_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

/// Caller-supplied fields for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub cost_price: i64,
    pub selling_price: i64,
    #[serde(default)]
    pub min_stock: i64,
}

impl ProductDraft {
    pub(crate) fn validated(self) -> DomainResult<Self> {
        if self.cost_price < 0 {
            return Err(DomainError::invalid_argument("cost_price cannot be negative"));
        }
        if self.selling_price < 0 {
            return Err(DomainError::invalid_argument(
                "selling_price cannot be negative",
            ));
        }
        if self.min_stock < 0 {
            return Err(DomainError::invalid_argument("min_stock cannot be negative"));
        }

        Ok(Self {
            code: require_non_blank("code", &self.code)?,
            name: require_non_blank("name", &self.name)?,
            category_id: self.category_id,
            description: normalize_optional(self.description),
            unit: Some(normalize_optional(self.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string())),
            cost_price: self.cost_price,
            selling_price: self.selling_price,
            min_stock: self.min_stock,
        })
    }

    /// Build a product from an already-validated draft.
    pub(crate) fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            code: self.code,
            name: self.name,
            category_id: self.category_id,
            description: self.description,
            unit: self.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            cost_price: self.cost_price,
            selling_price: self.selling_price,
            min_stock: self.min_stock,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            code: " BOLT-M8 ".to_string(),
            name: "M8 bolt".to_string(),
            category_id: CategoryId::new(),
            description: None,
            unit: None,
            cost_price: 12,
            selling_price: 20,
            min_stock: 100,
        }
    }

    #[test]
    fn validated_draft_gets_default_unit_and_trimmed_code() {
        let d = draft().validated().unwrap();
        assert_eq!(d.code, "BOLT-M8");
        assert_eq!(d.unit.as_deref(), Some(DEFAULT_UNIT));
    }

    #[test]
    fn into_product_keeps_creation_time() {
        let created_at = Utc::now() - chrono::Duration::days(3);
        let id = ProductId::new();
        let p = draft().validated().unwrap().into_product(id, created_at);
        assert_eq!(p.id, id);
        assert_eq!(p.created_at, created_at);
        assert!(p.updated_at >= created_at);
    }

    #[test]
    fn blank_code_is_rejected() {
        let mut d = draft();
        d.code = "   ".to_string();
        assert!(matches!(d.validated(), Err(DomainError::InvalidArgument(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any negative price or threshold is rejected, any
        /// non-negative combination is accepted unchanged.
        #[test]
        fn numeric_fields_must_be_non_negative(
            cost in -1_000i64..1_000,
            sell in -1_000i64..1_000,
            min in -1_000i64..1_000,
        ) {
            let mut d = draft();
            d.cost_price = cost;
            d.selling_price = sell;
            d.min_stock = min;

            let result = d.validated();
            if cost < 0 || sell < 0 || min < 0 {
                prop_assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
            } else {
                let v = result.unwrap();
                prop_assert_eq!(v.cost_price, cost);
                prop_assert_eq!(v.selling_price, sell);
                prop_assert_eq!(v.min_stock, min);
            }
        }
    }
}
