use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallyerp_core::{
    DomainError, DomainResult, Entity, ProductId, PurchaseOrderId, PurchaseOrderItemId,
    SupplierId, UserId,
};

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Confirmed,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Confirmed => "confirmed",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled
        )
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(PurchaseOrderStatus::Draft),
            "confirmed" => Ok(PurchaseOrderStatus::Confirmed),
            "received" => Ok(PurchaseOrderStatus::Received),
            "cancelled" => Ok(PurchaseOrderStatus::Cancelled),
            other => Err(DomainError::invalid_argument(format!(
                "unknown purchase order status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub status: PurchaseOrderStatus,
    /// Sum of item `unit_price * quantity`, in minor currency units.
    pub total_amount: i64,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn ensure_draft(&self) -> DomainResult<()> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "purchase order {} is {}, items can only change while draft",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> PurchaseOrderId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: PurchaseOrderItemId,
    pub purchase_order_id: PurchaseOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
}

impl PurchaseOrderItem {
    pub fn line_total(&self) -> DomainResult<i64> {
        self.unit_price.checked_mul(self.quantity).ok_or_else(|| {
            DomainError::invalid_argument(format!("line total overflows for item {}", self.id))
        })
    }
}

impl Entity for PurchaseOrderItem {
    type Id = PurchaseOrderItemId;

    fn id(&self) -> PurchaseOrderItemId {
        self.id
    }
}

/// Order total over `items`; overflow is rejected rather than wrapped.
pub fn order_total<'a>(items: impl IntoIterator<Item = &'a PurchaseOrderItem>) -> DomainResult<i64> {
    items.into_iter().try_fold(0i64, |acc, item| {
        acc.checked_add(item.line_total()?)
            .ok_or_else(|| DomainError::invalid_argument("purchase order total overflows"))
    })
}

/// Caller-supplied line for creating or replacing an order's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Defaults to the product's cost price.
    #[serde(default)]
    pub unit_price: Option<i64>,
}

impl NewOrderLine {
    pub(crate) fn validate(&self) -> DomainResult<()> {
        validate_quantity(self.quantity)?;
        if let Some(price) = self.unit_price {
            if price < 0 {
                return Err(DomainError::invalid_argument(format!(
                    "unit_price cannot be negative, got {price}"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_quantity(quantity: i64) -> DomainResult<()> {
    if quantity < 1 {
        return Err(DomainError::invalid_argument(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}
