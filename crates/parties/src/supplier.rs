use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallyerp_core::error::require_non_blank;
use tallyerp_core::{DomainError, DomainResult, Entity, Page, Pagination, SupplierId};

/// A supplier. Email addresses are unique (compared case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> SupplierId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl SupplierDraft {
    pub(crate) fn validated(self) -> DomainResult<Self> {
        let email = require_non_blank("email", &self.email)?.to_lowercase();
        if !looks_like_email(&email) {
            return Err(DomainError::invalid_argument(format!(
                "'{email}' is not a valid email address"
            )));
        }

        Ok(Self {
            name: require_non_blank("name", &self.name)?,
            email,
            phone: trim_optional(self.phone),
            address: trim_optional(self.address),
        })
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Shape check only: one '@', non-empty local part, dotted domain.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Typed supplier search criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierFilter {
    /// Case-insensitive substring match on name or email.
    pub text: Option<String>,
}

impl SupplierFilter {
    pub fn matches(&self, supplier: &Supplier) -> bool {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let needle = text.to_lowercase();
                supplier.name.to_lowercase().contains(&needle)
                    || supplier.email.contains(&needle)
            }
            _ => true,
        }
    }
}

/// Persistence port for suppliers.
#[async_trait]
pub trait SupplierRepository: Send {
    async fn insert_supplier(&mut self, supplier: &Supplier) -> DomainResult<()>;

    async fn update_supplier(&mut self, supplier: &Supplier) -> DomainResult<()>;

    async fn delete_supplier(&mut self, id: SupplierId) -> DomainResult<bool>;

    async fn find_supplier(&mut self, id: SupplierId) -> DomainResult<Option<Supplier>>;

    /// `email` is already lower-cased.
    async fn find_supplier_by_email(&mut self, email: &str) -> DomainResult<Option<Supplier>>;

    /// Matching suppliers ordered by name.
    async fn search_suppliers(
        &mut self,
        filter: &SupplierFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Supplier>>;

    /// Whether any purchase order references the supplier.
    async fn supplier_in_use(&mut self, id: SupplierId) -> DomainResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(email: &str) -> SupplierDraft {
        SupplierDraft {
            name: "Acme Fasteners".to_string(),
            email: email.to_string(),
            phone: Some("  ".to_string()),
            address: None,
        }
    }

    #[test]
    fn email_is_lowercased_and_blank_phone_dropped() {
        let d = draft(" Sales@Acme.Example ").validated().unwrap();
        assert_eq!(d.email, "sales@acme.example");
        assert_eq!(d.phone, None);
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "acme", "@acme.example", "sales@acme", "sales@@acme.example", "a b@acme.example", "sales@.example"] {
            assert!(
                matches!(draft(bad).validated(), Err(DomainError::InvalidArgument(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn filter_matches_name_or_email() {
        let now = Utc::now();
        let s = Supplier {
            id: SupplierId::new(),
            name: "Acme Fasteners".to_string(),
            email: "sales@acme.example".to_string(),
            phone: None,
            address: None,
            created_at: now,
            updated_at: now,
        };
        assert!(SupplierFilter { text: Some("FASTEN".into()) }.matches(&s));
        assert!(SupplierFilter { text: Some("sales@".into()) }.matches(&s));
        assert!(!SupplierFilter { text: Some("globex".into()) }.matches(&s));
    }
}
