//! Store selection and the services shared by every handler.

use tallyerp_core::DomainResult;
use tallyerp_infra::{AnyStore, InMemoryStore, PostgresStore};
use tallyerp_inventory::{StockLedger, StockReports};
use tallyerp_parties::SupplierDirectory;
use tallyerp_products::Catalog;
use tallyerp_purchasing::PurchaseOrderLifecycle;

use crate::config::StorageConfig;

/// Domain services over one shared store.
pub struct AppServices {
    store: AnyStore,
    pub catalog: Catalog<AnyStore>,
    pub suppliers: SupplierDirectory<AnyStore>,
    pub ledger: StockLedger<AnyStore>,
    pub reports: StockReports<AnyStore>,
    pub orders: PurchaseOrderLifecycle<AnyStore>,
}

impl AppServices {
    pub fn new(store: AnyStore) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            suppliers: SupplierDirectory::new(store.clone()),
            ledger: StockLedger::new(store.clone()),
            reports: StockReports::new(store.clone()),
            orders: PurchaseOrderLifecycle::new(store.clone()),
            store,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }
}

/// Open the configured store (migrating Postgres) and wire the services.
pub async fn build_services(storage: &StorageConfig) -> DomainResult<AppServices> {
    let store = match storage {
        StorageConfig::InMemory => AnyStore::from(InMemoryStore::new()),
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStore::connect(database_url, *max_connections).await?;
            store.migrate().await?;
            AnyStore::from(store)
        }
    };
    Ok(AppServices::new(store))
}
