//! Service-level integration tests against the in-memory store.
//!
//! Verifies:
//! - Receiving a purchase order posts stock atomically with the status change
//! - DRAFT gating and total recomputation on item changes
//! - Stock ledger validation and derived levels
//! - Catalog and supplier uniqueness / referential conflicts
//! - Uncommitted units of work leave no trace

#[cfg(test)]
mod tests {
    use tallyerp_core::{
        DomainError, Pagination, ProductId, PurchaseOrderItemId, Store, SupplierId, UnitOfWork,
        UserId,
    };
    use tallyerp_inventory::{
        RecordAdjust, RecordIn, RecordOut, StockLedger, StockMovementFilter, StockReports,
        StockSummaryFilter, TransactionType,
    };
    use tallyerp_parties::{SupplierDirectory, SupplierDraft, SupplierRepository};
    use tallyerp_products::{
        Catalog, CategoryDraft, CategoryRepository, Product, ProductDraft, ProductFilter,
    };
    use tallyerp_purchasing::{
        NewOrderLine, PurchaseOrderLifecycle, PurchaseOrderStatus, RECEIPT_REASON,
    };

    use crate::{AnyStore, InMemoryStore};

    struct Fixture {
        store: InMemoryStore,
        catalog: Catalog<InMemoryStore>,
        suppliers: SupplierDirectory<InMemoryStore>,
        ledger: StockLedger<InMemoryStore>,
        reports: StockReports<InMemoryStore>,
        orders: PurchaseOrderLifecycle<InMemoryStore>,
        user: UserId,
    }

    fn setup() -> Fixture {
        let store = InMemoryStore::new();
        Fixture {
            catalog: Catalog::new(store.clone()),
            suppliers: SupplierDirectory::new(store.clone()),
            ledger: StockLedger::new(store.clone()),
            reports: StockReports::new(store.clone()),
            orders: PurchaseOrderLifecycle::new(store.clone()),
            store,
            user: UserId::new(),
        }
    }

    fn product_draft(code: &str, category_id: tallyerp_core::CategoryId) -> ProductDraft {
        ProductDraft {
            code: code.to_string(),
            name: format!("{code} name"),
            category_id,
            description: None,
            unit: None,
            cost_price: 7,
            selling_price: 12,
            min_stock: 3,
        }
    }

    fn supplier_draft(email: &str) -> SupplierDraft {
        SupplierDraft {
            name: "Acme Supplies".to_string(),
            email: email.to_string(),
            phone: None,
            address: None,
        }
    }

    /// Two products (A, B) in one category plus one supplier.
    async fn seed(f: &Fixture) -> (Product, Product, SupplierId) {
        let category = f
            .catalog
            .create_category(CategoryDraft {
                name: "Hardware".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let a = f
            .catalog
            .create_product(product_draft("A-001", category.id))
            .await
            .unwrap();
        let b = f
            .catalog
            .create_product(product_draft("B-001", category.id))
            .await
            .unwrap();
        let supplier = f
            .suppliers
            .create(supplier_draft("sales@acme.example"))
            .await
            .unwrap();
        (a, b, supplier.id)
    }

    fn line(product_id: ProductId, quantity: i64, unit_price: i64) -> NewOrderLine {
        NewOrderLine {
            product_id,
            quantity,
            unit_price: Some(unit_price),
        }
    }

    #[tokio::test]
    async fn receiving_an_order_posts_one_in_per_item() {
        let f = setup();
        let (a, b, supplier_id) = seed(&f).await;

        let detail = f
            .orders
            .create(
                supplier_id,
                vec![line(a.id, 5, 10), line(b.id, 2, 20)],
                None,
                f.user,
            )
            .await
            .unwrap();
        assert_eq!(detail.order.total_amount, 90);
        assert_eq!(detail.order.status, PurchaseOrderStatus::Draft);
        assert_eq!(detail.items.len(), 2);

        let received = f
            .orders
            .update_status(detail.order.id, PurchaseOrderStatus::Received, f.user)
            .await
            .unwrap();
        assert_eq!(received.status, PurchaseOrderStatus::Received);

        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 5);
        assert_eq!(f.ledger.current_stock(b.id).await.unwrap().current, 2);

        let reference = detail.order.id.to_string();
        let receipts = f
            .ledger
            .movements(
                &StockMovementFilter {
                    reference_id: Some(reference.clone()),
                    ..StockMovementFilter::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(receipts.total, 2);
        for t in &receipts.items {
            assert_eq!(t.kind, TransactionType::In);
            assert_eq!(t.reason.as_deref(), Some(RECEIPT_REASON));
            assert_eq!(t.reference_id.as_deref(), Some(reference.as_str()));
            assert_eq!(t.created_by, f.user);
        }
    }

    #[tokio::test]
    async fn failed_posting_rolls_back_the_whole_receipt() {
        let f = setup();
        let (a, b, supplier_id) = seed(&f).await;
        let detail = f
            .orders
            .create(
                supplier_id,
                vec![line(a.id, 5, 10), line(b.id, 2, 20)],
                None,
                f.user,
            )
            .await
            .unwrap();

        f.store.fail_stock_appends_after(1);
        let err = f
            .orders
            .update_status(detail.order.id, PurchaseOrderStatus::Received, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        f.store.clear_faults();

        let reloaded = f.orders.get(detail.order.id).await.unwrap();
        assert_eq!(reloaded.order.status, PurchaseOrderStatus::Draft);
        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 0);
        assert_eq!(f.ledger.current_stock(b.id).await.unwrap().current, 0);
        let all = f
            .ledger
            .movements(&StockMovementFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.total, 0);

        // The same transition succeeds once the fault is gone.
        f.orders
            .update_status(detail.order.id, PurchaseOrderStatus::Received, f.user)
            .await
            .unwrap();
        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 5);
    }

    #[tokio::test]
    async fn terminal_orders_cannot_change_status_again() {
        let f = setup();
        let (a, _, supplier_id) = seed(&f).await;
        let detail = f
            .orders
            .create(supplier_id, vec![line(a.id, 4, 1)], None, f.user)
            .await
            .unwrap();
        let id = detail.order.id;

        f.orders
            .update_status(id, PurchaseOrderStatus::Received, f.user)
            .await
            .unwrap();
        for next in [
            PurchaseOrderStatus::Received,
            PurchaseOrderStatus::Cancelled,
            PurchaseOrderStatus::Draft,
        ] {
            let err = f.orders.update_status(id, next, f.user).await.unwrap_err();
            assert!(matches!(err, DomainError::InvalidState(_)));
        }
        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 4);

        let cancelled = f
            .orders
            .create(supplier_id, vec![line(a.id, 1, 1)], None, f.user)
            .await
            .unwrap();
        f.orders
            .update_status(cancelled.order.id, PurchaseOrderStatus::Cancelled, f.user)
            .await
            .unwrap();
        let err = f
            .orders
            .update_status(cancelled.order.id, PurchaseOrderStatus::Received, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 4);
    }

    #[tokio::test]
    async fn concurrent_receipts_post_stock_once() {
        let f = setup();
        let (a, b, supplier_id) = seed(&f).await;
        let detail = f
            .orders
            .create(
                supplier_id,
                vec![line(a.id, 5, 10), line(b.id, 2, 20)],
                None,
                f.user,
            )
            .await
            .unwrap();
        let id = detail.order.id;

        let (first, second) = tokio::join!(
            f.orders.update_status(id, PurchaseOrderStatus::Received, f.user),
            f.orders.update_status(id, PurchaseOrderStatus::Received, f.user),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(DomainError::InvalidState(_))))
        );

        let receipts = f
            .ledger
            .movements(
                &StockMovementFilter {
                    reference_id: Some(id.to_string()),
                    ..StockMovementFilter::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(receipts.total, 2);
        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 5);
        assert_eq!(f.ledger.current_stock(b.id).await.unwrap().current, 2);
    }

    #[tokio::test]
    async fn non_draft_orders_reject_item_changes() {
        let f = setup();
        let (a, b, supplier_id) = seed(&f).await;
        let detail = f
            .orders
            .create(supplier_id, vec![line(a.id, 5, 10)], None, f.user)
            .await
            .unwrap();
        let id = detail.order.id;
        let item_id = detail.items[0].id;

        f.orders
            .update_status(id, PurchaseOrderStatus::Confirmed, f.user)
            .await
            .unwrap();

        let errors = vec![
            f.orders.add_item(id, b.id, 1).await.unwrap_err(),
            f.orders.update_item(item_id, 9).await.unwrap_err(),
            f.orders.delete_item(item_id).await.unwrap_err(),
            f.orders
                .update(id, supplier_id, vec![line(b.id, 1, 1)], None)
                .await
                .unwrap_err(),
        ];
        for err in errors {
            assert!(matches!(err, DomainError::InvalidState(_)), "{err:?}");
        }

        let reloaded = f.orders.get(id).await.unwrap();
        assert_eq!(reloaded.items, detail.items);
        assert_eq!(reloaded.order.total_amount, 50);
    }

    #[tokio::test]
    async fn item_changes_recompute_the_total() {
        let f = setup();
        let (a, b, supplier_id) = seed(&f).await;
        let detail = f
            .orders
            .create(supplier_id, vec![line(a.id, 5, 10)], None, f.user)
            .await
            .unwrap();
        let id = detail.order.id;

        // Priced at B's cost price (7).
        let added = f.orders.add_item(id, b.id, 3).await.unwrap();
        assert_eq!(added.unit_price, 7);
        assert_eq!(f.orders.get(id).await.unwrap().order.total_amount, 50 + 21);

        f.orders.update_item(added.id, 1).await.unwrap();
        assert_eq!(f.orders.get(id).await.unwrap().order.total_amount, 50 + 7);

        f.orders.delete_item(detail.items[0].id).await.unwrap();
        let reloaded = f.orders.get(id).await.unwrap();
        assert_eq!(reloaded.order.total_amount, 7);
        assert_eq!(reloaded.items.len(), 1);

        let replaced = f
            .orders
            .update(id, supplier_id, vec![line(a.id, 2, 4), line(b.id, 1, 1)], Some(" rush ".into()))
            .await
            .unwrap();
        assert_eq!(replaced.order.total_amount, 9);
        assert_eq!(replaced.order.notes.as_deref(), Some("rush"));
        assert_eq!(f.orders.get(id).await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn order_validation_errors() {
        let f = setup();
        let (a, _, supplier_id) = seed(&f).await;

        let err = f
            .orders
            .create(SupplierId::new(), vec![line(a.id, 1, 1)], None, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = f
            .orders
            .create(supplier_id, vec![line(ProductId::new(), 1, 1)], None, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = f
            .orders
            .create(supplier_id, vec![line(a.id, 0, 1)], None, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        let err = f
            .orders
            .create(supplier_id, vec![line(a.id, 2, i64::MAX)], None, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        let err = f
            .orders
            .update_item(PurchaseOrderItemId::new(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let page = f
            .orders
            .search(&Default::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn record_out_without_stock_goes_negative() {
        let f = setup();
        let (a, _, _) = seed(&f).await;

        f.ledger
            .record_out(RecordOut {
                product_id: a.id,
                quantity: 3,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap();

        let level = f.ledger.current_stock(a.id).await.unwrap();
        assert_eq!(level.total_out, 3);
        assert_eq!(level.current, -3);
    }

    #[tokio::test]
    async fn postings_that_would_overflow_stock_totals_are_refused() {
        let f = setup();
        let (a, _, supplier_id) = seed(&f).await;
        let stock_in = |quantity| RecordIn {
            product_id: a.id,
            quantity,
            reason: None,
            reference_id: None,
            created_by: f.user,
        };

        f.ledger.record_in(stock_in(i64::MAX)).await.unwrap();
        let err = f.ledger.record_in(stock_in(1)).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        let err = f
            .ledger
            .record_adjust(RecordAdjust {
                product_id: a.id,
                quantity: 1,
                reason: "count".to_string(),
                created_by: f.user,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        // The refused entries were never written; the level stays readable.
        let level = f.ledger.current_stock(a.id).await.unwrap();
        assert_eq!(level.total_in, i64::MAX);
        assert_eq!(level.current, i64::MAX);
        let movements = f
            .ledger
            .movements(&StockMovementFilter::for_product(a.id), Pagination::default())
            .await
            .unwrap();
        assert_eq!(movements.total, 1);

        // Receiving is refused as a whole and the order stays DRAFT.
        let detail = f
            .orders
            .create(supplier_id, vec![line(a.id, 1, 0)], None, f.user)
            .await
            .unwrap();
        let err = f
            .orders
            .update_status(detail.order.id, PurchaseOrderStatus::Received, f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        let order = f.orders.get(detail.order.id).await.unwrap();
        assert_eq!(order.order.status, PurchaseOrderStatus::Draft);

        let rows = f
            .reports
            .stock_summary(&StockSummaryFilter::default())
            .await
            .unwrap();
        assert_eq!(rows[0].current_stock, i64::MAX);

        f.ledger
            .record_out(RecordOut {
                product_id: a.id,
                quantity: i64::MAX,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap();
        assert_eq!(f.ledger.current_stock(a.id).await.unwrap().current, 0);
    }

    #[tokio::test]
    async fn ledger_validates_quantities_reasons_and_products() {
        let f = setup();
        let (a, _, _) = seed(&f).await;

        let zero_in = f
            .ledger
            .record_in(RecordIn {
                product_id: a.id,
                quantity: 0,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap_err();
        assert!(matches!(zero_in, DomainError::InvalidArgument(_)));

        let negative_out = f
            .ledger
            .record_out(RecordOut {
                product_id: a.id,
                quantity: -1,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap_err();
        assert!(matches!(negative_out, DomainError::InvalidArgument(_)));

        let zero_adjust = f
            .ledger
            .record_adjust(RecordAdjust {
                product_id: a.id,
                quantity: 0,
                reason: "count".to_string(),
                created_by: f.user,
            })
            .await
            .unwrap_err();
        assert!(matches!(zero_adjust, DomainError::InvalidArgument(_)));

        let blank_reason = f
            .ledger
            .record_adjust(RecordAdjust {
                product_id: a.id,
                quantity: 2,
                reason: "   ".to_string(),
                created_by: f.user,
            })
            .await
            .unwrap_err();
        assert!(matches!(blank_reason, DomainError::InvalidArgument(_)));

        let unknown = f
            .ledger
            .record_in(RecordIn {
                product_id: ProductId::new(),
                quantity: 1,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap_err();
        assert!(matches!(unknown, DomainError::NotFound(_)));

        let err = f.ledger.current_stock(ProductId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let none = f
            .ledger
            .movements(&StockMovementFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn derived_stock_sums_each_type() {
        let f = setup();
        let (a, b, _) = seed(&f).await;

        f.ledger
            .record_in(RecordIn {
                product_id: a.id,
                quantity: 10,
                reason: None,
                reference_id: Some("GRN-7".to_string()),
                created_by: f.user,
            })
            .await
            .unwrap();
        f.ledger
            .record_out(RecordOut {
                product_id: a.id,
                quantity: 4,
                reason: Some("sold".to_string()),
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap();
        let adjust = f
            .ledger
            .record_adjust(RecordAdjust {
                product_id: a.id,
                quantity: -2,
                reason: " damaged ".to_string(),
                created_by: f.user,
            })
            .await
            .unwrap();
        assert_eq!(adjust.reason.as_deref(), Some("damaged"));

        let level = f.ledger.current_stock(a.id).await.unwrap();
        assert_eq!((level.total_in, level.total_out, level.total_adjust), (10, 4, -2));
        assert_eq!(level.current, 4);
        assert_eq!(f.ledger.current_stock(b.id).await.unwrap().current, 0);

        let newest_first = f
            .ledger
            .movements(&StockMovementFilter::for_product(a.id), Pagination::new(Some(2), None))
            .await
            .unwrap();
        assert_eq!(newest_first.total, 3);
        assert!(newest_first.has_more);
        assert_eq!(newest_first.items[0].kind, TransactionType::Adjust);
        assert_eq!(newest_first.items[1].kind, TransactionType::Out);
    }

    #[tokio::test]
    async fn reports_flag_low_stock_and_join_product_names() {
        let f = setup();
        let (a, b, _) = seed(&f).await;

        f.ledger
            .record_in(RecordIn {
                product_id: a.id,
                quantity: 10,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap();
        f.ledger
            .record_in(RecordIn {
                product_id: b.id,
                quantity: 1,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap();

        let summary = f
            .reports
            .stock_summary(&StockSummaryFilter::default())
            .await
            .unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].code, "A-001");
        assert_eq!(summary[0].current_stock, 10);
        assert!(!summary[0].low_stock);
        assert_eq!(summary[0].category_name.as_deref(), Some("Hardware"));
        assert!(summary[1].low_stock);

        let low = f
            .reports
            .stock_summary(&StockSummaryFilter {
                category_id: None,
                low_stock_only: true,
            })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, b.id);

        let movements = f
            .reports
            .movement_report(&StockMovementFilter::default())
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].product_code, "A-001");
        assert_eq!(movements[1].product_name, "B-001 name");
    }

    #[tokio::test]
    async fn catalog_and_supplier_conflicts() {
        let f = setup();
        let (a, _, supplier_id) = seed(&f).await;

        let err = f
            .catalog
            .create_category(CategoryDraft {
                name: "Hardware".to_string(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = f
            .catalog
            .create_product(product_draft("A-001", a.category_id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = f
            .catalog
            .create_product(product_draft("Z-001", tallyerp_core::CategoryId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = f
            .suppliers
            .create(supplier_draft("SALES@Acme.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = f.catalog.delete_category(a.category_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        f.ledger
            .record_in(RecordIn {
                product_id: a.id,
                quantity: 1,
                reason: None,
                reference_id: None,
                created_by: f.user,
            })
            .await
            .unwrap();
        let err = f.catalog.delete_product(a.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        f.orders
            .create(supplier_id, vec![], None, f.user)
            .await
            .unwrap();
        let err = f.suppliers.delete(supplier_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn unused_records_can_be_deleted() {
        let f = setup();
        let (_, b, _) = seed(&f).await;

        f.catalog.delete_product(b.id).await.unwrap();
        let err = f.catalog.get_product(b.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let other = f.suppliers.create(supplier_draft("ops@other.example")).await.unwrap();
        f.suppliers.delete(other.id).await.unwrap();

        let page = f
            .catalog
            .search_products(&ProductFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn dropped_unit_of_work_leaves_no_trace() {
        let store = InMemoryStore::new();
        let now = chrono::Utc::now();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_category(&tallyerp_products::Category {
                id: tallyerp_core::CategoryId::new(),
                name: "Ghost".to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
            assert_eq!(tx.list_categories().await.unwrap().len(), 1);
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_categories().await.unwrap().is_empty());
        assert!(tx.find_supplier_by_email("x@y.example").await.unwrap().is_none());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn any_store_runs_the_same_services() {
        let store = AnyStore::from(InMemoryStore::new());
        assert_eq!(store.backend(), "in_memory");

        let catalog = Catalog::new(store.clone());
        let ledger = StockLedger::new(store.clone());
        let category = catalog
            .create_category(CategoryDraft {
                name: "Tools".to_string(),
                description: Some("hand tools".to_string()),
            })
            .await
            .unwrap();
        let product = catalog
            .create_product(product_draft("T-1", category.id))
            .await
            .unwrap();
        ledger
            .record_in(RecordIn {
                product_id: product.id,
                quantity: 6,
                reason: None,
                reference_id: None,
                created_by: UserId::new(),
            })
            .await
            .unwrap();
        assert_eq!(ledger.current_stock(product.id).await.unwrap().current, 6);
    }
}
