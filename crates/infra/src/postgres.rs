//! Postgres-backed unit-of-work implementation.
//!
//! Each unit of work wraps one `sqlx::Transaction`. Dropping it without
//! committing rolls the transaction back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | DomainError |
//! |------------|----------------------|-------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (other) | Any other | `Internal` |
//! | Any other | N/A | `Internal` |

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use tallyerp_core::{
    CategoryId, DomainError, DomainResult, Page, Pagination, ProductId, PurchaseOrderId,
    PurchaseOrderItemId, StockTransactionId, Store, SupplierId, UnitOfWork, UserId,
};
use tallyerp_inventory::{
    StockMovementFilter, StockRepository, StockTotals, StockTransaction, TransactionType,
};
use tallyerp_parties::{Supplier, SupplierFilter, SupplierRepository};
use tallyerp_products::{
    Category, CategoryRepository, Product, ProductFilter, ProductRepository,
};
use tallyerp_purchasing::{
    PurchaseOrder, PurchaseOrderFilter, PurchaseOrderItem, PurchaseOrderRepository,
    PurchaseOrderStatus,
};

/// Postgres store backed by a connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool of at most `max_connections` connections.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::internal(format!("schema migration failed: {e}")))?;
        tracing::info!("database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> DomainResult<PostgresTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTx { tx })
    }
}

/// One open database transaction.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresTx {
    async fn commit(self) -> DomainResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> DomainResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => DomainError::Conflict(msg),
                _ => DomainError::Internal(msg),
            }
        }
        other => DomainError::Internal(format!("database error in {operation}: {other}")),
    }
}

fn like_pattern(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{t}%"))
}

fn limit_offset(pagination: Pagination) -> (i64, i64) {
    (i64::from(pagination.limit), i64::from(pagination.offset))
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        category_id: CategoryId::from_uuid(row.try_get("category_id")?),
        description: row.try_get("description")?,
        unit: row.try_get("unit")?,
        cost_price: row.try_get("cost_price")?,
        selling_price: row.try_get("selling_price")?,
        min_stock: row.try_get("min_stock")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, sqlx::Error> {
    Ok(Supplier {
        id: SupplierId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> DomainResult<StockTransaction> {
    let decode = |e| map_sqlx_error("decode stock transaction", e);
    let kind: String = row.try_get("type").map_err(decode)?;
    Ok(StockTransaction {
        id: StockTransactionId::from_uuid(row.try_get("id").map_err(decode)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(decode)?),
        kind: kind.parse()?,
        quantity: row.try_get("quantity").map_err(decode)?,
        reason: row.try_get("reason").map_err(decode)?,
        reference_id: row.try_get("reference_id").map_err(decode)?,
        created_by: UserId::from_uuid(row.try_get("created_by").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn order_from_row(row: &PgRow) -> DomainResult<PurchaseOrder> {
    let decode = |e| map_sqlx_error("decode purchase order", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(PurchaseOrder {
        id: PurchaseOrderId::from_uuid(row.try_get("id").map_err(decode)?),
        supplier_id: SupplierId::from_uuid(row.try_get("supplier_id").map_err(decode)?),
        status: status.parse::<PurchaseOrderStatus>()?,
        total_amount: row.try_get("total_amount").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        created_by: UserId::from_uuid(row.try_get("created_by").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<PurchaseOrderItem, sqlx::Error> {
    Ok(PurchaseOrderItem {
        id: PurchaseOrderItemId::from_uuid(row.try_get("id")?),
        purchase_order_id: PurchaseOrderId::from_uuid(row.try_get("purchase_order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
    })
}

/// Decode every row with `f`, mapping decode failures like query failures.
fn decode_all<T>(
    operation: &str,
    rows: Vec<PgRow>,
    f: impl Fn(&PgRow) -> Result<T, sqlx::Error>,
) -> DomainResult<Vec<T>> {
    rows.iter()
        .map(|row| f(row).map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, code, name, category_id, description, unit, cost_price, \
     selling_price, min_stock, created_at, updated_at";

const SUPPLIER_COLUMNS: &str = "id, name, email, phone, address, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, product_id, type, quantity, reason, reference_id, created_by, created_at";

const ORDER_COLUMNS: &str =
    "id, supplier_id, status, total_amount, notes, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, purchase_order_id, product_id, quantity, unit_price";

#[async_trait]
impl CategoryRepository for PostgresTx {
    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&mut self, category: &Category) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn update_category(&mut self, category: &Category) -> DomainResult<()> {
        sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, description = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_category", e))?;
        Ok(())
    }

    async fn delete_category(&mut self, id: CategoryId) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_category(&mut self, id: CategoryId) -> DomainResult<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_category", e))?;
        row.as_ref()
            .map(category_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_category", e))
    }

    async fn find_category_by_name(&mut self, name: &str) -> DomainResult<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_category_by_name", e))?;
        row.as_ref()
            .map(category_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_category_by_name", e))
    }

    async fn list_categories(&mut self) -> DomainResult<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        decode_all("list_categories", rows, category_from_row)
    }
}

#[async_trait]
impl ProductRepository for PostgresTx {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&mut self, product: &Product) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, category_id, description, unit,
                cost_price, selling_price, min_stock, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.category_id.as_uuid())
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.cost_price)
        .bind(product.selling_price)
        .bind(product.min_stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn update_product(&mut self, product: &Product) -> DomainResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET code = $2, name = $3, category_id = $4, description = $5, unit = $6,
                cost_price = $7, selling_price = $8, min_stock = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.category_id.as_uuid())
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.cost_price)
        .bind(product.selling_price)
        .bind(product.min_stock)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_product(&mut self, id: ProductId) -> DomainResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;
        row.as_ref()
            .map(product_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_product", e))
    }

    async fn find_product_by_code(&mut self, code: &str) -> DomainResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product_by_code", e))?;
        row.as_ref()
            .map(product_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_product_by_code", e))
    }

    #[instrument(skip(self), err)]
    async fn search_products(
        &mut self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Product>> {
        let category = filter.category_id.map(Uuid::from);
        let pattern = like_pattern(&filter.text);
        let (limit, offset) = limit_offset(pagination);

        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR category_id = $1)
              AND ($2::text IS NULL OR code ILIKE $2 OR name ILIKE $2)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM products {where_clause}"))
            .bind(category)
            .bind(&pattern)
            .fetch_one(&mut *self.tx)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("search_products", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {where_clause} ORDER BY code ASC LIMIT $3 OFFSET $4"
        ))
        .bind(category)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("search_products", e))?;

        let items = decode_all("search_products", rows, product_from_row)?;
        Ok(Page::new(items, total as u64, pagination))
    }

    async fn count_products_in_category(&mut self, id: CategoryId) -> DomainResult<u64> {
        let total: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM products WHERE category_id = $1")
                .bind(id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await
                .and_then(|row| row.try_get("total"))
                .map_err(|e| map_sqlx_error("count_products_in_category", e))?;
        Ok(total as u64)
    }

    async fn product_in_use(&mut self, id: ProductId) -> DomainResult<bool> {
        sqlx::query(
            r#"
            SELECT EXISTS (SELECT 1 FROM stock_transactions WHERE product_id = $1)
                OR EXISTS (SELECT 1 FROM purchase_order_items WHERE product_id = $1)
                AS in_use
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .and_then(|row| row.try_get("in_use"))
        .map_err(|e| map_sqlx_error("product_in_use", e))
    }
}

#[async_trait]
impl SupplierRepository for PostgresTx {
    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn insert_supplier(&mut self, supplier: &Supplier) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, email, phone, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn update_supplier(&mut self, supplier: &Supplier) -> DomainResult<()> {
        sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $2, email = $3, phone = $4, address = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(supplier.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_supplier", e))?;
        Ok(())
    }

    async fn delete_supplier(&mut self, id: SupplierId) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_supplier", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_supplier(&mut self, id: SupplierId) -> DomainResult<Option<Supplier>> {
        let row = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_supplier", e))?;
        row.as_ref()
            .map(supplier_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_supplier", e))
    }

    async fn find_supplier_by_email(&mut self, email: &str) -> DomainResult<Option<Supplier>> {
        let row = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_supplier_by_email", e))?;
        row.as_ref()
            .map(supplier_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_supplier_by_email", e))
    }

    #[instrument(skip(self), err)]
    async fn search_suppliers(
        &mut self,
        filter: &SupplierFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Supplier>> {
        let pattern = like_pattern(&filter.text);
        let (limit, offset) = limit_offset(pagination);
        let where_clause = "WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)";

        let total: i64 =
            sqlx::query(&format!("SELECT COUNT(*) AS total FROM suppliers {where_clause}"))
                .bind(&pattern)
                .fetch_one(&mut *self.tx)
                .await
                .and_then(|row| row.try_get("total"))
                .map_err(|e| map_sqlx_error("search_suppliers", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers {where_clause} ORDER BY name ASC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("search_suppliers", e))?;

        let items = decode_all("search_suppliers", rows, supplier_from_row)?;
        Ok(Page::new(items, total as u64, pagination))
    }

    async fn supplier_in_use(&mut self, id: SupplierId) -> DomainResult<bool> {
        sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM purchase_orders WHERE supplier_id = $1) AS in_use",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .and_then(|row| row.try_get("in_use"))
        .map_err(|e| map_sqlx_error("supplier_in_use", e))
    }
}

const MOVEMENT_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR product_id = $1)
      AND ($2::text IS NULL OR type = $2)
      AND ($3::text IS NULL OR reference_id = $3)
      AND ($4::timestamptz IS NULL OR created_at >= $4)
      AND ($5::timestamptz IS NULL OR created_at <= $5)
"#;

fn totals_from_row(row: &PgRow) -> Result<StockTotals, sqlx::Error> {
    Ok(StockTotals {
        total_in: row.try_get("total_in")?,
        total_out: row.try_get("total_out")?,
        total_adjust: row.try_get("total_adjust")?,
    })
}

// SUM(bigint) is numeric in Postgres; cast back so it decodes as i64.
const TOTALS_SELECT: &str = r#"
    COALESCE(SUM(quantity) FILTER (WHERE type = 'in'), 0)::bigint AS total_in,
    COALESCE(SUM(quantity) FILTER (WHERE type = 'out'), 0)::bigint AS total_out,
    COALESCE(SUM(quantity) FILTER (WHERE type = 'adjust'), 0)::bigint AS total_adjust
"#;

#[async_trait]
impl StockRepository for PostgresTx {
    #[instrument(
        skip(self, transaction),
        fields(product_id = %transaction.product_id, kind = %transaction.kind),
        err
    )]
    async fn append_transaction(&mut self, transaction: &StockTransaction) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, product_id, type, quantity, reason, reference_id, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.product_id.as_uuid())
        .bind(transaction.kind.as_str())
        .bind(transaction.quantity)
        .bind(&transaction.reason)
        .bind(&transaction.reference_id)
        .bind(transaction.created_by.as_uuid())
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn stock_totals(&mut self, product_id: ProductId) -> DomainResult<StockTotals> {
        let row = sqlx::query(&format!(
            "SELECT {TOTALS_SELECT} FROM stock_transactions WHERE product_id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("stock_totals", e))?;
        totals_from_row(&row).map_err(|e| map_sqlx_error("stock_totals", e))
    }

    async fn stock_totals_by_product(&mut self) -> DomainResult<HashMap<ProductId, StockTotals>> {
        let rows = sqlx::query(&format!(
            "SELECT product_id, {TOTALS_SELECT} FROM stock_transactions GROUP BY product_id"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("stock_totals_by_product", e))?;

        let mut totals = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product_id: Uuid = row
                .try_get("product_id")
                .map_err(|e| map_sqlx_error("stock_totals_by_product", e))?;
            let product_totals =
                totals_from_row(row).map_err(|e| map_sqlx_error("stock_totals_by_product", e))?;
            totals.insert(ProductId::from_uuid(product_id), product_totals);
        }
        Ok(totals)
    }

    #[instrument(skip(self), err)]
    async fn search_transactions(
        &mut self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<StockTransaction>> {
        let (limit, offset) = limit_offset(pagination);

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM stock_transactions {MOVEMENT_WHERE}"
        ))
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(&filter.reference_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&mut *self.tx)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("search_transactions", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions {MOVEMENT_WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(&filter.reference_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("search_transactions", e))?;

        let items = rows
            .iter()
            .map(transaction_from_row)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    async fn list_transactions(
        &mut self,
        filter: &StockMovementFilter,
    ) -> DomainResult<Vec<StockTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions {MOVEMENT_WHERE} \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(&filter.reference_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl PurchaseOrderRepository for PostgresTx {
    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    async fn insert_order(&mut self, order: &PurchaseOrder) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, supplier_id, status, total_amount, notes, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(order.created_by.as_uuid())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status), err)]
    async fn update_order(&mut self, order: &PurchaseOrder) -> DomainResult<()> {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_id = $2, status = $3, total_amount = $4, notes = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;
        Ok(())
    }

    async fn find_order(&mut self, id: PurchaseOrderId) -> DomainResult<Option<PurchaseOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_order_for_update(
        &mut self,
        id: PurchaseOrderId,
    ) -> DomainResult<Option<PurchaseOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_order_for_update", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn search_orders(
        &mut self,
        filter: &PurchaseOrderFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<PurchaseOrder>> {
        let (limit, offset) = limit_offset(pagination);
        let supplier = filter.supplier_id.map(Uuid::from);
        let status = filter.status.map(|s| s.as_str());
        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR supplier_id = $1)
              AND ($2::text IS NULL OR status = $2)
        "#;

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM purchase_orders {where_clause}"
        ))
        .bind(supplier)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("search_orders", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(supplier)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("search_orders", e))?;

        let items = rows
            .iter()
            .map(order_from_row)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    async fn insert_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (id, purchase_order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.purchase_order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    async fn update_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()> {
        sqlx::query(
            "UPDATE purchase_order_items SET product_id = $2, quantity = $3, unit_price = $4 WHERE id = $1",
        )
        .bind(item.id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;
        Ok(())
    }

    async fn delete_item(&mut self, id: PurchaseOrderItemId) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM purchase_order_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> DomainResult<Option<PurchaseOrderItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_order_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_item", e))?;
        row.as_ref()
            .map(item_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_item", e))
    }

    async fn items_for_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<PurchaseOrderItem>> {
        // Item ids are UUIDv7, so id order is insertion order.
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("items_for_order", e))?;
        decode_all("items_for_order", rows, item_from_row)
    }

    async fn delete_items_for_order(&mut self, order_id: PurchaseOrderId) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items_for_order", e))?;
        Ok(result.rows_affected())
    }
}

/// Runs against a real database only when `TALLYERP_TEST_DATABASE_URL` is set.
#[cfg(test)]
mod tests {
    use super::*;
    use tallyerp_inventory::StockLedger;
    use tallyerp_parties::{SupplierDirectory, SupplierDraft};
    use tallyerp_products::{Catalog, CategoryDraft, ProductDraft};
    use tallyerp_purchasing::{NewOrderLine, PurchaseOrderLifecycle};

    async fn test_store() -> Option<PostgresStore> {
        let url = std::env::var("TALLYERP_TEST_DATABASE_URL").ok()?;
        let store = PostgresStore::connect(&url, 4).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    #[tokio::test]
    async fn concurrent_receipts_lock_the_order_row() {
        let Some(store) = test_store().await else {
            return;
        };
        let catalog = Catalog::new(store.clone());
        let suppliers = SupplierDirectory::new(store.clone());
        let ledger = StockLedger::new(store.clone());
        let orders = PurchaseOrderLifecycle::new(store);
        let user = UserId::new();
        let tag = Uuid::now_v7().simple().to_string();

        let category = catalog
            .create_category(CategoryDraft {
                name: format!("Receiving {tag}"),
                description: None,
            })
            .await
            .unwrap();
        let product = catalog
            .create_product(ProductDraft {
                code: format!("RCV-{tag}"),
                name: "Receiving test".to_string(),
                category_id: category.id,
                description: None,
                unit: None,
                cost_price: 4,
                selling_price: 9,
                min_stock: 0,
            })
            .await
            .unwrap();
        let supplier = suppliers
            .create(SupplierDraft {
                name: "Race Supplies".to_string(),
                email: format!("{tag}@race.example"),
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        let detail = orders
            .create(
                supplier.id,
                vec![NewOrderLine {
                    product_id: product.id,
                    quantity: 3,
                    unit_price: None,
                }],
                None,
                user,
            )
            .await
            .unwrap();
        let id = detail.order.id;

        let (first, second) = tokio::join!(
            orders.update_status(id, PurchaseOrderStatus::Received, user),
            orders.update_status(id, PurchaseOrderStatus::Received, user),
        );
        assert!(first.is_ok() != second.is_ok());
        assert_eq!(ledger.current_stock(product.id).await.unwrap().current, 3);
    }
}
