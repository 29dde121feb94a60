//! Unit-of-work port.
//!
//! A `Store` hands out units of work. Each domain crate declares the typed
//! repository traits it needs, and backends implement those traits on their
//! unit-of-work type, so every read and write of one operation goes through
//! the same transaction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DomainResult;

/// An open, atomic unit of work.
///
/// Dropping a unit of work without calling `commit` discards every write made
/// through it.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self) -> DomainResult<()>;

    async fn rollback(self) -> DomainResult<()>;
}

/// Source of units of work (a connection pool, an in-memory database...).
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: UnitOfWork;

    async fn begin(&self) -> DomainResult<Self::Tx>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> DomainResult<Self::Tx> {
        (**self).begin().await
    }
}
