//! Persistence backends for the unit-of-work port.
//!
//! - `InMemoryStore`: dev/test backend, one unit of work at a time
//! - `PostgresStore`: sqlx-backed, one database transaction per unit of work
//! - `AnyStore`: picks one of the two at startup

pub mod any;
pub mod in_memory;
pub mod postgres;

pub use any::{AnyStore, AnyTx};
pub use in_memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};

mod integration_tests;
