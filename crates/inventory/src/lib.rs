//! Inventory: the append-only stock ledger.
//!
//! Stock on hand is never stored. It is derived on demand from the
//! transaction log as `SUM(IN) - SUM(OUT) + SUM(ADJUST)`.

pub mod ledger;
pub mod report;
pub mod repository;
pub mod transaction;

pub use ledger::{RecordAdjust, RecordIn, RecordOut, StockLedger, post_adjust, post_in, post_out};
pub use report::{StockMovementRow, StockReports, StockSummaryFilter, StockSummaryRow};
pub use repository::{StockMovementFilter, StockRepository};
pub use transaction::{StockLevel, StockTotals, StockTransaction, TransactionType};
