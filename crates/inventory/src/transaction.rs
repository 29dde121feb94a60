use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallyerp_core::{DomainError, DomainResult, Entity, ProductId, StockTransactionId, UserId};

/// Kind of stock movement. The sign of a movement is implied by its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Goods received; quantity > 0 adds to stock.
    In,
    /// Goods issued; quantity > 0 is subtracted from stock.
    Out,
    /// Correction; quantity is a non-zero signed delta.
    Adjust,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "in",
            TransactionType::Out => "out",
            TransactionType::Adjust => "adjust",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" => Ok(TransactionType::In),
            "out" => Ok(TransactionType::Out),
            "adjust" => Ok(TransactionType::Adjust),
            other => Err(DomainError::invalid_argument(format!(
                "unknown transaction type '{other}' (expected in, out or adjust)"
            ))),
        }
    }
}

/// Immutable stock ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: StockTransactionId,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// IN and OUT store a positive quantity; ADJUST stores the signed delta.
    pub quantity: i64,
    pub reason: Option<String>,
    /// Free-form source document; the purchase order id for receipts.
    pub reference_id: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    /// Effect of this entry on stock on hand.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            TransactionType::In | TransactionType::Adjust => self.quantity,
            TransactionType::Out => -self.quantity,
        }
    }
}

impl Entity for StockTransaction {
    type Id = StockTransactionId;

    fn id(&self) -> StockTransactionId {
        self.id
    }
}

/// Per-type sums over a product's transaction log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub total_in: i64,
    pub total_out: i64,
    pub total_adjust: i64,
}

impl StockTotals {
    /// Add one movement. Fails when a per-type sum would leave `i64`.
    pub fn record(&mut self, kind: TransactionType, quantity: i64) -> DomainResult<()> {
        let slot = match kind {
            TransactionType::In => &mut self.total_in,
            TransactionType::Out => &mut self.total_out,
            TransactionType::Adjust => &mut self.total_adjust,
        };
        *slot = slot.checked_add(quantity).ok_or_else(|| {
            DomainError::invalid_argument(format!(
                "{kind} of {quantity} would overflow the stock totals"
            ))
        })?;
        Ok(())
    }

    pub fn from_transactions<'a>(
        log: impl IntoIterator<Item = &'a StockTransaction>,
    ) -> DomainResult<Self> {
        let mut totals = Self::default();
        for t in log {
            totals.record(t.kind, t.quantity)?;
        }
        Ok(totals)
    }

    /// Derived stock on hand.
    pub fn current(&self) -> DomainResult<i64> {
        self.total_in
            .checked_sub(self.total_out)
            .and_then(|v| v.checked_add(self.total_adjust))
            .ok_or_else(|| DomainError::invalid_argument("derived stock would overflow"))
    }
}

/// Stock position of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub total_in: i64,
    pub total_out: i64,
    pub total_adjust: i64,
    pub current: i64,
}

impl StockLevel {
    pub fn new(product_id: ProductId, totals: StockTotals) -> DomainResult<Self> {
        Ok(Self {
            product_id,
            total_in: totals.total_in,
            total_out: totals.total_out,
            total_adjust: totals.total_adjust,
            current: totals.current()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(kind: TransactionType, quantity: i64) -> StockTransaction {
        StockTransaction {
            id: StockTransactionId::new(),
            product_id: ProductId::new(),
            kind,
            quantity,
            reason: None,
            reference_id: None,
            created_by: UserId::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn out_entries_subtract() {
        let log = vec![
            entry(TransactionType::In, 10),
            entry(TransactionType::Out, 3),
            entry(TransactionType::Adjust, -2),
        ];
        let totals = StockTotals::from_transactions(&log).unwrap();
        assert_eq!(totals.total_in, 10);
        assert_eq!(totals.total_out, 3);
        assert_eq!(totals.total_adjust, -2);
        assert_eq!(totals.current().unwrap(), 5);
    }

    #[test]
    fn totals_reject_overflow_instead_of_wrapping() {
        let mut totals = StockTotals::default();
        totals.record(TransactionType::In, i64::MAX).unwrap();
        let err = totals.record(TransactionType::In, 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        assert_eq!(totals.total_in, i64::MAX);

        totals.record(TransactionType::Adjust, i64::MAX).unwrap();
        assert!(totals.current().is_err());

        let mut low = StockTotals::default();
        low.record(TransactionType::Adjust, i64::MIN).unwrap();
        assert!(low.record(TransactionType::Adjust, -1).is_err());
        low.record(TransactionType::Out, 1).unwrap();
        assert!(low.current().is_err());
    }

    #[test]
    fn transaction_type_parses_case_insensitively() {
        assert_eq!("IN".parse::<TransactionType>().unwrap(), TransactionType::In);
        assert_eq!(" adjust ".parse::<TransactionType>().unwrap(), TransactionType::Adjust);
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn serialized_kind_uses_type_key() {
        let json = serde_json::to_value(entry(TransactionType::Out, 1)).unwrap();
        assert_eq!(json["type"], "out");
        assert!(json.get("kind").is_none());
    }

    fn arb_entry() -> impl Strategy<Value = (TransactionType, i64)> {
        prop_oneof![
            (1i64..10_000).prop_map(|q| (TransactionType::In, q)),
            (1i64..10_000).prop_map(|q| (TransactionType::Out, q)),
            (-10_000i64..10_000)
                .prop_filter("adjust is non-zero", |q| *q != 0)
                .prop_map(|q| (TransactionType::Adjust, q)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: derived stock equals the running sum of signed quantities,
        /// regardless of the order the log is read in.
        #[test]
        fn derived_stock_is_the_sum_of_signed_quantities(
            entries in prop::collection::vec(arb_entry(), 0..64)
        ) {
            let log: Vec<StockTransaction> =
                entries.iter().map(|(k, q)| entry(*k, *q)).collect();

            let running: i64 = log.iter().map(StockTransaction::signed_quantity).sum();
            prop_assert_eq!(StockTotals::from_transactions(&log).unwrap().current().unwrap(), running);

            let reversed: Vec<StockTransaction> = log.iter().rev().cloned().collect();
            prop_assert_eq!(StockTotals::from_transactions(&reversed).unwrap().current().unwrap(), running);
        }
    }
}
