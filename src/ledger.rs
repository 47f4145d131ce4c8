//! The expense ledger: the only writer of expense records.
use bson::oid::ObjectId;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, warn};

use crate::directory::{dedup_emails, Directory};
use crate::error::{Result, SplitError};
use crate::schemas::{CreatedBy, Expense, ExpenseId, NewExpense};
use crate::store::{ExpenseStore, SharedStore};

/// Largest accepted expense amount. Keeps every balance fold far from the
/// `Decimal` range.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Per-participant share, rounded half-up to cents. The rounding remainder is
/// not redistributed, so the shares may miss the amount by up to one cent per
/// extra participant.
pub fn split_share(amount: Decimal, participants: usize) -> Decimal {
    (amount / Decimal::from(participants))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone)]
pub struct Ledger {
    store: SharedStore,
    directory: Directory,
}

impl Ledger {
    pub fn new(store: SharedStore, directory: Directory) -> Self {
        Ledger { store, directory }
    }

    pub async fn record_expense(&self, payer_email: &str, new_expense: NewExpense) -> Result<Expense> {
        let NewExpense {
            amount,
            participants,
            metadata,
        } = new_expense;
        let payer = self.directory.require_user(payer_email).await?;
        if amount <= Decimal::ZERO
            || amount > Decimal::from(MAX_AMOUNT)
            || amount.normalize().scale() > 2
        {
            return Err(SplitError::InvalidAmount(amount));
        }
        let participants = dedup_emails(participants);
        if participants.is_empty() {
            return Err(SplitError::EmptySplit);
        }

        let expense = Expense {
            id: ObjectId::new().to_hex(),
            amount,
            each_share: split_share(amount, participants.len()),
            participants,
            created_by: CreatedBy {
                email: payer.email.clone(),
                name: payer.name,
            },
            settled_members: vec![payer.email],
            created_at: Utc::now(),
            metadata,
        };
        self.store.insert_expense(&expense).await?;
        info!(expense_id = %expense.id, amount = %expense.amount, participants = expense.participants.len(), "Expense recorded");

        // The back-reference index is a cache; the expense itself is already durable.
        for participant in &expense.participants {
            if let Err(err) = self.directory.register_expense(participant, &expense.id).await {
                warn!(participant = %participant, expense_id = %expense.id, error = %err, "Failed to register expense reference");
            }
        }
        Ok(expense)
    }

    pub async fn find_expense(&self, id: &str) -> Result<Expense> {
        self.store
            .find_expense(id)
            .await?
            .ok_or_else(|| SplitError::ExpenseNotFound(id.to_string()))
    }

    /// Marks `email` as settled. Settling twice is a no-op, and the email is
    /// not checked against the participants.
    pub async fn settle_expense(&self, id: &str, email: &str) -> Result<Expense> {
        let expense = self
            .store
            .add_settled_member(id, email)
            .await?
            .ok_or_else(|| SplitError::ExpenseNotFound(id.to_string()))?;
        info!(expense_id = id, email, "Expense settled");
        Ok(expense)
    }

    /// Hard delete. Participants keep their stale back-reference until the
    /// index is rebuilt.
    pub async fn delete_expense(&self, id: &str) -> Result<Expense> {
        let expense = self
            .store
            .delete_expense(id)
            .await?
            .ok_or_else(|| SplitError::ExpenseNotFound(id.to_string()))?;
        info!(expense_id = id, "Expense deleted");
        Ok(expense)
    }

    pub async fn expenses_involving(&self, email: &str) -> Result<Vec<Expense>> {
        self.store.expenses_with_participants(&[email]).await
    }

    pub async fn expenses_involving_pair(&self, email: &str, other: &str) -> Result<Vec<Expense>> {
        self.store.expenses_with_participants(&[email, other]).await
    }

    /// Recomputes the expense back-references of a user from the ledger.
    pub async fn rebuild_expense_index(&self, email: &str) -> Result<Vec<ExpenseId>> {
        self.directory.require_user(email).await?;
        let ids: Vec<ExpenseId> = self
            .expenses_involving(email)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        self.directory.replace_expense_refs(email, &ids).await?;
        info!(email, expenses = ids.len(), "Expense index rebuilt");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::Map;

    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn new_expense(amount: &str, participants: &[&str]) -> NewExpense {
        NewExpense {
            amount: dec(amount),
            participants: participants.iter().map(|p| p.to_string()).collect(),
            metadata: Map::new(),
        }
    }

    async fn ledger() -> (Ledger, Directory) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let directory = Directory::new(store.clone());
        for (name, email) in [("Pat", "p@x.io"), ("Xi", "x@x.io"), ("Yan", "y@x.io")] {
            directory.create_user(name, email).await.unwrap();
        }
        (Ledger::new(store, directory.clone()), directory)
    }

    #[test]
    fn share_rounds_half_up() {
        assert_eq!(split_share(dec("90"), 3), dec("30"));
        assert_eq!(split_share(dec("100"), 3), dec("33.33"));
        assert_eq!(split_share(dec("0.05"), 2), dec("0.03"));
        assert_eq!(split_share(dec("200"), 3), dec("66.67"));
    }

    proptest! {
        #[test]
        fn shares_stay_within_a_cent_per_extra_participant(cents in 1u64..10_000_000, n in 1usize..60) {
            let amount = Decimal::new(cents as i64, 2);
            let share = split_share(amount, n);
            let drift = (share * Decimal::from(n) - amount).abs();
            prop_assert!(drift <= Decimal::new(n as i64 - 1, 2));
        }
    }

    #[actix_web::test]
    async fn recording_freezes_share_and_settles_payer() {
        let (ledger, directory) = ledger().await;
        let expense = ledger
            .record_expense("p@x.io", new_expense("90", &["p@x.io", "x@x.io", "y@x.io"]))
            .await
            .unwrap();

        assert_eq!(expense.each_share, dec("30"));
        assert_eq!(expense.settled_members, vec!["p@x.io"]);
        assert_eq!(expense.created_by.name, "Pat");
        let x = directory.require_user("x@x.io").await.unwrap();
        assert_eq!(x.expenses, vec![expense.id]);
    }

    #[actix_web::test]
    async fn invalid_expenses_persist_nothing() {
        let (ledger, _) = ledger().await;
        let zero = ledger
            .record_expense("p@x.io", new_expense("0", &["p@x.io", "x@x.io"]))
            .await
            .unwrap_err();
        assert!(matches!(zero, SplitError::InvalidAmount(_)));
        assert_eq!(zero.kind(), ErrorKind::InvalidInput);

        let empty = ledger
            .record_expense("p@x.io", new_expense("10", &[]))
            .await
            .unwrap_err();
        assert!(matches!(empty, SplitError::EmptySplit));
        assert_eq!(empty.kind(), ErrorKind::InvalidInput);

        let sub_cent = ledger
            .record_expense("p@x.io", new_expense("10.001", &["x@x.io"]))
            .await
            .unwrap_err();
        assert!(matches!(sub_cent, SplitError::InvalidAmount(_)));

        assert!(ledger.expenses_involving("p@x.io").await.unwrap().is_empty());
        assert!(ledger.expenses_involving("x@x.io").await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn amounts_above_the_cap_are_rejected() {
        let (ledger, _) = ledger().await;
        for amount in ["79228162514264337593543950335", "1000000000000.01"] {
            let err = ledger
                .record_expense("p@x.io", new_expense(amount, &["p@x.io", "x@x.io"]))
                .await
                .unwrap_err();
            assert!(matches!(err, SplitError::InvalidAmount(_)), "{amount}");
        }
        assert!(ledger.expenses_involving("p@x.io").await.unwrap().is_empty());

        let at_cap = ledger
            .record_expense("p@x.io", new_expense("1000000000000", &["p@x.io", "x@x.io"]))
            .await
            .unwrap();
        assert_eq!(at_cap.each_share, dec("500000000000"));
    }

    #[actix_web::test]
    async fn unknown_payer_is_rejected() {
        let (ledger, _) = ledger().await;
        let err = ledger
            .record_expense("ghost@x.io", new_expense("10", &["x@x.io"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::UserNotFound(_)));

        // The payer is looked up before the amount is validated
        let err = ledger
            .record_expense("ghost@x.io", new_expense("0", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::UserNotFound(email) if email == "ghost@x.io"));
    }

    #[actix_web::test]
    async fn settling_is_idempotent_and_unchecked() {
        let (ledger, _) = ledger().await;
        let expense = ledger
            .record_expense("p@x.io", new_expense("90", &["p@x.io", "x@x.io"]))
            .await
            .unwrap();

        let once = ledger.settle_expense(&expense.id, "x@x.io").await.unwrap();
        let twice = ledger.settle_expense(&expense.id, "x@x.io").await.unwrap();
        assert_eq!(once.settled_members, twice.settled_members);
        assert_eq!(twice.settled_members, vec!["p@x.io", "x@x.io"]);

        let outsider = ledger.settle_expense(&expense.id, "z@x.io").await.unwrap();
        assert!(outsider.is_settled_by("z@x.io"));

        let missing = ledger.settle_expense("nope", "x@x.io").await.unwrap_err();
        assert!(matches!(missing, SplitError::ExpenseNotFound(_)));
    }

    #[actix_web::test]
    async fn delete_removes_expense_but_not_back_references() {
        let (ledger, directory) = ledger().await;
        let expense = ledger
            .record_expense("p@x.io", new_expense("30", &["p@x.io", "x@x.io", "y@x.io"]))
            .await
            .unwrap();

        let deleted = ledger.delete_expense(&expense.id).await.unwrap();
        assert_eq!(deleted, expense);
        for email in ["p@x.io", "x@x.io", "y@x.io"] {
            assert!(ledger.expenses_involving(email).await.unwrap().is_empty());
        }
        assert_eq!(
            directory.require_user("y@x.io").await.unwrap().expenses,
            vec![expense.id.clone()]
        );

        let again = ledger.delete_expense(&expense.id).await.unwrap_err();
        assert!(matches!(again, SplitError::ExpenseNotFound(_)));

        assert!(ledger.rebuild_expense_index("y@x.io").await.unwrap().is_empty());
        assert!(directory.require_user("y@x.io").await.unwrap().expenses.is_empty());
    }

    #[actix_web::test]
    async fn pair_lookup_needs_both_participants() {
        let (ledger, _) = ledger().await;
        ledger
            .record_expense("p@x.io", new_expense("20", &["p@x.io", "x@x.io"]))
            .await
            .unwrap();
        ledger
            .record_expense("p@x.io", new_expense("20", &["p@x.io", "y@x.io"]))
            .await
            .unwrap();

        assert_eq!(ledger.expenses_involving("p@x.io").await.unwrap().len(), 2);
        assert_eq!(
            ledger
                .expenses_involving_pair("p@x.io", "x@x.io")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(ledger
            .expenses_involving_pair("x@x.io", "y@x.io")
            .await
            .unwrap()
            .is_empty());
    }
}
