use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SplitError};
use crate::schemas::{Expense, Group, User};
use crate::store::{DirectoryStore, ExpenseStore};

const DUPLICATE_KEY: i32 = 11000;

/// Persisted shape of an expense. `unsettledMembers` is written for older
/// readers and never read back as settlement state.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseDocument {
    #[serde(flatten)]
    expense: Expense,
    #[serde(default)]
    unsettled_members: Vec<String>,
}

impl From<&Expense> for ExpenseDocument {
    fn from(expense: &Expense) -> Self {
        ExpenseDocument {
            expense: expense.clone(),
            unsettled_members: vec![],
        }
    }
}

pub struct MongoStore {
    users: Collection<User>,
    expenses: Collection<ExpenseDocument>,
    groups: Collection<Group>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        let store = MongoStore {
            users: db.collection("users"),
            expenses: db.collection("expenses"),
            groups: db.collection("groups"),
        };
        store.ensure_indexes().await?;
        info!(database, "Connected to MongoDB");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let unique = |keys: Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };
        self.users.create_index(unique(doc! { "email": 1 }), None).await?;
        self.expenses.create_index(unique(doc! { "id": 1 }), None).await?;
        self.expenses
            .create_index(IndexModel::builder().keys(doc! { "participants": 1 }).build(), None)
            .await?;
        self.groups.create_index(unique(doc! { "id": 1 }), None).await?;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl ExpenseStore for MongoStore {
    async fn insert_expense(&self, expense: &Expense) -> Result<()> {
        self.expenses
            .insert_one(ExpenseDocument::from(expense), None)
            .await?;
        Ok(())
    }

    async fn find_expense(&self, id: &str) -> Result<Option<Expense>> {
        let found = self.expenses.find_one(doc! { "id": id }, None).await?;
        Ok(found.map(|d| d.expense))
    }

    async fn add_settled_member(&self, id: &str, email: &str) -> Result<Option<Expense>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .expenses
            .find_one_and_update(
                doc! { "id": id },
                doc! { "$addToSet": { "settledMembers": email } },
                options,
            )
            .await?;
        Ok(updated.map(|d| d.expense))
    }

    async fn delete_expense(&self, id: &str) -> Result<Option<Expense>> {
        let deleted = self
            .expenses
            .find_one_and_delete(doc! { "id": id }, None)
            .await?;
        Ok(deleted.map(|d| d.expense))
    }

    async fn expenses_with_participants(&self, emails: &[&str]) -> Result<Vec<Expense>> {
        let cursor = self
            .expenses
            .find(doc! { "participants": { "$all": emails.to_vec() } }, None)
            .await?;
        let documents: Vec<ExpenseDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(|d| d.expense).collect())
    }
}

#[async_trait]
impl DirectoryStore for MongoStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        match self.users.insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(SplitError::DuplicateUser(user.email.clone())),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }, None).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let cursor = self.users.find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn add_friend(&self, email: &str, friend: &str) -> Result<bool> {
        let result = self
            .users
            .update_one(
                doc! { "email": email },
                doc! { "$addToSet": { "friends": friend } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(SplitError::UserNotFound(email.to_string()));
        }
        Ok(result.modified_count > 0)
    }

    async fn add_expense_ref(&self, email: &str, expense_id: &str) -> Result<()> {
        self.users
            .update_one(
                doc! { "email": email },
                doc! { "$addToSet": { "expenses": expense_id } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_expense_refs(&self, email: &str, expense_ids: &[String]) -> Result<()> {
        self.users
            .update_one(
                doc! { "email": email },
                doc! { "$set": { "expenses": expense_ids.to_vec() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn insert_group(&self, group: &Group) -> Result<()> {
        self.groups.insert_one(group, None).await?;
        Ok(())
    }

    async fn add_group_ref(&self, email: &str, group_id: &str) -> Result<()> {
        self.users
            .update_one(
                doc! { "email": email },
                doc! { "$addToSet": { "groups": group_id } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_group(&self, id: &str) -> Result<Option<Group>> {
        Ok(self.groups.find_one(doc! { "id": id }, None).await?)
    }

    async fn groups_containing(&self, emails: &[&str]) -> Result<Vec<Group>> {
        let cursor = self
            .groups
            .find(doc! { "members": { "$all": emails.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
