//! Storage collaborators consumed by the ledger and the directory.
//!
//! Every method touches a single document so implementations only need
//! single-document atomicity. Nothing here is transactional across calls.
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::schemas::{Expense, Group, User};

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn insert_expense(&self, expense: &Expense) -> Result<()>;

    async fn find_expense(&self, id: &str) -> Result<Option<Expense>>;

    /// Adds `email` to the settled members of the expense and returns the
    /// updated record, or `None` when the id is unknown.
    async fn add_settled_member(&self, id: &str, email: &str) -> Result<Option<Expense>>;

    /// Removes the expense and returns what was removed.
    async fn delete_expense(&self, id: &str) -> Result<Option<Expense>>;

    /// All expenses whose participants contain every email given.
    async fn expenses_with_participants(&self, emails: &[&str]) -> Result<Vec<Expense>>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Fails with `DuplicateUser` when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn find_user(&self, email: &str) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Adds `friend` to the friend list of `email`. Returns false when it was
    /// already there.
    async fn add_friend(&self, email: &str, friend: &str) -> Result<bool>;

    async fn add_expense_ref(&self, email: &str, expense_id: &str) -> Result<()>;

    async fn set_expense_refs(&self, email: &str, expense_ids: &[String]) -> Result<()>;

    async fn insert_group(&self, group: &Group) -> Result<()>;

    async fn add_group_ref(&self, email: &str, group_id: &str) -> Result<()>;

    async fn find_group(&self, id: &str) -> Result<Option<Group>>;

    /// Groups whose members contain every email given.
    async fn groups_containing(&self, emails: &[&str]) -> Result<Vec<Group>>;
}

pub trait Store: ExpenseStore + DirectoryStore {}

impl<T: ExpenseStore + DirectoryStore> Store for T {}

pub type SharedStore = Arc<dyn Store>;
