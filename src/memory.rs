use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, SplitError};
use crate::schemas::{Expense, Group, User};
use crate::store::{DirectoryStore, ExpenseStore};

#[derive(Default)]
struct State {
    users: Vec<User>,
    expenses: Vec<Expense>,
    groups: Vec<Group>,
}

impl State {
    fn user_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.email == email)
    }
}

/// In-process store. Keeps insertion order, which makes listings stable.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn insert_expense(&self, expense: &Expense) -> Result<()> {
        self.state.write().await.expenses.push(expense.clone());
        Ok(())
    }

    async fn find_expense(&self, id: &str) -> Result<Option<Expense>> {
        let state = self.state.read().await;
        Ok(state.expenses.iter().find(|e| e.id == id).cloned())
    }

    async fn add_settled_member(&self, id: &str, email: &str) -> Result<Option<Expense>> {
        let mut state = self.state.write().await;
        Ok(state
            .expenses
            .iter_mut()
            .find(|e| e.id == id)
            .map(|expense| {
                push_unique(&mut expense.settled_members, email);
                expense.clone()
            }))
    }

    async fn delete_expense(&self, id: &str) -> Result<Option<Expense>> {
        let mut state = self.state.write().await;
        let position = state.expenses.iter().position(|e| e.id == id);
        Ok(position.map(|index| state.expenses.remove(index)))
    }

    async fn expenses_with_participants(&self, emails: &[&str]) -> Result<Vec<Expense>> {
        let state = self.state.read().await;
        Ok(state
            .expenses
            .iter()
            .filter(|e| emails.iter().all(|email| e.involves(email)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(SplitError::DuplicateUser(user.email.clone()));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn add_friend(&self, email: &str, friend: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.user_mut(email) {
            Some(user) => Ok(push_unique(&mut user.friends, friend)),
            None => Err(SplitError::UserNotFound(email.to_string())),
        }
    }

    async fn add_expense_ref(&self, email: &str, expense_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.user_mut(email) {
            push_unique(&mut user.expenses, expense_id);
        }
        Ok(())
    }

    async fn set_expense_refs(&self, email: &str, expense_ids: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.user_mut(email) {
            user.expenses = expense_ids.to_vec();
        }
        Ok(())
    }

    async fn insert_group(&self, group: &Group) -> Result<()> {
        self.state.write().await.groups.push(group.clone());
        Ok(())
    }

    async fn add_group_ref(&self, email: &str, group_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.user_mut(email) {
            push_unique(&mut user.groups, group_id);
        }
        Ok(())
    }

    async fn find_group(&self, id: &str) -> Result<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn groups_containing(&self, emails: &[&str]) -> Result<Vec<Group>> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .iter()
            .filter(|g| emails.iter().all(|email| g.has_member(email)))
            .cloned()
            .collect())
    }
}
