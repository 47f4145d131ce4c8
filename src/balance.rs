//! Read-side projections over the ledger. Nothing here writes, and every
//! balance is folded from the current expense records on each call.
use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::directory::Directory;
use crate::error::{Result, SplitError};
use crate::exchange::{get_exchanges, Exchange};
use crate::ledger::Ledger;
use crate::schemas::{
    Email, Expense, ExpenseBreakdown, FriendSummary, Group, MemberBalance, MemberLine,
    SettlementState, SharedExpense,
};

/// One participant's unsettled share of one expense, owed to its creator.
#[derive(Clone, Debug, PartialEq)]
pub struct Debt {
    pub debtor: Email,
    pub creditor: Email,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GroupSummary {
    pub group: Group,
    pub balances: Vec<MemberBalance>,
    pub settlements: Vec<Exchange>,
}

/// What `expense` adds to the balance of `user` towards `other`. Only the
/// creator is ever owed, so expenses created by a third party count for
/// nothing.
fn creator_relative_share(expense: &Expense, user: &str, other: &str) -> Decimal {
    if expense.created_by.email == user {
        match expense.settlement_state(other) {
            SettlementState::Unsettled => expense.each_share,
            SettlementState::Settled | SettlementState::Creator => Decimal::ZERO,
        }
    } else if expense.created_by.email == other {
        match expense.settlement_state(user) {
            SettlementState::Unsettled => -expense.each_share,
            SettlementState::Settled | SettlementState::Creator => Decimal::ZERO,
        }
    } else {
        Decimal::ZERO
    }
}

/// Positive: `other` owes `user`. Negative: `user` owes `other`.
pub fn pairwise_balance(user: &str, other: &str, expenses: &[Expense]) -> Result<Decimal> {
    expenses
        .iter()
        .filter(|e| e.involves(user) && e.involves(other))
        .map(|e| creator_relative_share(e, user, other))
        .try_fold(Decimal::ZERO, |total, share| {
            total.checked_add(share).ok_or(SplitError::BalanceOverflow)
        })
}

pub fn outstanding_debts(expenses: &[Expense]) -> Vec<Debt> {
    expenses
        .iter()
        .flat_map(|expense| {
            expense
                .participants
                .iter()
                .filter(move |p| expense.settlement_state(p) == SettlementState::Unsettled)
                .map(move |p| Debt {
                    debtor: p.clone(),
                    creditor: expense.created_by.email.clone(),
                    amount: expense.each_share,
                })
        })
        .collect()
}

fn add_to(balances: &mut BTreeMap<Email, Decimal>, email: &str, amount: Decimal) -> Result<()> {
    let balance = balances.entry(email.to_string()).or_insert(Decimal::ZERO);
    *balance = balance
        .checked_add(amount)
        .ok_or(SplitError::BalanceOverflow)?;
    Ok(())
}

pub fn net_balances(debts: &[Debt]) -> Result<BTreeMap<Email, Decimal>> {
    let mut balances: BTreeMap<Email, Decimal> = BTreeMap::new();
    for debt in debts {
        add_to(&mut balances, &debt.creditor, debt.amount)?;
        add_to(&mut balances, &debt.debtor, -debt.amount)?;
    }
    Ok(balances)
}

fn member_line(expense: &Expense, name: String, email: &str) -> MemberLine {
    let share = expense.each_share;
    let (paid, balance) = match expense.settlement_state(email) {
        SettlementState::Creator => (share, expense.amount - share),
        SettlementState::Unsettled => (Decimal::ZERO, -share),
        SettlementState::Settled => (share, Decimal::ZERO),
    };
    MemberLine {
        name,
        email: email.to_string(),
        share,
        paid,
        balance,
    }
}

fn within_group(expense: &Expense, group: &Group) -> bool {
    group.has_member(&expense.created_by.email)
        && expense.participants.iter().all(|p| group.has_member(p))
}

#[derive(Clone)]
pub struct BalanceEngine {
    ledger: Ledger,
    directory: Directory,
}

impl BalanceEngine {
    pub fn new(ledger: Ledger, directory: Directory) -> Self {
        BalanceEngine { ledger, directory }
    }

    pub async fn pairwise_balance(&self, user: &str, other: &str) -> Result<Decimal> {
        self.directory.require_user(user).await?;
        self.directory.require_user(other).await?;
        let expenses = self.ledger.expenses_involving_pair(user, other).await?;
        pairwise_balance(user, other, &expenses)
    }

    pub async fn friend_details(&self, user: &str, friend: &str) -> Result<FriendSummary> {
        self.directory.require_user(user).await?;
        let friend = self.directory.require_user(friend).await?;
        self.summarize_friend(user, friend.name, friend.email).await
    }

    /// One summary per friend of `user`. Friends that no longer resolve are
    /// skipped.
    pub async fn friend_summary(&self, user: &str) -> Result<Vec<FriendSummary>> {
        let current = self.directory.require_user(user).await?;
        let mut summaries = Vec::with_capacity(current.friends.len());
        for friend_email in &current.friends {
            if let Some(friend) = self.directory.find_user_by_email(friend_email).await? {
                summaries.push(self.summarize_friend(user, friend.name, friend.email).await?);
            }
        }
        Ok(summaries)
    }

    async fn summarize_friend(&self, user: &str, name: String, email: Email) -> Result<FriendSummary> {
        let expenses = self.ledger.expenses_involving_pair(user, &email).await?;
        let balance = pairwise_balance(user, &email, &expenses)?;
        let common_groups = self
            .directory
            .common_groups(user, &email)
            .await?
            .iter()
            .map(Group::reference)
            .collect();
        let common_expenses = expenses
            .into_iter()
            .map(|expense| SharedExpense {
                dues_cleared: expense.is_settled_by(user),
                expense,
            })
            .collect();

        Ok(FriendSummary {
            name,
            email,
            balance,
            common_expenses,
            common_groups,
        })
    }

    pub async fn expense_breakdown(&self, expense_id: &str) -> Result<ExpenseBreakdown> {
        let expense = self.ledger.find_expense(expense_id).await?;
        let mut members_details = Vec::with_capacity(expense.participants.len());
        for participant in &expense.participants {
            let member = self
                .directory
                .find_user_by_email(participant)
                .await?
                .ok_or_else(|| SplitError::MemberNotFound(participant.clone()))?;
            members_details.push(member_line(&expense, member.name, participant));
        }
        Ok(ExpenseBreakdown {
            expense,
            members_details,
        })
    }

    /// Expenses whose creator and participants all belong to the group.
    async fn group_expenses(&self, group: &Group) -> Result<Vec<Expense>> {
        let mut seen = HashSet::new();
        let mut expenses = Vec::new();
        for member in &group.members {
            for expense in self.ledger.expenses_involving(member).await? {
                if within_group(&expense, group) && seen.insert(expense.id.clone()) {
                    expenses.push(expense);
                }
            }
        }
        Ok(expenses)
    }

    pub async fn group_summary(&self, group_id: &str) -> Result<GroupSummary> {
        let group = self.directory.require_group(group_id).await?;
        let debts = outstanding_debts(&self.group_expenses(&group).await?);
        let nets = net_balances(&debts)?;
        let balances = group
            .members
            .iter()
            .map(|email| MemberBalance {
                email: email.clone(),
                balance: nets.get(email).copied().unwrap_or(Decimal::ZERO),
            })
            .collect();

        Ok(GroupSummary {
            settlements: get_exchanges(&debts)?,
            group,
            balances,
        })
    }

    pub async fn user_group_balance(&self, group_id: &str, email: &str) -> Result<MemberBalance> {
        let group = self.directory.require_group(group_id).await?;
        if !group.has_member(email) {
            return Err(SplitError::MemberNotFound(email.to_string()));
        }
        let debts = outstanding_debts(&self.group_expenses(&group).await?);
        let balance = net_balances(&debts)?
            .remove(email)
            .unwrap_or(Decimal::ZERO);
        Ok(MemberBalance {
            email: email.to_string(),
            balance,
        })
    }
}
