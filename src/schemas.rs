use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Email = String;
pub type ExpenseId = String;
pub type GroupId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub friends: Vec<Email>,
    /// Back-references to expenses this user participates in. Only a lookup
    /// convenience, the ledger is authoritative.
    #[serde(default)]
    pub expenses: Vec<ExpenseId>,
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<Email>) -> Self {
        User {
            name: name.into(),
            email: email.into(),
            friends: vec![],
            expenses: vec![],
            groups: vec![],
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublicUser {
    pub name: String,
    pub email: Email,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreatedBy {
    pub email: Email,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub amount: Decimal,
    pub participants: Vec<Email>,
    pub each_share: Decimal,
    pub created_by: CreatedBy,
    pub settled_members: Vec<Email>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Where a single user stands on a single expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementState {
    Creator,
    Settled,
    Unsettled,
}

impl Expense {
    pub fn involves(&self, email: &str) -> bool {
        self.participants.iter().any(|p| p == email)
    }

    pub fn is_settled_by(&self, email: &str) -> bool {
        self.settled_members.iter().any(|m| m == email)
    }

    pub fn settlement_state(&self, email: &str) -> SettlementState {
        if self.created_by.email == email {
            SettlementState::Creator
        } else if self.is_settled_by(email) {
            SettlementState::Settled
        } else {
            SettlementState::Unsettled
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_by: Email,
    pub members: Vec<Email>,
}

impl Group {
    pub fn has_member(&self, email: &str) -> bool {
        self.members.iter().any(|m| m == email)
    }

    pub fn reference(&self) -> GroupRef {
        GroupRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GroupRef {
    pub id: GroupId,
    pub name: String,
}

/// Client supplied part of an expense. Anything besides the amount and the
/// split set is kept as free-form metadata.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewExpense {
    pub amount: Decimal,
    #[serde(alias = "split")]
    pub participants: Vec<Email>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLine {
    pub name: String,
    pub email: Email,
    pub share: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBreakdown {
    pub expense: Expense,
    pub members_details: Vec<MemberLine>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedExpense {
    #[serde(flatten)]
    pub expense: Expense,
    pub dues_cleared: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendSummary {
    pub name: String,
    pub email: Email,
    pub balance: Decimal,
    pub common_expenses: Vec<SharedExpense>,
    pub common_groups: Vec<GroupRef>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MemberBalance {
    pub email: Email,
    pub balance: Decimal,
}
