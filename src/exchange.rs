use std::collections::BTreeMap;
use std::mem::swap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balance::{net_balances, Debt};
use crate::error::{Result, SplitError};
use crate::schemas::Email;

#[derive(Clone, Debug)]
pub struct PersonalBalance {
    pub email: Email,
    pub balance: Decimal,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct UserPair {
    pub user1: Email,
    pub user2: Email,
}

/// A transfer that would clear (part of) the outstanding debts.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Exchange {
    pub payer: Email,
    pub receiver: Email,
    pub amount: Decimal,
}

// The exchanges that will be made if no simplification happens
fn get_naive_exchanges(debts: &[Debt]) -> Result<Vec<Exchange>> {
    let mut balances_between_people: BTreeMap<UserPair, Decimal> = BTreeMap::new();

    for debt in debts {
        let mut pair = UserPair {
            user1: debt.creditor.clone(),
            user2: debt.debtor.clone(),
        };
        let mut amount = debt.amount;

        // Alphabetical order keeps both directions of a pair under one key
        if pair.user1 > pair.user2 {
            swap(&mut pair.user1, &mut pair.user2);
            amount = -amount;
        }

        let balance = balances_between_people.entry(pair).or_insert(Decimal::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or(SplitError::BalanceOverflow)?;
    }

    // Positive balance: user2 pays user1
    let exchanges = balances_between_people
        .into_iter()
        .filter(|(_, balance)| !balance.is_zero())
        .map(|(people_pair, balance)| {
            let mut payer = people_pair.user2;
            let mut receiver = people_pair.user1;
            if balance < Decimal::ZERO {
                swap(&mut payer, &mut receiver);
            }
            Exchange {
                payer,
                receiver,
                amount: balance.abs(),
            }
        })
        .collect();
    Ok(exchanges)
}

// Greedily matches the largest debtor with the largest creditor
fn get_simplified_exchanges(
    mut payers: Vec<PersonalBalance>,
    mut receivers: Vec<PersonalBalance>,
) -> Vec<Exchange> {
    let by_balance =
        |a: &PersonalBalance, b: &PersonalBalance| a.balance.cmp(&b.balance).then(b.email.cmp(&a.email));
    payers.sort_by(by_balance);
    receivers.sort_by(by_balance);

    let mut exchanges: Vec<Exchange> = Vec::new();

    while let (Some(receiver), Some(payer)) = (receivers.last_mut(), payers.last_mut()) {
        let amount = receiver.balance.min(payer.balance);
        exchanges.push(Exchange {
            payer: payer.email.clone(),
            receiver: receiver.email.clone(),
            amount,
        });
        receiver.balance -= amount;
        payer.balance -= amount;

        let receiver_done = receiver.balance.is_zero();
        let payer_done = payer.balance.is_zero();
        if receiver_done {
            receivers.pop();
        }
        if payer_done {
            payers.pop();
        }
    }
    exchanges
}

/// Suggested transfers that clear every outstanding debt.
pub fn get_exchanges(debts: &[Debt]) -> Result<Vec<Exchange>> {
    let mut payers = Vec::new();
    let mut receivers = Vec::new();

    for (email, balance) in net_balances(debts)? {
        if balance.is_zero() {
            continue;
        }
        let person = PersonalBalance {
            email,
            balance: balance.abs(),
        };
        if balance < Decimal::ZERO {
            payers.push(person);
        } else {
            receivers.push(person);
        }
    }

    let naive_exchanges = get_naive_exchanges(debts)?;
    let simplified_exchanges = get_simplified_exchanges(payers, receivers);

    // The greedy pass is not guaranteed to beat the direct transfers
    if simplified_exchanges.len() < naive_exchanges.len() {
        Ok(simplified_exchanges)
    } else {
        Ok(naive_exchanges)
    }
}
