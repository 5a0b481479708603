use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Cents, Expense, ExpenseId, ExpenseSplit, UserId};

/// A user's position within one set of expenses (usually one group).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// What others owe the user on expenses the user paid
    pub owed_to_user: Cents,
    /// What the user owes on expenses someone else paid
    pub user_owes: Cents,
}

impl Position {
    /// Positive: others owe the user. Negative: the user owes others.
    pub fn net(&self) -> Cents {
        self.owed_to_user - self.user_owes
    }
}

/// Compute `user`'s position from a set of expenses and their splits.
///
/// On expenses the user paid, the user is owed the amount minus their own split.
/// On expenses paid by others, the user owes their own split.
pub fn compute_position(user: UserId, expenses: &[Expense], splits: &[ExpenseSplit]) -> Position {
    let own_shares: HashMap<_, Cents> = splits
        .iter()
        .filter(|s| s.user_id == user)
        .fold(HashMap::new(), |mut acc, s| {
            *acc.entry(s.expense_id).or_insert(0) += s.amount_cents;
            acc
        });

    expenses.iter().fold(Position::default(), |mut pos, expense| {
        let own = own_shares.get(&expense.id).copied().unwrap_or(0);
        if expense.paid_by == user {
            pos.owed_to_user += expense.amount_cents - own;
        } else {
            pos.user_owes += own;
        }
        pos
    })
}

/// Net balance for every user touched by the given expenses.
/// When every expense is fully split, the values sum to zero.
pub fn compute_all_nets(expenses: &[Expense], splits: &[ExpenseSplit]) -> HashMap<UserId, Cents> {
    let mut nets: HashMap<UserId, Cents> = HashMap::new();
    let known: HashSet<ExpenseId> = expenses.iter().map(|e| e.id).collect();

    for expense in expenses {
        *nets.entry(expense.paid_by).or_insert(0) += expense.amount_cents;
    }
    for split in splits {
        if known.contains(&split.expense_id) {
            *nets.entry(split.user_id).or_insert(0) -= split.amount_cents;
        }
    }

    nets
}

/// True when the splits belonging to `expense` add up to its amount.
pub fn is_fully_split(expense: &Expense, splits: &[ExpenseSplit]) -> bool {
    let total: Cents = splits
        .iter()
        .filter(|s| s.expense_id == expense.id)
        .map(|s| s.amount_cents)
        .sum();
    total == expense.amount_cents
}

/// Result of a consistency scan over the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub user_count: i64,
    pub group_count: i64,
    pub expense_count: i64,
    pub split_count: i64,
    pub wallet_count: i64,
    pub payment_count: i64,
    /// Money currently held across all wallets
    pub total_wallet_cents: Cents,
    /// Expenses whose splits don't sum to the expense amount
    pub unbalanced_expenses: i64,
    /// Splits that reference a missing expense
    pub orphan_splits: i64,
    pub negative_wallets: i64,
    /// Groups with no members left
    pub empty_groups: i64,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.problems().is_empty()
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.unbalanced_expenses > 0 {
            problems.push(format!(
                "{} expense(s) with splits that do not sum to the amount",
                self.unbalanced_expenses
            ));
        }
        if self.orphan_splits > 0 {
            problems.push(format!(
                "{} split(s) referencing missing expenses",
                self.orphan_splits
            ));
        }
        if self.negative_wallets > 0 {
            problems.push(format!(
                "{} wallet(s) with a negative balance",
                self.negative_wallets
            ));
        }
        if self.empty_groups > 0 {
            problems.push(format!("{} group(s) without members", self.empty_groups));
        }
        problems
    }
}
