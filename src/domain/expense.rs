use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, GroupId, UserId};

pub type ExpenseId = Uuid;
pub type SplitId = Uuid;

/// Money one user paid on behalf of a set of participants.
/// Expenses are immutable; they are only ever created or deleted together with their splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub title: String,
    /// Total amount in cents (always positive)
    pub amount_cents: Cents,
    pub paid_by: UserId,
    /// None for an ad hoc expense outside any group
    pub group_id: Option<GroupId>,
    /// When the expense happened in the real world
    pub occurred_at: DateTime<Utc>,
    /// When we recorded it
    pub recorded_at: DateTime<Utc>,
}

/// One participant's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSplit {
    pub id: SplitId,
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    pub amount_cents: Cents,
}

impl Expense {
    pub fn new(
        title: String,
        amount_cents: Cents,
        paid_by: UserId,
        group_id: Option<GroupId>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Expense amount must be positive");
        Self {
            id: Uuid::new_v4(),
            title,
            amount_cents,
            paid_by,
            group_id,
            occurred_at,
            recorded_at: Utc::now(),
        }
    }

    /// Divide the amount equally between `participants`.
    ///
    /// Duplicate participants count once. Integer division leaves up to
    /// `count - 1` cents over; those go out one cent each, to the payer first
    /// when the payer participates, then down the participant list. The splits
    /// always sum to exactly `amount_cents`.
    pub fn split_equally(&self, participants: &[UserId]) -> Vec<ExpenseSplit> {
        let mut ordered = dedup_preserving_order(participants);
        if ordered.is_empty() {
            return Vec::new();
        }
        if let Some(pos) = ordered.iter().position(|id| *id == self.paid_by) {
            ordered[..=pos].rotate_right(1);
        }

        let count = ordered.len() as i64;
        let base = self.amount_cents / count;
        let remainder = self.amount_cents % count;

        ordered
            .into_iter()
            .enumerate()
            .map(|(i, user_id)| ExpenseSplit {
                id: Uuid::new_v4(),
                expense_id: self.id,
                user_id,
                amount_cents: base + if (i as i64) < remainder { 1 } else { 0 },
            })
            .collect()
    }

    /// The part of this expense other participants owe the payer.
    pub fn covered_by_others(&self, splits: &[ExpenseSplit]) -> Cents {
        let own_share: Cents = splits
            .iter()
            .filter(|s| s.expense_id == self.id && s.user_id == self.paid_by)
            .map(|s| s.amount_cents)
            .sum();
        self.amount_cents - own_share
    }

    pub fn is_ad_hoc(&self) -> bool {
        self.group_id.is_none()
    }
}

/// Remove repeated ids, keeping the first occurrence of each.
pub fn dedup_preserving_order(ids: &[UserId]) -> Vec<UserId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(n: usize) -> Vec<UserId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn total(splits: &[ExpenseSplit]) -> Cents {
        splits.iter().map(|s| s.amount_cents).sum()
    }

    #[test]
    fn test_even_split_between_two() {
        let ids = users(2);
        let expense = Expense::new("Dinner".into(), 8550, ids[0], None, Utc::now());

        let splits = expense.split_equally(&ids);

        assert_eq!(splits.len(), 2);
        assert!(splits.iter().all(|s| s.amount_cents == 4275));
        assert!(splits.iter().all(|s| s.expense_id == expense.id));
    }

    #[test]
    fn test_remainder_goes_to_payer_first() {
        let ids = users(3);
        // payer listed last on purpose
        let expense = Expense::new("Taxi".into(), 1000, ids[2], None, Utc::now());

        let splits = expense.split_equally(&ids);

        assert_eq!(total(&splits), 1000);
        assert_eq!(splits[0].user_id, ids[2]);
        assert_eq!(splits[0].amount_cents, 334);
        assert_eq!(splits[1].amount_cents, 333);
        assert_eq!(splits[2].amount_cents, 333);
        // others keep their relative order
        assert_eq!(splits[1].user_id, ids[0]);
        assert_eq!(splits[2].user_id, ids[1]);
    }

    #[test]
    fn test_remainder_without_payer_follows_list_order() {
        let ids = users(4);
        let payer = Uuid::new_v4();
        let expense = Expense::new("Gift".into(), 1002, payer, None, Utc::now());

        let splits = expense.split_equally(&ids);

        let amounts: Vec<Cents> = splits.iter().map(|s| s.amount_cents).collect();
        assert_eq!(amounts, vec![251, 251, 250, 250]);
        assert!(splits.iter().all(|s| s.user_id != payer));
    }

    #[test]
    fn test_splits_always_sum_to_amount() {
        for count in 1..=9 {
            let ids = users(count);
            for amount in [1, 2, 7, 99, 100, 101, 8550, 123_457] {
                let expense = Expense::new("x".into(), amount, ids[0], None, Utc::now());
                let splits = expense.split_equally(&ids);
                assert_eq!(total(&splits), amount, "{} among {}", amount, count);
                let max = splits.iter().map(|s| s.amount_cents).max().unwrap();
                let min = splits.iter().map(|s| s.amount_cents).min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_duplicate_participants_counted_once() {
        let ids = users(2);
        let expense = Expense::new("Lunch".into(), 2000, ids[0], None, Utc::now());

        let splits = expense.split_equally(&[ids[0], ids[1], ids[0], ids[1]]);

        assert_eq!(splits.len(), 2);
        assert_eq!(total(&splits), 2000);
    }

    #[test]
    fn test_no_participants_yields_no_splits() {
        let expense = Expense::new("Nothing".into(), 500, Uuid::new_v4(), None, Utc::now());
        assert!(expense.split_equally(&[]).is_empty());
    }

    #[test]
    fn test_covered_by_others() {
        let ids = users(3);
        let expense = Expense::new("Rent".into(), 90000, ids[0], None, Utc::now());
        let splits = expense.split_equally(&ids);
        assert_eq!(expense.covered_by_others(&splits), 60000);

        // payer not participating: everything is owed back
        let others = expense.split_equally(&ids[1..]);
        assert_eq!(expense.covered_by_others(&others), 90000);
    }

    #[test]
    #[should_panic(expected = "Expense amount must be positive")]
    fn test_expense_requires_positive_amount() {
        Expense::new("Free".into(), 0, Uuid::new_v4(), None, Utc::now());
    }
}
