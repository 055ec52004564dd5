//! Aggregation over expense records: scope filtering, totals, signed
//! income/expense splits and grouped subtotals.

use std::collections::HashMap;

use chrono::{FixedOffset, NaiveDate};

use crate::domain::{ChatId, ExpenseRecord, UserId};

/// Label used for entries recorded without a category.
pub const UNCATEGORIZED: &str = "未分类";

/// Calendar-day restriction. The stored UTC timestamp is shifted by `offset`
/// before its date is compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayFilter {
    pub date: NaiveDate,
    pub offset: FixedOffset,
}

/// The (user, chat, optional day) filter applied before aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub user_id: Option<UserId>,
    pub chat_id: Option<ChatId>,
    pub day: Option<DayFilter>,
}

impl Scope {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn chat(chat_id: ChatId) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::default()
        }
    }

    pub fn member(user_id: UserId, chat_id: ChatId) -> Self {
        Self {
            user_id: Some(user_id),
            chat_id: Some(chat_id),
            day: None,
        }
    }

    pub fn on_day(mut self, date: NaiveDate, offset: FixedOffset) -> Self {
        self.day = Some(DayFilter { date, offset });
        self
    }

    pub fn matches(&self, rec: &ExpenseRecord) -> bool {
        if self.user_id.is_some_and(|u| u != rec.user_id) {
            return false;
        }
        if self.chat_id.is_some_and(|c| c != rec.chat_id) {
            return false;
        }
        if let Some(day) = self.day {
            if rec.date.with_timezone(&day.offset).date_naive() != day.date {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupBy {
    #[default]
    None,
    Category,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Category(String),
    User(UserId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupTotal {
    pub key: GroupKey,
    pub label: String,
    pub subtotal: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Totals {
    pub count: usize,
    pub total: f64,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    /// First-seen key order.
    pub groups: Vec<GroupTotal>,
}

/// Result of aggregating a scope. An empty scope is reported as `Empty`,
/// never as zero totals.
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregate {
    Empty,
    Totals(Totals),
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        matches!(self, Aggregate::Empty)
    }

    pub fn totals(&self) -> Option<&Totals> {
        match self {
            Aggregate::Empty => None,
            Aggregate::Totals(t) => Some(t),
        }
    }
}

fn group_of(rec: &ExpenseRecord, by: GroupBy) -> Option<(GroupKey, String)> {
    match by {
        GroupBy::None => None,
        GroupBy::Category => {
            let label = rec
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            Some((GroupKey::Category(label.clone()), label))
        }
        GroupBy::User => Some((GroupKey::User(rec.user_id), rec.username.clone())),
    }
}

pub fn aggregate(records: &[ExpenseRecord], scope: &Scope, by: GroupBy) -> Aggregate {
    let mut count = 0usize;
    let mut total = 0.0;
    let mut income = 0.0;
    let mut expense = 0.0;
    let mut groups: Vec<GroupTotal> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for rec in records.iter().filter(|r| scope.matches(r)) {
        count += 1;
        total += rec.amount;
        if rec.amount > 0.0 {
            income += rec.amount;
        } else if rec.amount < 0.0 {
            expense += rec.amount.abs();
        }

        if let Some((key, label)) = group_of(rec, by) {
            let idx = *index.entry(key.clone()).or_insert_with(|| {
                groups.push(GroupTotal {
                    key,
                    label,
                    subtotal: 0.0,
                    count: 0,
                });
                groups.len() - 1
            });
            groups[idx].subtotal += rec.amount;
            groups[idx].count += 1;
        }
    }

    if count == 0 {
        return Aggregate::Empty;
    }

    Aggregate::Totals(Totals {
        count,
        total,
        income,
        expense,
        balance: income - expense,
        groups,
    })
}

/// Scoped records, newest first (timestamp desc, then id desc), at most `limit`.
pub fn recent(records: &[ExpenseRecord], scope: &Scope, limit: usize) -> Vec<ExpenseRecord> {
    let mut out: Vec<ExpenseRecord> = records
        .iter()
        .filter(|r| scope.matches(r))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    out.truncate(limit);
    out
}
