use chrono::{DateTime, Utc};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Equals the user id for private chats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Store-assigned sequence number of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub i64);

/// Kind of conversation a message arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group)
    }
}

/// A record that has not been written yet (the store assigns the id).
///
/// `amount` is signed: positive = income, negative = expense.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRecord {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub username: String,
    pub amount: f64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

/// A persisted expense entry. Immutable once written.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub username: String,
    pub amount: f64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

impl ExpenseRecord {
    pub fn from_new(id: RecordId, rec: NewRecord) -> Self {
        Self {
            id,
            user_id: rec.user_id,
            chat_id: rec.chat_id,
            username: rec.username,
            amount: rec.amount,
            category: rec.category,
            description: rec.description,
            date: rec.date,
        }
    }
}
