//! Expense bot application service.
//!
//! Maps one decoded [`Incoming`] update to one [`Outcome`]. Every failure is
//! contained here: parse errors become hint replies, store errors are logged
//! and answered with a generic reply. Nothing propagates to the adapter.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    aggregate::{aggregate, GroupBy, Scope},
    config::Config,
    domain::NewRecord,
    format::{
        format_cleared, format_listing, format_recorded, format_stats, format_today_total,
        ADD_USAGE, HELP_TEXT, STORE_FAILURE_REPLY, USAGE_HINT,
    },
    messaging::{CommandMessage, Incoming, Outcome, Sender, TextMessage},
    parser::{parse_add_args, parse_entry, ParseOutcome, ParsedEntry},
    security::{is_authorized, RateLimiter},
    store::RecordStore,
    Error,
};

const UNAUTHORIZED_REPLY: &str = "未授权：请联系机器人管理员。";

pub struct ExpenseBot {
    cfg: Arc<Config>,
    store: Arc<dyn RecordStore>,
    rate_limiter: Mutex<RateLimiter>,
    username: OnceLock<String>,
}

impl ExpenseBot {
    pub fn new(cfg: Arc<Config>, store: Arc<dyn RecordStore>) -> Self {
        let rate_limiter = Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ));
        Self {
            cfg,
            store,
            rate_limiter,
            username: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Record the bot's own username so `/cmd@other_bot` can be told apart.
    /// Only the first call has an effect.
    pub fn set_username(&self, username: &str) {
        let _ = self.username.set(username.trim_start_matches('@').to_string());
    }

    pub async fn handle(&self, incoming: Incoming) -> Outcome {
        self.handle_at(incoming, Utc::now()).await
    }

    pub async fn handle_at(&self, incoming: Incoming, now: DateTime<Utc>) -> Outcome {
        match incoming {
            Incoming::Command(cmd) => {
                if !cmd.is_addressed_to(self.username.get().map(String::as_str)) {
                    tracing::debug!(
                        chat_id = cmd.sender.chat_id.0,
                        mention = cmd.mention.as_deref(),
                        "command for another bot"
                    );
                    return Outcome::Silent;
                }
                if let Some(denied) = self.gate(&cmd.sender).await {
                    return denied;
                }
                self.handle_command(cmd, now).await
            }
            Incoming::Text(msg) => self.handle_text(msg, now).await,
        }
    }

    /// Authorization + rate limiting. `Some` is the refusal to send.
    async fn gate(&self, sender: &Sender) -> Option<Outcome> {
        if !is_authorized(sender.user_id, &self.cfg.telegram_allowed_users) {
            tracing::warn!(user_id = sender.user_id.0, "unauthorized sender");
            return Some(Outcome::reply(UNAUTHORIZED_REPLY));
        }

        let (allowed, retry_after) = self.rate_limiter.lock().await.check(sender.user_id);
        if !allowed {
            let secs = retry_after.map(|d| d.as_secs_f64().ceil() as u64).unwrap_or(1);
            tracing::info!(user_id = sender.user_id.0, secs, "rate limited");
            return Some(Outcome::reply(format!("请求太频繁，请 {secs} 秒后再试。")));
        }
        None
    }

    async fn handle_text(&self, msg: TextMessage, now: DateTime<Utc>) -> Outcome {
        match parse_entry(&msg.text, now) {
            ParseOutcome::Ignored => {
                tracing::debug!(chat_id = msg.sender.chat_id.0, "ignoring unrecognized text");
                if self.cfg.unrecognized_hint {
                    return Outcome::reply(USAGE_HINT);
                }
                Outcome::Silent
            }
            ParseOutcome::Invalid(e) => {
                if let Some(denied) = self.gate(&msg.sender).await {
                    return denied;
                }
                Outcome::reply(format!("{e}\n{USAGE_HINT}"))
            }
            ParseOutcome::Entry(entry) => {
                if let Some(denied) = self.gate(&msg.sender).await {
                    return denied;
                }
                self.record(&msg.sender, entry).await
            }
        }
    }

    async fn handle_command(&self, cmd: CommandMessage, now: DateTime<Utc>) -> Outcome {
        let sender = &cmd.sender;
        let in_group = sender.chat_kind.is_group();

        match cmd.name.as_str() {
            "start" | "help" => Outcome::reply(HELP_TEXT),

            "add" => match parse_add_args(&cmd.args, now) {
                Ok(entry) => self.record(sender, entry).await,
                Err(e) => Outcome::reply(format!("{e}\n{ADD_USAGE}")),
            },

            "total" => {
                let today = now.with_timezone(&self.cfg.utc_offset).date_naive();
                let base = if in_group {
                    Scope::member(sender.user_id, sender.chat_id)
                } else {
                    Scope::user(sender.user_id)
                };
                let scope = base.on_day(today, self.cfg.utc_offset);

                match self.store.records(&scope).await {
                    Ok(records) => Outcome::reply(format_today_total(&aggregate(
                        &records,
                        &scope,
                        GroupBy::None,
                    ))),
                    Err(e) => store_failure("total", e),
                }
            }

            "list" => {
                let scope = Scope::chat(sender.chat_id);
                match self.store.recent(&scope, self.cfg.list_limit).await {
                    Ok(records) => Outcome::reply(format_listing(&records, self.cfg.utc_offset)),
                    Err(e) => store_failure("list", e),
                }
            }

            "stats" => {
                let (title, by) = if in_group {
                    ("本群统计：", GroupBy::User)
                } else {
                    ("我的统计：", GroupBy::None)
                };
                self.stats(Scope::chat(sender.chat_id), title, by).await
            }

            "mystats" => {
                let title = if in_group {
                    "我在本群的统计："
                } else {
                    "我的统计："
                };
                self.stats(
                    Scope::member(sender.user_id, sender.chat_id),
                    title,
                    GroupBy::None,
                )
                .await
            }

            "categories" => {
                self.stats(Scope::chat(sender.chat_id), "分类统计：", GroupBy::Category)
                    .await
            }

            "clear" => match self.store.clear_chat(sender.chat_id).await {
                Ok(removed) => {
                    tracing::info!(chat_id = sender.chat_id.0, removed, "cleared chat records");
                    Outcome::reply(format_cleared(removed))
                }
                Err(e) => store_failure("clear", e),
            },

            other => Outcome::reply(format!("未知命令：/{other}\n发送 /help 查看用法。")),
        }
    }

    async fn stats(&self, scope: Scope, title: &str, by: GroupBy) -> Outcome {
        match self.store.records(&scope).await {
            Ok(records) => Outcome::reply(format_stats(&aggregate(&records, &scope, by), title, by)),
            Err(e) => store_failure("stats", e),
        }
    }

    async fn record(&self, sender: &Sender, entry: ParsedEntry) -> Outcome {
        let rec = NewRecord {
            user_id: sender.user_id,
            chat_id: sender.chat_id,
            username: sender.username.clone(),
            amount: entry.amount,
            category: entry.category,
            description: entry.description,
            date: entry.date,
        };

        match self.store.append(rec).await {
            Ok(stored) => {
                tracing::info!(
                    chat_id = stored.chat_id.0,
                    user_id = stored.user_id.0,
                    id = stored.id.0,
                    amount = stored.amount,
                    "recorded entry"
                );
                Outcome::reply(format_recorded(&stored))
            }
            Err(e) => store_failure("append", e),
        }
    }
}

fn store_failure(op: &str, e: Error) -> Outcome {
    tracing::error!(op, error = %e, "record store failure");
    Outcome::reply(STORE_FAILURE_REPLY)
}
