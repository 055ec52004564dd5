use std::{collections::HashMap, sync::Arc};

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    types::BotCommand,
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use tally_core::bot::ExpenseBot;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<ExpenseBot>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Per-chat mutex so messages of one chat are handled in arrival order while
/// different chats proceed concurrently. Entries nobody holds or waits on are
/// dropped on the next lock.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub fn bot_commands() -> Vec<BotCommand> {
    [
        ("help", "使用说明"),
        ("add", "记一笔：/add 金额 类别 描述"),
        ("total", "今日花费"),
        ("list", "最近的记录"),
        ("stats", "收支统计"),
        ("mystats", "我在本群的统计"),
        ("categories", "分类汇总"),
        ("clear", "清空本聊天的记录"),
    ]
    .into_iter()
    .map(|(cmd, desc)| BotCommand::new(cmd, desc))
    .collect()
}

pub async fn run_polling(expense_bot: Arc<ExpenseBot>) -> anyhow::Result<()> {
    let bot = Bot::new(expense_bot.config().telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), "tally bot started");
            expense_bot.set_username(me.username());
        }
        Err(e) => tracing::warn!(
            error = %e,
            "get_me failed; commands with an @mention will be ignored"
        ),
    }

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!(error = %e, "failed to register bot commands");
    }

    let state = Arc::new(AppState {
        bot: expense_bot,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            tracing::debug!(update_id = ?upd.id, "unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "error while handling an update",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_handled_command() {
        let names: Vec<String> = bot_commands().into_iter().map(|c| c.command).collect();
        for cmd in ["help", "add", "total", "list", "stats", "mystats", "categories", "clear"] {
            assert!(names.iter().any(|n| n == cmd), "{cmd}");
        }
    }

    #[tokio::test]
    async fn chat_locks_are_per_chat() {
        let locks = ChatLocks::default();
        let _a = locks.lock_chat(1).await;
        // A different chat is not blocked by chat 1.
        let b = tokio::time::timeout(std::time::Duration::from_millis(100), locks.lock_chat(2)).await;
        assert!(b.is_ok());
        // The same chat is.
        let c = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(c.is_err());
    }

    #[tokio::test]
    async fn idle_chat_locks_are_dropped() {
        let locks = ChatLocks::default();
        for chat in 0..100 {
            drop(locks.lock_chat(chat).await);
        }
        let held = locks.lock_chat(7).await;
        assert_eq!(locks.len().await, 1);

        // A held lock survives pruning and still blocks its chat.
        drop(locks.lock_chat(8).await);
        assert_eq!(locks.len().await, 2);
        let again =
            tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock_chat(7)).await;
        assert!(again.is_err());
        drop(held);
    }
}
