//! Read-only chat commands: status and a preview of the latest news.
//!
//! Replies are plain text. Nothing here publishes to the channel or records.

use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;
use crate::state::DedupStore;
use crate::traits::{DocumentSource, Inbox, Transport};
use crate::types::SendOptions;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Most items listed by `/news`.
const LATEST_LIMIT: usize = 10;

const ABOUT: &str = "ℹ️ Бот для отримання новин Закарпаття\n\
                     Публікує нові матеріали місцевих видань у каналі за розкладом.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    About,
    Status,
    News,
}

impl Command {
    /// Parse `/status`, `/Status@my_bot` and the like. Arguments are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next()?.to_lowercase();
        match name.as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "about" => Some(Command::About),
            "status" => Some(Command::Status),
            "news" | "latest" => Some(Command::News),
            _ => None,
        }
    }
}

pub struct CommandContext<'a, D: DocumentSource> {
    pub store: &'a DedupStore,
    pub pipeline: &'a Pipeline<D>,
    pub scheduler: &'a Scheduler,
}

impl<D: DocumentSource> CommandContext<'_, D> {
    pub async fn handle(&self, command: Command, now: DateTime<Utc>) -> String {
        match command {
            Command::Start => format!(
                "🏔 Вітаємо у боті Закарпатських новин!\n\n\
                 {}\n\n\
                 /news - Останні новини\n\
                 /status - Стан бота\n\
                 /help - Допомога",
                ABOUT
            ),
            Command::Help => "Доступні команди:\n\
                              /start - Запустити бота\n\
                              /news - Останні новини\n\
                              /status - Стан бота\n\
                              /about - Про бота\n\
                              /help - Показати це повідомлення"
                .to_string(),
            Command::About => ABOUT.to_string(),
            Command::Status => self.status(now),
            Command::News => self.latest().await,
        }
    }

    /// Reply to every recognised command waiting in `inbox`. Other messages are ignored.
    ///
    /// Returns how many replies were delivered.
    pub async fn answer_pending<T: Transport>(
        &self,
        inbox: &mut dyn Inbox,
        transport: &T,
        now: DateTime<Utc>,
    ) -> usize {
        let messages = match inbox.receive().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Could not poll for chat commands: {}", e);
                return 0;
            }
        };

        let options = SendOptions {
            disable_link_preview: true,
        };
        let mut answered = 0;
        for message in messages {
            let Some(command) = Command::parse(&message.text) else {
                debug!("Ignoring chat message from {}", message.chat);
                continue;
            };

            let reply = self.handle(command, now).await;
            match transport.send(&message.chat, &reply, options).await {
                Ok(()) => {
                    info!("Answered {:?} in chat {}", command, message.chat);
                    answered += 1;
                }
                Err(e) => warn!("Reply to {:?} in chat {} failed: {}", command, message.chat, e),
            }
        }
        answered
    }

    fn status(&self, now: DateTime<Utc>) -> String {
        let hours: Vec<String> = self.scheduler.hours().map(|h| format!("{:02}:00", h)).collect();
        let next = self
            .scheduler
            .next_trigger(now)
            .map(|t| t.format("%Y-%m-%d %H:%M %Z").to_string())
            .unwrap_or_else(|| "—".to_string());

        format!(
            "ℹ️ Стан бота\n\
             Опубліковано посилань: {}\n\
             Джерел: {}\n\
             Години публікації: {}\n\
             Наступна публікація: {}",
            self.store.len(),
            self.pipeline.sources().len(),
            if hours.is_empty() { "—".to_string() } else { hours.join(", ") },
            next
        )
    }

    async fn latest(&self) -> String {
        let latest = self.pipeline.preview(self.store).await;
        if latest.is_empty() {
            return "📰 Зараз немає новин.".to_string();
        }

        let mut text = "📰 Останні новини Закарпаття:\n".to_string();
        for (index, (item, novel)) in latest.iter().take(LATEST_LIMIT).enumerate() {
            let mark = if *novel { "🆕 " } else { "" };
            text.push_str(&format!("\n{}. {}{} ({})\n{}\n", index + 1, mark, item.title, item.source, item.url));
        }
        text
    }
}
