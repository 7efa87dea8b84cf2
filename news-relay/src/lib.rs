pub mod commands;
pub mod config;
pub mod fetcher;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod publisher;
pub mod rss_utils;
pub mod scheduler;
pub mod sources;
pub mod state;
pub mod traits;
pub mod types;

pub use types::*;
pub use commands::{Command, CommandContext};
pub use config::Config;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use pipeline::{Pipeline, RunReport};
pub use publisher::{Publisher, TelegramInbox, TelegramTransport};
pub use scheduler::Scheduler;
pub use sources::ExtractorRegistry;
pub use state::DedupStore;
pub use traits::{DocumentSource, Extractor, Inbox, Transport};
