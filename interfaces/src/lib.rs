pub mod defs;

pub use defs::{ChatMessage, Item, PublishTask, SendOptions, SourceSpec};
