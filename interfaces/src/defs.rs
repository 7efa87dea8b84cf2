use serde::{Deserialize, Serialize};

/// One configured place news is pulled from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub endpoint: String,
}

/// A candidate news entry. Identity is the canonical `url`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    pub source: String,
}

impl Item {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub disable_link_preview: bool,
}

/// An item bound for a channel. Built per novel item and consumed right away.
#[derive(Debug)]
pub struct PublishTask<'a> {
    pub channel: &'a str,
    pub item: &'a Item,
}

/// A text message sent to the bot from a chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub chat: String,
    pub text: String,
}

// Object style note:
// Items are produced fresh on every extraction and never mutated afterwards.
// Anything that needs to remember an item across runs remembers its url only.
