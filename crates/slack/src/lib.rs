//! Slack webhook surface for the relay.
//!
//! - **Events** (`events`) - Events API payload parsing and classification
//! - **Slash commands** (`commands`) - form payloads and in-channel replies
//! - **Notifier** (`notifier`) - `chat.postMessage` and deferred `response_url` delivery
//!
//! ```text
//! POST /events  -> classify -> ack {"status":"ok"} / {"challenge": ..}
//! POST /command -> ack "Received: ..." -> background reply via response_url
//! ```

pub mod commands;
pub mod events;
pub mod notifier;

pub use commands::{InChannelMessage, SlashCommandPayload};
pub use events::{classify, Classification, EventKind, IgnoreReason, InboundEvent};
pub use notifier::{Delivery, Notifier, NotifyError, SlackNotifier};
