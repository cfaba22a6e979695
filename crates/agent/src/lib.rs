//! Conversation Dispatcher - turns one inbound SMS into a reply and at most
//! one side effect.
//!
//! The dispatcher is stateless per call: it sends the fixed persona prompt
//! plus the single inbound message to the completion service, then either
//! relays the reply verbatim over SMS or decodes a single structured action
//! and executes it against the capability ports.
//!
//! # Architecture
//!
//! 1. **Completion** (`llm`) - one system + user message, one text reply
//! 2. **Action decoding** (`actions`) - strict-JSON tool call or plain text
//! 3. **Dispatch** (`dispatcher`) - execute the action against SMS, lead
//!    store, and appointment ports
//!
//! # Safety principle
//!
//! The model only proposes; the quote math, booking defaults, and fallback
//! texts are fixed here. A malformed model reply degrades to plain text and
//! never aborts a dispatch.

pub mod actions;
pub mod dispatcher;
pub mod llm;
pub mod prompt;

pub use actions::{parse_completion_reply, ActionRequest, ParsedReply};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use llm::{CompletionClient, OpenAiCompletionClient};
