//! Mail Assist: answers inbound email with a chat model, one thread per conversation.

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;

pub use error::{Error, Result};
