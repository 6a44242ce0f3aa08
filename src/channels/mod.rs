//! Front-ends and the mailbox integration.

pub mod address;
pub mod composio;
pub mod console;
pub mod mailbox;
pub mod trigger;

pub use address::extract_address;
pub use composio::{ComposioMailbox, MailboxConfig};
pub use console::{CONSOLE_THREAD_ID, run_console};
pub use mailbox::{EventStream, InboundEvent, Mailbox};
