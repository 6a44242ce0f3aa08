//! Agent module — conversation store, turn execution, and email reply dispatch.

pub mod dispatch;
pub mod store;
pub mod turn;

pub use dispatch::{DispatchOutcome, EmailResponder};
pub use store::{ConversationStore, Thread};
pub use turn::TurnExecutor;
