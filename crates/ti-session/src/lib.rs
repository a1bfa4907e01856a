//! `ti-session` - Session state for token-insight.
//!
//! Owns the append-only conversation, the step cursor that drives step mode,
//! and the completion sources (single relay or hybrid) that fetch replies.

pub mod config;
pub mod conversation;
pub mod cursor;
pub mod error;
pub mod relay;
pub mod session;
pub mod source;

pub use config::{ClientConfig, ThresholdPreset, ThresholdSetting};
pub use conversation::{ApiMessage, Conversation, Message, Role};
pub use cursor::StepCursor;
pub use error::{ErrorKind, Result, SessionError};
pub use relay::{HttpRelay, RelayRequest};
pub use session::{ChatSession, PendingSubmission};
pub use source::{CompletionSource, HybridSource, Relay, SingleSource};
