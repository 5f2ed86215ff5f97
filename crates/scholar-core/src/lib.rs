mod config;
mod session;

pub use config::{AppConfig, LlmBackend, LlmSettings};
pub use session::{ConversationTurn, DocumentRef, Session, SessionStore, TurnRole};
