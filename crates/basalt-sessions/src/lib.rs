pub mod error;
pub mod manager;
pub mod trim;
pub mod types;

pub use error::SessionError;
pub use manager::{current_chat, SessionManager, SessionStats};
pub use trim::trim_to_budget;
pub use types::{Message, ModelVariant, Pin, PinSource, Role, Session, SessionKey, Summary};
