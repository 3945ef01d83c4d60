pub mod config_store;
pub mod export;
pub mod history;
pub mod markdown;
pub mod roles;
pub mod session;

pub use config_store::{AppConfig, ConfigStore, YamlConfigStore};
pub use history::{neutralize, ConversationHistory};
pub use roles::RoleEngine;
pub use session::{ChatError, ChatSession, SessionOptions, SyncOutcome};
