pub mod message;
pub mod provider;
pub mod role;

pub use message::{Message, Role};
pub use provider::{ModelConfig, ProviderConfig, ProviderKind};
pub use role::{fill_placeholder, ActiveRole, RoleConfig, RoleKind, INPUT_PLACEHOLDER};
