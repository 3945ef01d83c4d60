use crate::config::DEFAULT_TEMPERATURE;
use crate::models::{fill_placeholder, ActiveRole, Message, RoleConfig, RoleKind};

use super::history::neutralize;

/// Catalog of named role templates plus the rules that turn a user turn into
/// the message list actually sent.
#[derive(Debug, Clone, Default)]
pub struct RoleEngine {
    roles: Vec<RoleConfig>,
}

impl RoleEngine {
    /// Later entries with a duplicate name replace earlier ones.
    pub fn new(roles: Vec<RoleConfig>) -> Self {
        let mut catalog: Vec<RoleConfig> = Vec::with_capacity(roles.len());
        for role in roles {
            match catalog.iter_mut().find(|r| r.name == role.name) {
                Some(existing) => {
                    tracing::warn!("Duplicate role '{}', keeping the last definition", role.name);
                    *existing = role;
                }
                None => catalog.push(role),
            }
        }
        Self { roles: catalog }
    }

    pub fn list(&self) -> &[RoleConfig] {
        &self.roles
    }

    pub fn get(&self, name: &str) -> Option<&RoleConfig> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn detect_kind(template: &str) -> RoleKind {
        RoleKind::detect(template)
    }

    /// Messages for one turn: neutralized history framed by the role.
    pub fn build_messages(
        user_input: &str,
        role: Option<&ActiveRole>,
        history: &[Message],
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        match role {
            None => {
                messages.extend(neutralize(history));
                messages.push(Message::user(user_input));
            }
            Some(role) => match role.kind() {
                RoleKind::System => {
                    messages.push(Message::system(role.template()));
                    messages.extend(neutralize(history));
                    messages.push(Message::user(user_input));
                }
                RoleKind::Embedded | RoleKind::Fewshot => {
                    messages.extend(neutralize(history));
                    messages.push(Message::user(fill_placeholder(role.template(), user_input)));
                }
            },
        }
        messages
    }
}

/// Role value, then caller value, then the fixed default.
pub fn effective_temperature(role: Option<&ActiveRole>, requested: Option<f32>) -> f32 {
    role.and_then(ActiveRole::temperature)
        .or(requested)
        .unwrap_or(DEFAULT_TEMPERATURE)
}

/// Role value, then caller value; `None` leaves top-p out of the payload.
pub fn effective_top_p(role: Option<&ActiveRole>, requested: Option<f32>) -> Option<f32> {
    role.and_then(ActiveRole::top_p).or(requested)
}
