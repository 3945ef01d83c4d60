use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Substitution token embedded and fewshot templates carry.
pub const INPUT_PLACEHOLDER: &str = "__INPUT__";
const BRACED_INPUT_PLACEHOLDER: &str = "{__INPUT__}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// The template is sent as a leading system message.
    System,
    /// The template wraps the user's input through the placeholder.
    Embedded,
    /// An embedded template laid out as `### INPUT:` ... `### OUTPUT:` blocks.
    Fewshot,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::System => "system",
            RoleKind::Embedded => "embedded",
            RoleKind::Fewshot => "fewshot",
        }
    }

    /// Classify a raw template. Pure: the same text always yields the same kind.
    pub fn detect(template: &str) -> Self {
        if fewshot_pattern().is_match(template) {
            RoleKind::Fewshot
        } else if template.contains(INPUT_PLACEHOLDER) {
            RoleKind::Embedded
        } else {
            RoleKind::System
        }
    }
}

fn fewshot_pattern() -> &'static Regex {
    static FEWSHOT: OnceLock<Regex> = OnceLock::new();
    FEWSHOT.get_or_init(|| {
        Regex::new(r"(?s)###\s*INPUT:.*###\s*OUTPUT:").expect("valid fewshot pattern")
    })
}

/// Replace every bare or brace-wrapped placeholder with `input`. A template
/// without a placeholder comes back unchanged.
pub fn fill_placeholder(template: &str, input: &str) -> String {
    template
        .replace(BRACED_INPUT_PLACEHOLDER, input)
        .replace(INPUT_PLACEHOLDER, input)
}

/// A role as written in the roles catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RoleKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoleConfig {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            kind: None,
            model: None,
            temperature: None,
            top_p: None,
            description: None,
        }
    }

    /// Pair the template with its kind: the explicit one when given, else the detected one.
    pub fn resolve(&self) -> ActiveRole {
        let kind = self.kind.unwrap_or_else(|| RoleKind::detect(&self.template));
        ActiveRole {
            config: self.clone(),
            kind,
        }
    }
}

/// A session-local copy of a catalog role whose kind is fixed.
///
/// The template and its kind are stored together and there is no way to
/// change the template afterwards, so the kind can never go stale.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRole {
    config: RoleConfig,
    kind: RoleKind,
}

impl ActiveRole {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn template(&self) -> &str {
        &self.config.template
    }

    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn model(&self) -> Option<&str> {
        self.config.model.as_deref()
    }

    pub fn temperature(&self) -> Option<f32> {
        self.config.temperature
    }

    pub fn top_p(&self) -> Option<f32> {
        self.config.top_p
    }

    pub fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }
}
