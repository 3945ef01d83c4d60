use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::models::{Message, Role};

pub fn export_to_markdown(
    messages: &[Message],
    model_id: &str,
    role: Option<&str>,
    exported_at: DateTime<Local>,
) -> String {
    let mut output = String::from("# Chat transcript\n\n");
    output.push_str(&format!(
        "> Model: {} | Date: {}\n\n",
        model_id,
        exported_at.format("%Y-%m-%d %H:%M")
    ));

    if let Some(role) = role {
        output.push_str(&format!("> Role: {}\n\n", role));
    }

    output.push_str("---\n\n");

    for msg in messages {
        let role_label = match msg.role() {
            Role::User => "You",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        output.push_str(&format!("### {}\n\n{}\n\n", role_label, msg.content()));
    }

    output
}

pub fn write_export(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write export to {}", path.display()))
}
