use std::path::PathBuf;

/// How answers are printed. Replaced wholesale by `:set`, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub timing: bool,
    pub markdown: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            timing: false,
            markdown: true,
        }
    }
}

impl DisplayOptions {
    pub fn with(self, option: DisplayOption) -> Self {
        match option {
            DisplayOption::Timing(timing) => Self { timing, ..self },
            DisplayOption::Markdown(markdown) => Self { markdown, ..self },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOption {
    Timing(bool),
    Markdown(bool),
}

impl DisplayOption {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "timing" => Some(DisplayOption::Timing(true)),
            "notiming" => Some(DisplayOption::Timing(false)),
            "markdown" => Some(DisplayOption::Markdown(true)),
            "nomarkdown" => Some(DisplayOption::Markdown(false)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleArg {
    Show,
    Clear,
    Activate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    /// Clear the terminal.
    Clear,
    /// Forget the conversation.
    Reset,
    Last,
    /// List models, or switch by list number or identifier.
    Models(Option<String>),
    Model(String),
    Sync(Option<String>),
    Set(DisplayOption),
    Role(RoleArg),
    ListRoles,
    History,
    Export(Option<PathBuf>),
    Usage(&'static str),
    Unknown(String),
}

pub struct CommandSpec {
    pub names: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        names: &["exit", "q"],
        usage: ":exit, :q",
        help: "Leave the chat.",
    },
    CommandSpec {
        names: &["help"],
        usage: ":help",
        help: "Show this list.",
    },
    CommandSpec {
        names: &["clear"],
        usage: ":clear",
        help: "Clear the screen.",
    },
    CommandSpec {
        names: &["reset"],
        usage: ":reset",
        help: "Forget the conversation so far.",
    },
    CommandSpec {
        names: &["last"],
        usage: ":last",
        help: "Print the last answer again, unformatted.",
    },
    CommandSpec {
        names: &["models"],
        usage: ":models [n|provider:model]",
        help: "List models, or switch to one by number or identifier.",
    },
    CommandSpec {
        names: &["model"],
        usage: ":model provider:model",
        help: "Switch to another model.",
    },
    CommandSpec {
        names: &["updateollama", "sync"],
        usage: ":updateollama [provider]",
        help: "Refresh a self-hosted provider's model list.",
    },
    CommandSpec {
        names: &["set"],
        usage: ":set timing|notiming|markdown|nomarkdown",
        help: "Change how answers are shown.",
    },
    CommandSpec {
        names: &["role"],
        usage: ":role [name|none]",
        help: "Show, activate or clear the prompt role.",
    },
    CommandSpec {
        names: &["listroles"],
        usage: ":listroles",
        help: "List the available roles.",
    },
    CommandSpec {
        names: &["history"],
        usage: ":history",
        help: "Print the stored conversation.",
    },
    CommandSpec {
        names: &["export"],
        usage: ":export [file]",
        help: "Save the conversation as Markdown.",
    },
];

pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    let mut text = String::from("Commands:\n");
    for command in COMMANDS {
        text.push_str(&format!("  {:<width$}  {}\n", command.usage, command.help, width = width));
    }
    text.push_str("Anything else is sent to the model.");
    text
}

/// Parse one input line. `None` means the line is a chat turn.
pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix(':')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let name = parts.next().filter(|n| !n.is_empty())?;
    let args = parts.next().map(str::trim).filter(|a| !a.is_empty());

    let command = match name.to_ascii_lowercase().as_str() {
        "exit" | "q" => Command::Exit,
        "help" => Command::Help,
        "clear" => Command::Clear,
        "reset" => Command::Reset,
        "last" => Command::Last,
        "models" => Command::Models(args.map(str::to_string)),
        "model" => match args {
            Some(id) => Command::Model(id.to_string()),
            None => Command::Usage("Usage: :model provider:model"),
        },
        "updateollama" | "sync" => Command::Sync(args.map(str::to_string)),
        "set" => match args.and_then(DisplayOption::parse) {
            Some(option) => Command::Set(option),
            None => Command::Usage("Usage: :set timing|notiming|markdown|nomarkdown"),
        },
        "role" => Command::Role(match args {
            None => RoleArg::Show,
            Some(arg) if arg.eq_ignore_ascii_case("none") => RoleArg::Clear,
            Some(arg) => RoleArg::Activate(arg.to_string()),
        }),
        "listroles" => Command::ListRoles,
        "history" => Command::History,
        "export" => Command::Export(args.map(PathBuf::from)),
        _ => Command::Unknown(name.to_string()),
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_turn() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("  what is :q?"), None);
        assert_eq!(parse_command(":"), None);
    }

    #[test]
    fn test_basic_commands() {
        assert_eq!(parse_command(":q"), Some(Command::Exit));
        assert_eq!(parse_command(" :EXIT "), Some(Command::Exit));
        assert_eq!(parse_command(":help"), Some(Command::Help));
        assert_eq!(parse_command(":listroles"), Some(Command::ListRoles));
        assert_eq!(parse_command(":clear"), Some(Command::Clear));
        assert_eq!(parse_command(":reset"), Some(Command::Reset));
        assert_eq!(parse_command(":last"), Some(Command::Last));
        assert_eq!(
            parse_command(":frobnicate now"),
            Some(Command::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_model_arguments_keep_colons() {
        assert_eq!(
            parse_command(":model ollama:llama3.2:latest"),
            Some(Command::Model("ollama:llama3.2:latest".to_string()))
        );
        assert_eq!(parse_command(":models 2"), Some(Command::Models(Some("2".to_string()))));
        assert_eq!(parse_command(":models"), Some(Command::Models(None)));
        assert!(matches!(parse_command(":model"), Some(Command::Usage(_))));
    }

    #[test]
    fn test_role_arguments() {
        assert_eq!(parse_command(":role"), Some(Command::Role(RoleArg::Show)));
        assert_eq!(parse_command(":role None"), Some(Command::Role(RoleArg::Clear)));
        assert_eq!(
            parse_command(":role %code%"),
            Some(Command::Role(RoleArg::Activate("%code%".to_string())))
        );
    }

    #[test]
    fn test_sync_alias() {
        assert_eq!(parse_command(":updateollama"), Some(Command::Sync(None)));
        assert_eq!(
            parse_command(":sync lab"),
            Some(Command::Sync(Some("lab".to_string())))
        );
    }

    #[test]
    fn test_set_replaces_display_options() {
        let options = DisplayOptions::default();
        let Some(Command::Set(option)) = parse_command(":set timing") else {
            panic!("expected :set");
        };
        let updated = options.with(option);
        assert!(updated.timing);
        assert!(!options.timing);
        assert_eq!(updated.markdown, options.markdown);

        let updated = updated.with(DisplayOption::Markdown(false));
        assert!(!updated.markdown);
        assert!(matches!(parse_command(":set loud"), Some(Command::Usage(_))));
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for command in COMMANDS {
            assert!(help.contains(command.usage));
        }
    }
}
