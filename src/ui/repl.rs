use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::commands::{help_text, parse_command, Command, DisplayOptions, RoleArg};
use crate::models::Role;
use crate::services::export::{export_to_markdown, write_export};
use crate::services::markdown::render_ansi;
use crate::services::{ChatSession, ConfigStore};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Line-oriented front end over a [`ChatSession`].
pub struct Repl<W: Write> {
    session: ChatSession,
    store: Box<dyn ConfigStore>,
    display: DisplayOptions,
    out: W,
}

impl<W: Write> Repl<W> {
    pub fn new(session: ChatSession, store: Box<dyn ConfigStore>, out: W) -> Self {
        Self {
            session,
            store,
            display: DisplayOptions::default(),
            out,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn display(&self) -> DisplayOptions {
        self.display
    }

    /// Read lines from stdin until `:exit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "Chatting with {}. Type :help for commands.",
            self.session.current_model().id
        )?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.prompt()?;
            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                break;
            };
            if self.handle_line(&line).await? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Send a single question and print the answer. A failed turn is an error.
    pub async fn one_shot(&mut self, question: &str) -> Result<()> {
        let started = Instant::now();
        let answer = self.session.send(question).await?;
        self.print_answer(&answer, started.elapsed())
    }

    fn prompt(&mut self) -> Result<()> {
        let label = match self.session.active_role() {
            Some(role) => format!("{} [{}]", self.session.current_model().id, role.name()),
            None => self.session.current_model().id.clone(),
        };
        write!(self.out, "{}> ", label)?;
        self.out.flush()?;
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        match parse_command(line) {
            Some(command) => self.execute(command).await,
            None => {
                self.ask(line.trim()).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn ask(&mut self, input: &str) -> Result<()> {
        let started = Instant::now();
        match self.session.send(input).await {
            Ok(answer) => self.print_answer(&answer, started.elapsed()),
            Err(e) => {
                writeln!(self.out, "Error: {}", e)?;
                Ok(())
            }
        }
    }

    fn print_answer(&mut self, answer: &str, elapsed: Duration) -> Result<()> {
        let text = if self.display.markdown {
            render_ansi(answer)
        } else {
            answer.to_string()
        };
        writeln!(self.out, "{}", text)?;
        if self.display.timing {
            writeln!(self.out, "[{:.2}s]", elapsed.as_secs_f64())?;
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => writeln!(self.out, "{}", help_text())?,
            Command::Clear => {
                write!(self.out, "{}", CLEAR_SCREEN)?;
                self.out.flush()?;
            }
            Command::Reset => {
                self.session.clear_history();
                writeln!(self.out, "History cleared.")?;
            }
            Command::Last => match self.session.last_answer() {
                Some(answer) => writeln!(self.out, "{}", answer)?,
                None => writeln!(self.out, "No answer yet.")?,
            },
            Command::Models(None) => self.list_models()?,
            Command::Models(Some(choice)) => {
                let models = self.session.list_models();
                let target = match choice.parse::<usize>() {
                    Ok(n) if (1..=models.len()).contains(&n) => models[n - 1].clone(),
                    Ok(n) => {
                        writeln!(self.out, "No model number {}.", n)?;
                        return Ok(Flow::Continue);
                    }
                    Err(_) => choice,
                };
                self.switch_model(&target)?;
            }
            Command::Model(id) => self.switch_model(&id)?,
            Command::Sync(provider) => {
                match self
                    .session
                    .sync_models(self.store.as_mut(), provider.as_deref())
                    .await
                {
                    Ok(outcome) => {
                        writeln!(
                            self.out,
                            "{} now has {} model(s):",
                            outcome.provider,
                            outcome.models.len()
                        )?;
                        for model in &outcome.models {
                            writeln!(self.out, "  {}:{}", outcome.provider, model.name)?;
                        }
                        if let Some(id) = outcome.switched_to {
                            writeln!(self.out, "Current model is gone. Switched to {}.", id)?;
                        }
                    }
                    Err(e) => writeln!(self.out, "Error: {}", e)?,
                }
            }
            Command::Set(option) => {
                self.display = self.display.with(option);
                writeln!(
                    self.out,
                    "timing: {}, markdown: {}",
                    on_off(self.display.timing),
                    on_off(self.display.markdown)
                )?;
            }
            Command::Role(RoleArg::Show) => match self.session.active_role() {
                Some(role) => writeln!(self.out, "Role: {} ({})", role.name(), role.kind().as_str())?,
                None => writeln!(self.out, "No role active.")?,
            },
            Command::Role(RoleArg::Clear) => {
                self.session.clear_role();
                writeln!(
                    self.out,
                    "Role cleared. Using {}.",
                    self.session.current_model().id
                )?;
            }
            Command::Role(RoleArg::Activate(name)) => match self.session.set_role(&name) {
                Ok(()) => writeln!(
                    self.out,
                    "Role {} active. Using {}.",
                    name,
                    self.session.current_model().id
                )?,
                Err(e) => writeln!(self.out, "Error: {}", e)?,
            },
            Command::ListRoles => self.list_roles()?,
            Command::History => self.print_history()?,
            Command::Export(path) => self.export(path)?,
            Command::Usage(usage) => writeln!(self.out, "{}", usage)?,
            Command::Unknown(name) => {
                writeln!(self.out, "Unknown command :{}. Type :help for commands.", name)?
            }
        }
        Ok(Flow::Continue)
    }

    fn switch_model(&mut self, id: &str) -> Result<()> {
        match self.session.switch_model(id) {
            Ok(()) => writeln!(self.out, "Switched to {}.", self.session.current_model().id)?,
            Err(e) => writeln!(self.out, "Error: {}", e)?,
        }
        Ok(())
    }

    fn list_models(&mut self) -> Result<()> {
        let current = self.session.current_model().id.clone();
        for (i, id) in self.session.list_models().iter().enumerate() {
            let marker = if *id == current { "*" } else { " " };
            writeln!(self.out, "{} {:>2}. {}", marker, i + 1, id)?;
        }
        Ok(())
    }

    fn list_roles(&mut self) -> Result<()> {
        let roles = self.session.roles().list();
        if roles.is_empty() {
            writeln!(self.out, "No roles defined.")?;
            return Ok(());
        }
        for config in roles {
            let role = config.resolve();
            let mut line = format!("  {} ({})", role.name(), role.kind().as_str());
            if let Some(model) = role.model() {
                line.push_str(&format!(" -> {}", model));
            }
            if let Some(description) = role.description() {
                line.push_str(&format!(": {}", description));
            }
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn print_history(&mut self) -> Result<()> {
        if self.session.history().is_empty() {
            writeln!(self.out, "History is empty.")?;
            return Ok(());
        }
        for message in self.session.history() {
            let label = match message.role() {
                Role::User => "you",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            writeln!(self.out, "{}: {}", label, message.content())?;
        }
        Ok(())
    }

    fn export(&mut self, path: Option<PathBuf>) -> Result<()> {
        let now = Local::now();
        let path = path.unwrap_or_else(|| {
            PathBuf::from(format!("chat-{}.md", now.format("%Y%m%d-%H%M%S")))
        });
        let contents = export_to_markdown(
            self.session.history(),
            &self.session.current_model().id,
            self.session.active_role().map(|r| r.name()),
            now,
        );
        match write_export(&path, &contents) {
            Ok(()) => writeln!(self.out, "Exported to {}.", path.display())?,
            Err(e) => writeln!(self.out, "Error: {:#}", e)?,
        }
        Ok(())
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::YamlConfigStore;
    use crate::services::SessionOptions;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_config(dir: &TempDir, base: &str) -> YamlConfigStore {
        let config = format!(
            "default: openai:gpt-4o\nclients:\n  - type: openai\n    api_base: {base}/v1\n    api_key: sk-test\n    models:\n      - name: gpt-4o\n      - name: gpt-4o-mini\n  - type: ollama\n    name: local\n    api_base: {base}/v1\n    models:\n      - name: old\n"
        );
        let roles = "roles:\n  - name: terse\n    template: Answer briefly.\n    description: short answers\n";
        fs_write(dir, "configs.yaml", &config);
        fs_write(dir, "roles.yaml", roles);
        YamlConfigStore::load(&dir.path().join("configs.yaml"), None).unwrap()
    }

    fn fs_write(dir: &TempDir, name: &str, contents: &str) {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }

    fn repl(store: YamlConfigStore) -> Repl<Vec<u8>> {
        let session = ChatSession::initialize(&store, SessionOptions::default()).unwrap();
        Repl::new(session, Box::new(store), Vec::new())
    }

    fn output(repl: &mut Repl<Vec<u8>>) -> String {
        String::from_utf8(std::mem::take(&mut repl.out)).unwrap()
    }

    #[tokio::test]
    async fn test_turn_prints_answer_and_records_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "plain answer"}}]
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut repl = repl(write_config(&dir, &server.uri()));

        assert_eq!(repl.handle_line("hello").await.unwrap(), Flow::Continue);
        assert!(output(&mut repl).contains("plain answer"));
        assert_eq!(repl.session().history().len(), 2);

        repl.handle_line(":set timing").await.unwrap();
        assert!(repl.display().timing);
        repl.handle_line(":history").await.unwrap();
        let printed = output(&mut repl);
        assert!(printed.contains("you: hello"));
        assert!(printed.contains("assistant: plain answer"));

        repl.handle_line(":last").await.unwrap();
        assert_eq!(output(&mut repl), "plain answer\n");
    }

    #[tokio::test]
    async fn test_clear_wipes_screen_and_reset_wipes_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "kept"}}]
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut repl = repl(write_config(&dir, &server.uri()));
        repl.handle_line("hello").await.unwrap();
        output(&mut repl);

        repl.handle_line(":clear").await.unwrap();
        assert_eq!(output(&mut repl), "\x1b[2J\x1b[H");
        assert_eq!(repl.session().history().len(), 2);

        repl.handle_line(":reset").await.unwrap();
        assert!(output(&mut repl).contains("History cleared."));
        assert!(repl.session().history().is_empty());

        repl.handle_line(":last").await.unwrap();
        assert!(output(&mut repl).contains("No answer yet."));
    }

    #[tokio::test]
    async fn test_failed_turn_is_reported_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut repl = repl(write_config(&dir, &server.uri()));

        assert_eq!(repl.handle_line("hello").await.unwrap(), Flow::Continue);
        assert!(output(&mut repl).contains("Error: HTTP 401: bad key"));
        assert!(repl.session().history().is_empty());
        assert!(repl.one_shot("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_model_and_role_commands() {
        let dir = TempDir::new().unwrap();
        let mut repl = repl(write_config(&dir, "http://127.0.0.1:9"));

        repl.handle_line(":models").await.unwrap();
        let listing = output(&mut repl);
        assert!(listing.contains("*  1. openai:gpt-4o"));
        assert!(listing.contains("3. local:old"));

        repl.handle_line(":models 2").await.unwrap();
        assert_eq!(repl.session().current_model().id, "openai:gpt-4o-mini");
        repl.handle_line(":model nope:nothing").await.unwrap();
        assert!(output(&mut repl).contains("Error: Provider 'nope' not found"));
        assert_eq!(repl.session().current_model().id, "openai:gpt-4o-mini");

        repl.handle_line(":listroles").await.unwrap();
        assert!(output(&mut repl).contains("terse (system): short answers"));
        repl.handle_line(":role terse").await.unwrap();
        assert_eq!(repl.session().active_role().map(|r| r.name()), Some("terse"));
        repl.handle_line(":role none").await.unwrap();
        assert!(repl.session().active_role().is_none());
        assert_eq!(repl.session().current_model().id, "openai:gpt-4o");

        assert_eq!(repl.handle_line(":q").await.unwrap(), Flow::Exit);
    }

    #[tokio::test]
    async fn test_sync_command_refreshes_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "qwen2.5:7b"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut repl = repl(write_config(&dir, &server.uri()));

        repl.handle_line(":model local:old").await.unwrap();
        output(&mut repl);
        repl.handle_line(":updateollama").await.unwrap();
        let printed = output(&mut repl);
        assert!(printed.contains("local:qwen2.5:7b"));
        assert!(printed.contains("Switched to openai:gpt-4o."));
        assert_eq!(repl.session().current_model().id, "openai:gpt-4o");
        assert!(repl
            .session()
            .list_models()
            .contains(&"local:qwen2.5:7b".to_string()));
        assert!(!repl.session().list_models().contains(&"local:old".to_string()));
    }

    #[tokio::test]
    async fn test_export_writes_transcript() {
        let dir = TempDir::new().unwrap();
        let mut repl = repl(write_config(&dir, "http://127.0.0.1:9"));
        let target = dir.path().join("out.md");

        repl.handle_line(&format!(":export {}", target.display()))
            .await
            .unwrap();
        assert!(output(&mut repl).contains("Exported to"));
        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.contains("> Model: openai:gpt-4o"));
    }
}
