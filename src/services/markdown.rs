use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const RULE: &str = "────────────────────────────────";

#[derive(Debug, Clone, Copy, Default)]
struct Style {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    code: bool,
    heading: bool,
    link: bool,
}

impl Style {
    fn sgr(&self) -> String {
        let mut codes = Vec::new();
        if self.bold || self.heading {
            codes.push("1");
        }
        if self.italic {
            codes.push("3");
        }
        if self.heading || self.link {
            codes.push("4");
        }
        if self.strikethrough {
            codes.push("9");
        }
        if self.code {
            codes.push("36");
        }
        if codes.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", codes.join(";"))
        }
    }

    fn is_plain(&self) -> bool {
        !(self.bold || self.italic || self.strikethrough || self.code || self.heading || self.link)
    }
}

/// Render a model answer as ANSI-styled terminal text.
pub fn render_ansi(input: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut renderer = AnsiRenderer::default();
    for event in Parser::new_ext(input, options) {
        renderer.handle_event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct AnsiRenderer {
    out: String,
    style: Style,
    in_code_block: bool,
    quote_depth: usize,
    /// One entry per open list: the next item number, or `None` for bullets.
    lists: Vec<Option<u64>>,
    link_url: Option<String>,
    link_text: String,
    mid_line: bool,
}

impl AnsiRenderer {
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::SoftBreak => self.write(" "),
            Event::HardBreak => self.newline(),
            Event::Rule => {
                self.ensure_line_start();
                self.write_prefixed(&format!("{}{}{}", DIM, RULE, RESET));
                self.newline();
                self.newline();
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { .. } => {
                self.ensure_line_start();
                self.set_style(|s| s.heading = true);
            }
            Tag::Strong => self.set_style(|s| s.bold = true),
            Tag::Emphasis => self.set_style(|s| s.italic = true),
            Tag::Strikethrough => self.set_style(|s| s.strikethrough = true),
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.link_text.clear();
                self.set_style(|s| s.link = true);
            }
            Tag::CodeBlock(kind) => {
                self.ensure_line_start();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    let lang = lang.trim();
                    if !lang.is_empty() {
                        self.write_prefixed(&format!("{}[{}]{}", DIM, lang, RESET));
                        self.newline();
                    }
                }
            }
            Tag::BlockQuote(_) => {
                self.ensure_line_start();
                self.quote_depth += 1;
            }
            Tag::List(start) => {
                self.ensure_line_start();
                self.lists.push(start);
            }
            Tag::Item => {
                self.ensure_line_start();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.write_prefixed(&format!("{}{}", "  ".repeat(depth), marker));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.newline();
                if self.lists.is_empty() {
                    self.newline();
                }
            }
            TagEnd::Heading(_) => {
                self.set_style(|s| s.heading = false);
                self.newline();
                self.newline();
            }
            TagEnd::Strong => self.set_style(|s| s.bold = false),
            TagEnd::Emphasis => self.set_style(|s| s.italic = false),
            TagEnd::Strikethrough => self.set_style(|s| s.strikethrough = false),
            TagEnd::Link => {
                self.set_style(|s| s.link = false);
                if let Some(url) = self.link_url.take() {
                    if url != self.link_text {
                        self.out.push_str(&format!(" {}({}){}", DIM, url, RESET));
                    }
                }
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.newline();
            }
            TagEnd::BlockQuote(_) => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.newline();
                }
            }
            TagEnd::Item => self.ensure_line_start(),
            _ => {}
        }
    }

    fn text(&mut self, text: &CowStr) {
        if self.in_code_block {
            for line in text.lines() {
                self.write_prefixed(&format!("    {}{}{}", DIM, line, RESET));
                self.newline();
            }
            return;
        }
        if self.link_url.is_some() {
            self.link_text.push_str(text);
        }
        self.write(text);
    }

    fn inline_code(&mut self, code: &CowStr) {
        self.set_style(|s| s.code = true);
        self.write(code);
        self.set_style(|s| s.code = false);
    }

    fn set_style(&mut self, change: impl FnOnce(&mut Style)) {
        let was_plain = self.style.is_plain();
        change(&mut self.style);
        if !was_plain {
            self.out.push_str(RESET);
        }
        self.out.push_str(&self.style.sgr());
    }

    fn ensure_line_start(&mut self) {
        if self.mid_line {
            self.newline();
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.mid_line = false;
    }

    /// Write text, adding the quote gutter when a new line begins.
    fn write(&mut self, text: &str) {
        if !self.mid_line {
            self.write_prefixed(text);
        } else {
            self.out.push_str(text);
        }
    }

    fn write_prefixed(&mut self, text: &str) {
        for _ in 0..self.quote_depth {
            self.out.push_str(DIM);
            self.out.push_str("│ ");
            self.out.push_str(RESET);
            self.out.push_str(&self.style.sgr());
        }
        self.out.push_str(text);
        self.mid_line = true;
    }

    fn finish(mut self) -> String {
        if !self.style.is_plain() {
            self.out.push_str(RESET);
        }
        let trimmed = self.out.trim_end_matches('\n').len();
        self.out.truncate(trimmed);
        self.out
    }
}
