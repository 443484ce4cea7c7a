use colored::{ColoredString, Colorize};
use std::io::IsTerminal;

/// Kind of status line, each with its own marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Skip,
}

/// Terminal presentation. Built once at startup and handed to whatever prints.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    color: bool,
}

impl Console {
    pub fn new(color: bool) -> Self {
        Console { color }
    }

    /// Colour unless disabled or stdout is not a terminal
    pub fn detect(no_color: bool) -> Self {
        Console::new(!no_color && std::io::stdout().is_terminal())
    }

    pub fn plain() -> Self {
        Console::new(false)
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(text, |t| t.bold())
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint(text, |t| t.dimmed())
    }

    pub fn cyan(&self, text: &str) -> String {
        self.paint(text, |t| t.bright_cyan())
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(text, |t| t.bright_green())
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(text, |t| t.bright_yellow())
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(text, |t| t.bright_red())
    }

    pub fn magenta(&self, text: &str) -> String {
        self.paint(text, |t| t.bright_magenta())
    }

    pub fn heading(&self, text: &str) -> String {
        self.paint(text, |t| t.bold().bright_cyan())
    }

    pub fn marker(&self, status: Status) -> String {
        match status {
            Status::Success => self.green("✓"),
            Status::Error => self.red("✗"),
            Status::Warning => self.yellow("!"),
            Status::Skip => self.dim("○"),
        }
    }

    pub fn status_line(&self, status: Status, message: &str, indent: usize) -> String {
        format!("{}{} {}", "  ".repeat(indent), self.marker(status), message)
    }

    pub fn status(&self, status: Status, message: &str, indent: usize) {
        println!("{}", self.status_line(status, message, indent));
    }

    /// Errors go to stderr with the same marker
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.status_line(Status::Error, message, 0));
    }

    pub fn rule(&self) -> String {
        self.dim(&"─".repeat(60))
    }
}
