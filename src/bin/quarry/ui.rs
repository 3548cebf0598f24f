//! Terminal output for the `quarry` binary.

use std::fmt::Display;
use std::io::IsTerminal;
use std::time::Duration;

use nu_ansi_term::{Color, Style};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// What a piece of output is, independent of how the theme colors it.
#[derive(Clone, Copy, Debug)]
enum Role {
    Heading,
    Key,
    Text,
    Null,
    Marker,
    Info,
    Done,
    Problem,
}

impl Theme {
    fn style(self, role: Role) -> Style {
        let light = self == Theme::Light;
        let color = match (role, light) {
            (Role::Heading, false) => Color::Purple,
            (Role::Heading, true) => Color::Blue,
            (Role::Key | Role::Marker, false) => Color::LightBlue,
            (Role::Key, true) => Color::Black,
            (Role::Marker, true) => Color::Blue,
            (Role::Text | Role::Done, false) => Color::LightGreen,
            (Role::Text | Role::Done, true) => Color::Green,
            (Role::Null, _) => Color::DarkGray,
            (Role::Info, false) => Color::LightCyan,
            (Role::Info, true) => Color::Purple,
            (Role::Problem, false) => Color::Yellow,
            (Role::Problem, true) => Color::Red,
        };
        let style = Style::new().fg(color);
        match role {
            Role::Heading | Role::Key | Role::Done | Role::Problem => style.bold(),
            _ => style,
        }
    }
}

pub struct Ui {
    theme: Theme,
    paint: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let paint = theme != Theme::Plain && !quiet && std::io::stdout().is_terminal();
        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }
        Self {
            theme,
            paint,
            quiet,
        }
    }

    fn paint(&self, role: Role, text: impl Display) -> String {
        if self.paint {
            self.theme.style(role).paint(text.to_string()).to_string()
        } else {
            text.to_string()
        }
    }

    /// Aligned `key: value` rows under a heading; nothing when `rows` is empty.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let Some(width) = rows.iter().map(|(key, _)| key.len()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            let key = self.paint(Role::Key, format!("{key:>width$}:"));
            println!("  {key} {}", self.paint(Role::Text, value));
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.heading(title);
        let marker = if self.paint { "•" } else { "-" };
        for entry in entries {
            println!("  {} {entry}", self.paint(Role::Marker, marker));
        }
    }

    /// Prints a JSON document; keys, strings, and nulls are colored when painting.
    pub fn document(&self, value: &Value) {
        if !self.paint {
            let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            println!("{text}");
            return;
        }
        let mut out = String::new();
        self.render(value, 0, &mut out);
        println!("{out}");
    }

    fn render(&self, value: &Value, depth: usize, out: &mut String) {
        let indent = |level: usize| "  ".repeat(level);
        match value {
            Value::Object(map) if !map.is_empty() => {
                out.push_str("{\n");
                for (index, (key, item)) in map.iter().enumerate() {
                    out.push_str(&indent(depth + 1));
                    out.push_str(&self.paint(Role::Key, format!("{key:?}")));
                    out.push_str(": ");
                    self.render(item, depth + 1, out);
                    out.push_str(if index + 1 < map.len() { ",\n" } else { "\n" });
                }
                out.push_str(&indent(depth));
                out.push('}');
            }
            Value::Array(items) if !items.is_empty() => {
                out.push_str("[\n");
                for (index, item) in items.iter().enumerate() {
                    out.push_str(&indent(depth + 1));
                    self.render(item, depth + 1, out);
                    out.push_str(if index + 1 < items.len() { ",\n" } else { "\n" });
                }
                out.push_str(&indent(depth));
                out.push(']');
            }
            Value::String(_) => out.push_str(&self.paint(Role::Text, value)),
            Value::Null => out.push_str(&self.paint(Role::Null, "null")),
            other => out.push_str(&other.to_string()),
        }
    }

    /// Progress notes go to stderr so stdout stays a clean document.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {message}", self.paint(Role::Info, "ℹ"));
        }
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            println!("{message}");
        } else {
            println!("{} {message}", self.paint(Role::Done, "✔"));
        }
    }

    pub fn warn(&self, message: &str) {
        if self.quiet {
            eprintln!("{message}");
        } else {
            eprintln!("{} {message}", self.paint(Role::Problem, "⚠"));
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            println!("{}", self.paint(Role::Heading, format!("▸ {title}")));
        }
    }
}

/// `1.25s` above a second, `12.50ms` below.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{:.2}ms", secs * 1_000.0)
    }
}
