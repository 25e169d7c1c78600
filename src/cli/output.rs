use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{AnswerResponse, OutputFormat};
use crate::strategies::StrategyRegistry;

pub trait Formatter {
    fn format_answer(&self, answer: &AnswerResponse) -> String;
    fn format_strategies(&self, registry: &StrategyRegistry) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &AnswerResponse) -> String {
        let mut output = String::new();
        writeln!(output, "{}", answer.answer).unwrap();
        writeln!(output).unwrap();

        if !answer.references.is_empty() {
            writeln!(output, "References:").unwrap();
            for (n, reference) in &answer.references {
                writeln!(output, "  [{}] {} ({})", n, reference.title, reference.url).unwrap();
            }
            writeln!(output).unwrap();
        }

        let cited: Vec<&str> = answer
            .references
            .values()
            .map(|r| r.page_id.as_str())
            .collect();
        let uncited: Vec<_> = answer
            .all_references
            .iter()
            .filter(|r| !cited.contains(&r.page_id.as_str()))
            .collect();
        if !uncited.is_empty() {
            writeln!(output, "Also consulted:").unwrap();
            for reference in uncited {
                writeln!(output, "  - {} ({})", reference.title, reference.url).unwrap();
            }
            writeln!(output).unwrap();
        }

        if let Some(term) = &answer.search_query {
            writeln!(output, "Search query: {}", term).unwrap();
        }
        writeln!(output, "{}", answer.notes).unwrap();
        output
    }

    fn format_strategies(&self, registry: &StrategyRegistry) -> String {
        let mut output = String::new();
        for (i, (name, display)) in registry.list().into_iter().enumerate() {
            let marker = if i == 0 { " (default)" } else { "" };
            writeln!(output, "{:<16} {}{}", name, display, marker).unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, answer: &AnswerResponse) -> String {
        format!("{}\n", self.render(answer))
    }

    fn format_strategies(&self, registry: &StrategyRegistry) -> String {
        format!("{}\n", self.render(registry))
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        format!("{}\n", serde_json::json!({"error": error}))
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, answer: &AnswerResponse) -> String {
        let mut output = String::new();
        writeln!(output, "{}\n", answer.answer).unwrap();

        if !answer.references.is_empty() {
            writeln!(output, "### References\n").unwrap();
            for (n, reference) in &answer.references {
                writeln!(output, "{}. [{}]({})", n, reference.title, reference.url).unwrap();
            }
            writeln!(output).unwrap();
        }

        if let Some(term) = &answer.search_query {
            writeln!(output, "**Search query:** `{}`\n", term).unwrap();
        }
        writeln!(output, "_{}_", answer.notes).unwrap();
        output
    }

    fn format_strategies(&self, registry: &StrategyRegistry) -> String {
        let mut output = String::new();
        writeln!(output, "| Name | Display name |").unwrap();
        writeln!(output, "|------|--------------|").unwrap();
        for (name, display) in registry.list() {
            writeln!(output, "| `{}` | {} |", name, display).unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
