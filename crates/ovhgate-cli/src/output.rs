//! Output formatting and writing utilities
//!
//! Results go to stdout in JSON, YAML or a human-readable layout. Status
//! messages are only shown in human mode so machine formats stay parseable.

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::logging::redaction;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ovhgate_core::{ToolDefinition, ToolOutput};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tracing::{debug, trace};

/// Formatting for the value types the CLI prints
pub trait OutputFormatter {
    /// Format a serializable value
    fn format<T: Serialize>(&self, value: &T) -> Result<String>;

    /// Format the tool catalog
    fn format_tool_list(&self, tools: &[ToolDefinition]) -> Result<String>;

    /// Format a single tool with its input schema
    fn format_tool(&self, tool: &ToolDefinition) -> Result<String>;

    /// Format the result of a tool call
    fn format_tool_output(&self, output: &ToolOutput) -> Result<String>;
}

impl OutputFormatter for OutputFormat {
    fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string(value)?),
            OutputFormat::JsonPretty | OutputFormat::Human => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }

    fn format_tool_list(&self, tools: &[ToolDefinition]) -> Result<String> {
        match self {
            OutputFormat::Human => Ok(format_tool_list_human(tools)),
            _ => {
                let described: Vec<Value> = tools.iter().map(|t| t.describe()).collect();
                self.format(&described)
            }
        }
    }

    fn format_tool(&self, tool: &ToolDefinition) -> Result<String> {
        match self {
            OutputFormat::Human => format_tool_human(tool),
            _ => self.format(&tool.describe()),
        }
    }

    fn format_tool_output(&self, output: &ToolOutput) -> Result<String> {
        match self {
            OutputFormat::Human => Ok(serde_json::to_string_pretty(&output.data)?),
            _ => self.format(output),
        }
    }
}

fn format_tool_list_human(tools: &[ToolDefinition]) -> String {
    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for tool in tools {
        let marker = if tool.mutating { " [mutating]" } else { "" };
        out.push_str(&format!(
            "{:<width$}  {}{}\n",
            tool.name,
            tool.description,
            marker,
            width = width
        ));
    }
    out.trim_end().to_string()
}

fn format_tool_human(tool: &ToolDefinition) -> Result<String> {
    let mut out = format!(
        "{}\n  {}\n  {} {}\n",
        tool.name,
        tool.description,
        tool.method.as_method(),
        tool.path
    );
    if tool.mutating {
        out.push_str("  Mutating: not retried on failure\n");
    }
    if tool.params.is_empty() {
        out.push_str("  No arguments");
    } else {
        out.push_str("  Arguments:\n");
        for param in tool.params {
            let required = if param.required { "required" } else { "optional" };
            out.push_str(&format!(
                "    {} ({}): {}\n",
                param.name, required, param.description
            ));
        }
        out.push_str("  Input schema:\n");
        out.push_str(&serde_json::to_string_pretty(&tool.input_schema())?);
    }
    Ok(out)
}

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    show_progress: bool,
    quiet: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer on stdout
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool, show_progress: bool) -> Self {
        Self {
            format,
            use_color,
            show_progress: show_progress && !quiet && io::stderr().is_terminal(),
            quiet,
            writer: Box::new(io::stdout()),
        }
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(format: OutputFormat, use_color: bool, quiet: bool, writer: Box<dyn Write>) -> Self {
        Self {
            format,
            use_color,
            show_progress: false,
            quiet,
            writer,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write raw output
    pub fn write(&mut self, content: &str) -> Result<()> {
        write!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an info message
    pub fn info(&mut self, message: &str) -> Result<()> {
        debug!("Output info: {}", message);

        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("{} {}", "ℹ".blue(), message))
        } else {
            self.writeln(&format!("INFO: {}", message))
        }
    }

    /// Write a success message
    pub fn success(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.green().to_string())
        } else {
            self.writeln(message)
        }
    }

    /// Write a section header
    pub fn section(&mut self, title: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("═══ {} ═══", title).bright_blue().to_string())
        } else {
            self.writeln(&format!("=== {} ===", title))
        }
    }

    /// Write data in the configured format
    pub fn data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let mut value_json = serde_json::to_value(value)?;
        redaction::redact_json_value(&mut value_json);
        trace!(
            "Outputting data: {}",
            serde_json::to_string(&value_json).unwrap_or_else(|_| "[failed to serialize]".to_string())
        );

        let formatted = self.format.format(value)?;
        self.finish_block(&formatted)
    }

    pub fn tool_list(&mut self, tools: &[ToolDefinition]) -> Result<()> {
        let formatted = self.format.format_tool_list(tools)?;
        self.finish_block(&formatted)
    }

    pub fn tool(&mut self, tool: &ToolDefinition) -> Result<()> {
        let formatted = self.format.format_tool(tool)?;
        self.finish_block(&formatted)
    }

    pub fn tool_output(&mut self, output: &ToolOutput) -> Result<()> {
        let formatted = self.format.format_tool_output(output)?;
        self.finish_block(&formatted)
    }

    // YAML already ends with a newline
    fn finish_block(&mut self, formatted: &str) -> Result<()> {
        if formatted.ends_with('\n') {
            self.write(formatted)
        } else {
            self.writeln(formatted)
        }
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(default_spinner_style());
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

fn default_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
