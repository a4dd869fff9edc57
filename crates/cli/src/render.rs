//! Turns tool results into the lines each command prints.

use serde_json::Value;

use bk_mcp_client::{ContentItem, ToolOutput};

pub const CLI_WORKING: &str = "BlueKit CLI is working!";
pub const MAGIC_CREATED: &str = "✅ .magic.md file created successfully!";

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// `init`, `apply` and `call`: the message plus any data, or the whole result.
pub fn result_lines(output: &ToolOutput) -> Vec<String> {
    match output {
        ToolOutput::Text(text) => vec![text.clone()],
        ToolOutput::Message { message, data, .. } => {
            let mut lines = vec![message.clone()];
            if let Some(data) = data {
                lines.push(pretty(data));
            }
            lines
        }
        ToolOutput::Content { .. } => match output.text_items() {
            Some(text) => vec![text],
            None => vec![pretty(&output.to_value())],
        },
        ToolOutput::Raw(value) => vec![pretty(value)],
    }
}

/// `plan` and `generate`: every text item, or the message.
pub fn intent_lines(output: &ToolOutput) -> Vec<String> {
    match output {
        ToolOutput::Text(text) => vec![text.clone()],
        ToolOutput::Message { message, .. } => vec![message.clone()],
        ToolOutput::Content { items, .. } => items
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.clone()),
                ContentItem::Other(_) => None,
            })
            .collect(),
        ToolOutput::Raw(value) => vec![pretty(value)],
    }
}

/// `magic`: the joined text items, falling back to a success note.
pub fn magic_lines(output: &ToolOutput) -> Vec<String> {
    match output {
        ToolOutput::Text(text) => vec![text.clone()],
        ToolOutput::Content { .. } => {
            vec![output.text_items().unwrap_or_else(|| MAGIC_CREATED.to_owned())]
        }
        ToolOutput::Message { .. } | ToolOutput::Raw(_) => vec![
            MAGIC_CREATED.to_owned(),
            format!("Response: {}", pretty(&output.to_value())),
        ],
    }
}

/// `ping` with a reply.
pub fn ping_lines(output: &ToolOutput) -> Vec<String> {
    match output {
        ToolOutput::Text(text) => vec![text.clone()],
        ToolOutput::Message { message, .. } => vec![message.clone()],
        ToolOutput::Content { .. } | ToolOutput::Raw(_) => vec![
            CLI_WORKING.to_owned(),
            format!("MCP server response: {}", pretty(&output.to_value())),
        ],
    }
}

/// `ping` when the bridge could not be reached.
pub fn ping_unavailable_lines(error: &dyn std::fmt::Display) -> Vec<String> {
    let mut lines = vec![CLI_WORKING.to_owned()];
    let message = error.to_string();
    if !message.is_empty() {
        lines.push(format!("Note: MCP server unavailable - {message}"));
    }
    lines
}
