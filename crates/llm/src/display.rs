use crate::types::{ContentBlock, Message, MessageContent};
use std::fmt;

impl fmt::Display for ContentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBlock::Text { text } => {
                writeln!(f, "Text: {}", text.replace('\n', "\n    "))
            }
            ContentBlock::ToolUse {
                id, name, input, ..
            } => {
                writeln!(f, "ToolUse: id={id}, name={name}")?;
                writeln!(
                    f,
                    "  Input: {}",
                    serde_json::to_string_pretty(input)
                        .unwrap_or_else(|_| input.to_string())
                        .replace('\n', "\n  ")
                )
            }
            ContentBlock::ToolResult {
                tool_use_id,
                name,
                content,
                is_error,
            } => {
                let error_suffix = if *is_error == Some(true) { " (ERROR)" } else { "" };
                writeln!(f, "ToolResult: tool_use_id={tool_use_id}, name={name}{error_suffix}")?;
                writeln!(
                    f,
                    "  Content: {}",
                    serde_json::to_string_pretty(content)
                        .unwrap_or_else(|_| content.to_string())
                        .replace('\n', "\n  ")
                )
            }
            ContentBlock::ExecutableCode { language, code } => {
                writeln!(f, "ExecutableCode: language={language}")?;
                writeln!(f, "  Code: {}", code.replace('\n', "\n  "))
            }
            ContentBlock::CodeExecutionResult { outcome, output } => {
                writeln!(f, "CodeExecutionResult: outcome={outcome}")?;
                writeln!(f, "  Output: {}", output.replace('\n', "\n  "))
            }
        }
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageContent::Text(content) => {
                writeln!(f, "Text: {}", content.replace('\n', "\n  "))
            }
            MessageContent::Structured(blocks) => {
                writeln!(f, "Structured content with {} blocks:", blocks.len())?;
                for (k, block) in blocks.iter().enumerate() {
                    write!(f, "  Block {k}: ")?;
                    // Block output already ends with a newline
                    let block_output = format!("{block}");
                    write!(f, "{}", block_output.replace('\n', "\n  "))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Role: {:?}", self.role)?;
        write!(f, "{}", self.content)
    }
}
