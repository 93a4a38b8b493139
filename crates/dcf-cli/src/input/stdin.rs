use serde_json::Value;
use std::io::{self, Read};

/// Read a piped JSON or YAML request from stdin.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_document(&buffer)
}

fn parse_document(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // JSON is valid YAML, but the JSON parser gives better error messages
    if trimmed.starts_with('{') {
        return Ok(Some(serde_json::from_str(trimmed)?));
    }
    let value: Value = serde_yaml::from_str(trimmed)?;
    Ok(Some(value))
}
