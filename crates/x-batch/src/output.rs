//! Result serialization

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use x_batch_engine::{Item, Sequence};

use crate::error::Error;

/// Serialization method applied to result sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Xhtml,
    Text,
}

impl OutputMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMethod::Xml => "xml",
            OutputMethod::Html => "html",
            OutputMethod::Xhtml => "xhtml",
            OutputMethod::Text => "text",
        }
    }
}

impl fmt::Display for OutputMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(OutputMethod::Xml),
            "html" => Ok(OutputMethod::Html),
            "xhtml" => Ok(OutputMethod::Xhtml),
            "text" => Ok(OutputMethod::Text),
            _ => Err(Error::InvalidArgument(format!(
                "unknown output method {:?} (expected xml, html, xhtml or text)",
                s
            ))),
        }
    }
}

/// Writes result items into an output buffer.
///
/// Each call hands its buffer to the caller and starts the next one empty,
/// so output from one document never leaks into the next. No XML
/// declaration is written and items are concatenated without a separator.
#[derive(Debug, Default)]
pub struct Serializer {
    buffer: String,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize(&mut self, method: OutputMethod, sequence: &Sequence) -> String {
        self.buffer.clear();
        for item in sequence {
            match (method, item) {
                (OutputMethod::Text, item) => self.buffer.push_str(&item.string_value()),
                (_, Item::Node(node)) => self.buffer.push_str(&node.markup),
                (_, Item::Atomic(atomic)) => escape_into(&mut self.buffer, &atomic.lexical()),
            }
        }
        std::mem::take(&mut self.buffer)
    }
}

fn escape_into(buffer: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => buffer.push_str("&amp;"),
            '<' => buffer.push_str("&lt;"),
            '>' => buffer.push_str("&gt;"),
            c => buffer.push(c),
        }
    }
}
