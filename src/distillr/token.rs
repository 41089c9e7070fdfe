use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque identifier for an organization, project, query barrel, query,
/// data source, or query run.
///
/// The server sends tokens as JSON numbers, but nothing about them is numeric
/// from the client's point of view. They are kept as text and written back as
/// numbers when they look like one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Token(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Token(value.to_string())
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawToken {
    Number(serde_json::Number),
    Text(String),
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawToken::deserialize(deserializer)? {
            RawToken::Number(n) => Token(n.to_string()),
            RawToken::Text(s) => Token(s),
        })
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<u64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_u64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}
