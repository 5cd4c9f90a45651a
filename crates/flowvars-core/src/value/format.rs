use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValueType;

pub const JSON_MIME: &str = "application/json";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// Formato de serialización declarado para Object/File.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SerializationFormat {
    Json,
    OctetStream,
    /// Formato desconocido para el engine; nunca es persistible.
    Other(String),
}

impl SerializationFormat {
    pub fn mime(&self) -> &str {
        match self {
            SerializationFormat::Json => JSON_MIME,
            SerializationFormat::OctetStream => OCTET_STREAM_MIME,
            SerializationFormat::Other(s) => s,
        }
    }

    /// Object se persiste como JSON, File como bytes crudos.
    pub fn supports(&self, value_type: ValueType) -> bool {
        matches!((self, value_type),
                 (SerializationFormat::Json, ValueType::Object) | (SerializationFormat::OctetStream, ValueType::File))
    }
}

impl From<&str> for SerializationFormat {
    fn from(s: &str) -> Self {
        match s {
            JSON_MIME | "json" => SerializationFormat::Json,
            OCTET_STREAM_MIME => SerializationFormat::OctetStream,
            other => SerializationFormat::Other(other.to_string()),
        }
    }
}

impl From<String> for SerializationFormat {
    fn from(s: String) -> Self {
        SerializationFormat::from(s.as_str())
    }
}

impl From<SerializationFormat> for String {
    fn from(f: SerializationFormat) -> Self {
        f.mime().to_string()
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
