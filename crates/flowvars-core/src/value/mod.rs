//! Valores tipados (`TypedValue`), su forma persistida y mapas de variables.

mod format;
mod map;
mod serialized;
mod typed;

pub use format::{SerializationFormat, JSON_MIME, OCTET_STREAM_MIME};
pub use map::VariableMap;
pub use serialized::SerializedValue;
pub use typed::{FileValue, ObjectValue, RawValue, TypedValue, ValueType};
