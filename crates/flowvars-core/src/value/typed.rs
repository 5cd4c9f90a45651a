//! `TypedValue`: valor inmutable + tipo + flag `transient`.
//!
//! La transitoriedad es un atributo ortogonal de todos los tipos: cada tipo
//! tiene su constructor "durable" y su contraparte `*_transient`. Un valor
//! transitorio es visible durante la ejecución pero nunca produce registros
//! runtime ni históricos.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::format::SerializationFormat;
use crate::errors::VariableError;

/// Etiqueta de tipo de un valor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Boolean,
    Bytes,
    Date,
    Integer,
    Long,
    Short,
    Double,
    Object,
    File,
    Null,
}

impl ValueType {
    /// Nombre estable en minúsculas (columna `value_type` de los registros).
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Bytes => "bytes",
            ValueType::Date => "date",
            ValueType::Integer => "integer",
            ValueType::Long => "long",
            ValueType::Short => "short",
            ValueType::Double => "double",
            ValueType::Object => "object",
            ValueType::File => "file",
            ValueType::Null => "null",
        }
    }

    pub fn parse(name: &str) -> Option<ValueType> {
        let vt = match name {
            "string" => ValueType::String,
            "boolean" => ValueType::Boolean,
            "bytes" => ValueType::Bytes,
            "date" => ValueType::Date,
            "integer" => ValueType::Integer,
            "long" => ValueType::Long,
            "short" => ValueType::Short,
            "double" => ValueType::Double,
            "object" => ValueType::Object,
            "file" => ValueType::File,
            "null" => ValueType::Null,
            _ => return None,
        };
        Some(vt)
    }

    /// Tipos cuyo valor sólo puede reconstruirse con un formato declarado.
    pub fn requires_format(&self) -> bool {
        matches!(self, ValueType::Object | ValueType::File)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Objeto arbitrario, mantenido como JSON más un nombre de tipo opcional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue {
    pub type_name: Option<String>,
    pub data: Value,
}

impl ObjectValue {
    /// Reconstruye el objeto como un tipo Rust concreto.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Contenido de archivo con nombre, mime type y encoding opcionales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileValue {
    pub filename: String,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub content: Vec<u8>,
}

/// Valor crudo; la variante determina el `ValueType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Null,
    String(String),
    Boolean(bool),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
    Integer(i32),
    Long(i64),
    Short(i16),
    Double(f64),
    Object(ObjectValue),
    File(FileValue),
}

impl RawValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            RawValue::Null => ValueType::Null,
            RawValue::String(_) => ValueType::String,
            RawValue::Boolean(_) => ValueType::Boolean,
            RawValue::Bytes(_) => ValueType::Bytes,
            RawValue::Date(_) => ValueType::Date,
            RawValue::Integer(_) => ValueType::Integer,
            RawValue::Long(_) => ValueType::Long,
            RawValue::Short(_) => ValueType::Short,
            RawValue::Double(_) => ValueType::Double,
            RawValue::Object(_) => ValueType::Object,
            RawValue::File(_) => ValueType::File,
        }
    }
}

/// Valor tipado inmutable.
///
/// Igualdad: dos valores son iguales sii coinciden tipo y valor crudo; ni el
/// flag transitorio ni el formato de serialización participan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedValue {
    raw: RawValue,
    transient: bool,
    serialization_format: Option<SerializationFormat>,
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.value_type() == other.value_type() && self.raw == other.raw
    }
}

macro_rules! typed_constructors {
    ($( $durable:ident, $transient:ident, $arg:ty => $variant:ident );* $(;)?) => {
        $(
            pub fn $durable(value: $arg) -> Self {
                Self::from_raw(RawValue::$variant(value.into()), false)
            }

            pub fn $transient(value: $arg) -> Self {
                Self::from_raw(RawValue::$variant(value.into()), true)
            }
        )*
    };
}

impl TypedValue {
    fn from_raw(raw: RawValue, transient: bool) -> Self {
        let serialization_format = match raw {
            RawValue::File(_) => Some(SerializationFormat::OctetStream),
            _ => None,
        };
        Self { raw,
               transient,
               serialization_format }
    }

    typed_constructors! {
        string, string_transient, impl Into<String> => String;
        boolean, boolean_transient, bool => Boolean;
        bytes, bytes_transient, impl Into<Vec<u8>> => Bytes;
        date, date_transient, DateTime<Utc> => Date;
        integer, integer_transient, i32 => Integer;
        long, long_transient, i64 => Long;
        short, short_transient, i16 => Short;
        double, double_transient, f64 => Double;
    }

    pub fn null() -> Self {
        Self::from_raw(RawValue::Null, false)
    }

    pub fn null_transient() -> Self {
        Self::from_raw(RawValue::Null, true)
    }

    /// Objeto JSON sin formato declarado. Para persistirlo hace falta
    /// `.serialization_format(SerializationFormat::Json)` o un formato por
    /// defecto configurado en el engine.
    pub fn object(data: Value) -> Self {
        Self::from_raw(RawValue::Object(ObjectValue { type_name: None, data }), false)
    }

    pub fn object_transient(data: Value) -> Self {
        Self::object(data).with_transient(true)
    }

    /// Serializa un valor Rust como objeto con formato JSON.
    pub fn object_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_value(value)?;
        Ok(Self::object(data).type_name(std::any::type_name::<T>())
                             .serialization_format(SerializationFormat::Json))
    }

    pub fn file(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::from_raw(RawValue::File(FileValue { filename: filename.into(),
                                                  mime_type: None,
                                                  encoding: None,
                                                  content: content.into() }),
                       false)
    }

    pub fn file_transient(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::file(filename, content).with_transient(true)
    }

    /// Valor sin tipo explícito: el tipo se infiere del JSON.
    ///
    /// - `null` → Null, bool → Boolean, string → String
    /// - enteros que caben en i32 → Integer, resto de enteros → Long
    /// - flotantes → Double
    /// - arrays/objetos → Object con formato JSON
    pub fn untyped(value: Value, transient: bool) -> Self {
        let typed = match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::boolean(b),
            Value::String(s) => Self::string(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Self::integer(small),
                        Err(_) => Self::long(i),
                    }
                } else if let Some(u) = n.as_u64() {
                    // u64 fuera de rango i64: se degrada a double
                    Self::double(u as f64)
                } else {
                    Self::double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            other @ (Value::Array(_) | Value::Object(_)) => {
                Self::object(other).serialization_format(SerializationFormat::Json)
            }
        };
        typed.with_transient(transient)
    }

    /// Copia del valor con el flag transitorio indicado.
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn serialization_format(mut self, format: SerializationFormat) -> Self {
        self.serialization_format = Some(format);
        self
    }

    /// Nombre de tipo para objetos; ignorado en otros tipos.
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        if let RawValue::Object(obj) = &mut self.raw {
            obj.type_name = Some(name.into());
        }
        self
    }

    /// Mime type y encoding para archivos; ignorado en otros tipos.
    pub fn file_meta(mut self, mime_type: Option<String>, encoding: Option<String>) -> Self {
        if let RawValue::File(file) = &mut self.raw {
            file.mime_type = mime_type;
            file.encoding = encoding;
        }
        self
    }

    pub fn value_type(&self) -> ValueType {
        self.raw.value_type()
    }

    pub fn raw(&self) -> &RawValue {
        &self.raw
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_null(&self) -> bool {
        matches!(self.raw, RawValue::Null)
    }

    pub fn format(&self) -> Option<&SerializationFormat> {
        self.serialization_format.as_ref()
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.raw {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.raw {
            RawValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Entero con promoción desde Short/Integer/Long.
    pub fn as_i64(&self) -> Option<i64> {
        match self.raw {
            RawValue::Short(v) => Some(v as i64),
            RawValue::Integer(v) => Some(v as i64),
            RawValue::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.raw {
            RawValue::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Aplica el formato por defecto a objetos que no declararon uno.
    pub(crate) fn with_default_format(self, default: Option<&SerializationFormat>) -> Self {
        if self.value_type() == ValueType::Object && self.serialization_format.is_none() {
            if let Some(fmt) = default {
                return self.serialization_format(fmt.clone());
            }
        }
        self
    }

    /// Verifica que un valor durable pueda reconstruirse desde su forma
    /// persistida. Los transitorios nunca se verifican.
    pub fn ensure_serializable(&self, name: &str) -> Result<(), VariableError> {
        if self.transient || !self.value_type().requires_format() {
            return Ok(());
        }
        match &self.serialization_format {
            Some(fmt) if fmt.supports(self.value_type()) => Ok(()),
            _ => Err(VariableError::SerializationUnsupported { name: name.to_string(),
                                                               value_type: self.value_type() }),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::string(v)
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::string(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::boolean(v)
    }
}

impl From<i16> for TypedValue {
    fn from(v: i16) -> Self {
        TypedValue::short(v)
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        TypedValue::integer(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::long(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::double(v)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(v: Vec<u8>) -> Self {
        TypedValue::bytes(v)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(v: DateTime<Utc>) -> Self {
        TypedValue::date(v)
    }
}
