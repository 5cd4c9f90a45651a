//! Forma persistida de un `TypedValue`.
//!
//! Layout por columnas (`text`, `text2`, `long`, `double`, `bytes`) para que
//! cualquier backend (memoria, Postgres) almacene el mismo shape:
//!
//! | tipo | columnas |
//! |---|---|
//! | String | text |
//! | Boolean | long (0/1) |
//! | Short/Integer/Long | long |
//! | Double | double |
//! | Date | text (RFC3339, nanos) + long (millis) |
//! | Bytes | bytes |
//! | Object | text (JSON) + text2 (type name) |
//! | File | bytes + text (filename) + text2 (JSON `[mime, encoding]`) |
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{FileValue, ObjectValue, RawValue, SerializationFormat, TypedValue, ValueType};
use crate::errors::VariableError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedValue {
    pub value_type: ValueType,
    pub text: Option<String>,
    pub text2: Option<String>,
    pub long: Option<i64>,
    pub double: Option<f64>,
    pub bytes: Option<Vec<u8>>,
    pub serialization_format: Option<String>,
}

impl SerializedValue {
    fn empty(value_type: ValueType) -> Self {
        Self { value_type,
               text: None,
               text2: None,
               long: None,
               double: None,
               bytes: None,
               serialization_format: None }
    }

    /// Reconstruye el valor durable. Los valores reconstruidos nunca son
    /// transitorios.
    pub fn deserialize(&self) -> Result<TypedValue, VariableError> {
        let corrupt = |what: &str| VariableError::Persistence(format!("corrupt {} value: {what}", self.value_type));
        let value = match self.value_type {
            ValueType::Null => TypedValue::null(),
            ValueType::String => TypedValue::string(self.text.clone().ok_or_else(|| corrupt("missing text"))?),
            ValueType::Boolean => TypedValue::boolean(self.long.ok_or_else(|| corrupt("missing long"))? != 0),
            ValueType::Short => {
                let v = self.long.ok_or_else(|| corrupt("missing long"))?;
                TypedValue::short(i16::try_from(v).map_err(|_| corrupt("short out of range"))?)
            }
            ValueType::Integer => {
                let v = self.long.ok_or_else(|| corrupt("missing long"))?;
                TypedValue::integer(i32::try_from(v).map_err(|_| corrupt("integer out of range"))?)
            }
            ValueType::Long => TypedValue::long(self.long.ok_or_else(|| corrupt("missing long"))?),
            ValueType::Double => TypedValue::double(self.double.ok_or_else(|| corrupt("missing double"))?),
            ValueType::Bytes => TypedValue::bytes(self.bytes.clone().unwrap_or_default()),
            ValueType::Date => {
                let text = self.text.as_deref().ok_or_else(|| corrupt("missing text"))?;
                let ts = DateTime::parse_from_rfc3339(text).map_err(|e| corrupt(&e.to_string()))?;
                TypedValue::date(ts.with_timezone(&Utc))
            }
            ValueType::Object => {
                let text = self.text.as_deref().ok_or_else(|| corrupt("missing text"))?;
                let data = serde_json::from_str(text).map_err(|e| corrupt(&e.to_string()))?;
                let mut v = TypedValue::object(data);
                if let Some(name) = &self.text2 {
                    v = v.type_name(name.clone());
                }
                v
            }
            ValueType::File => {
                let filename = self.text.clone().ok_or_else(|| corrupt("missing filename"))?;
                let (mime_type, encoding) = match self.text2.as_deref() {
                    Some(meta) => serde_json::from_str::<FileMeta>(meta).map_err(|e| corrupt(&e.to_string()))?,
                    None => (None, None),
                };
                TypedValue::file(filename, self.bytes.clone().unwrap_or_default()).file_meta(mime_type, encoding)
            }
        };
        Ok(match &self.serialization_format {
               Some(fmt) => value.serialization_format(SerializationFormat::from(fmt.as_str())),
               None => value,
           })
    }
}

/// Metadatos de fichero en `text2`: `[mime, encoding]`, con `null` para los
/// ausentes.
type FileMeta = (Option<String>, Option<String>);

impl TypedValue {
    /// Forma persistida. Falla con `SerializationUnsupported` si el valor no
    /// tiene un formato utilizable; los transitorios no deberían llegar aquí.
    pub fn serialize(&self, name: &str) -> Result<SerializedValue, VariableError> {
        self.ensure_serializable(name)?;
        let mut out = SerializedValue::empty(self.value_type());
        out.serialization_format = self.format().map(|f| f.mime().to_string());
        match self.raw() {
            RawValue::Null => {}
            RawValue::String(s) => out.text = Some(s.clone()),
            RawValue::Boolean(b) => out.long = Some(i64::from(*b)),
            RawValue::Short(v) => out.long = Some(i64::from(*v)),
            RawValue::Integer(v) => out.long = Some(i64::from(*v)),
            RawValue::Long(v) => out.long = Some(*v),
            RawValue::Double(v) => out.double = Some(*v),
            RawValue::Bytes(b) => out.bytes = Some(b.clone()),
            RawValue::Date(d) => {
                out.text = Some(d.to_rfc3339_opts(SecondsFormat::Nanos, true));
                out.long = Some(d.timestamp_millis());
            }
            RawValue::Object(ObjectValue { type_name, data }) => {
                let json = serde_json::to_string(data).map_err(|_| {
                                                           VariableError::SerializationUnsupported { name: name.to_string(),
                                                                                                     value_type: ValueType::Object }
                                                       })?;
                out.text = Some(json);
                out.text2 = type_name.clone();
            }
            RawValue::File(FileValue { filename,
                                       mime_type,
                                       encoding,
                                       content, }) => {
                out.text = Some(filename.clone());
                out.bytes = Some(content.clone());
                if mime_type.is_some() || encoding.is_some() {
                    let meta: (&Option<String>, &Option<String>) = (mime_type, encoding);
                    let json = serde_json::to_string(&meta).map_err(|_| {
                                                               VariableError::SerializationUnsupported { name: name.to_string(),
                                                                                                         value_type: ValueType::File }
                                                           })?;
                    out.text2 = Some(json);
                }
            }
        }
        Ok(out)
    }
}
