//! Binary DMR encoding, its base64 transport form, and the JSON rendering.
//!
//! The binary form is a one byte type tag followed by big endian data. Tags are
//! `Z I J D d i` for scalars and lower case `b e l o p s t u` for the rest.
//! Strings use the length prefixed "modified UTF-8" layout of Java's
//! `DataOutput`.
//!
//! Decoding never trusts declared lengths beyond the remaining input, and
//! nesting is capped at [`MAX_DEPTH`].

use std::io::{self, Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::model_node::{ModelNode, ModelType, Property};

const EXPRESSION_VALUE: &str = "EXPRESSION_VALUE";
const TYPE_MODEL_VALUE: &str = "TYPE_MODEL_VALUE";
const BYTES_VALUE: &str = "BYTES_VALUE";

/// Deepest list, object or property nesting accepted when decoding.
pub const MAX_DEPTH: usize = 256;

/// Errors raised while encoding or decoding a value tree.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown type tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unsupported model type {}", .0.name())]
    Unsupported(ModelType),

    #[error("string of {0} encoded bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),

    #[error("negative length {0}")]
    NegativeLength(i32),

    #[error("declared length {length} exceeds the {remaining} remaining bytes")]
    LengthExceedsInput { length: usize, remaining: usize },

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("malformed modified UTF-8 string")]
    MalformedString,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelNode {
    /// Serializes the tree into the binary DMR form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Vec::new();
        write_node(&mut buffer, self)?;
        Ok(buffer)
    }

    /// Parses a complete binary DMR payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = bytes;
        let node = read_node(&mut reader, 0)?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes(reader.len()));
        }
        Ok(node)
    }

    /// Transport encoding: base64 over the binary form.
    pub fn to_base64_string(&self) -> Result<String, CodecError> {
        Ok(BASE64_STANDARD.encode(self.to_bytes()?))
    }

    /// Inverse of [`ModelNode::to_base64_string`]. Surrounding whitespace is ignored.
    pub fn from_base64(payload: &str) -> Result<Self, CodecError> {
        let bytes = BASE64_STANDARD.decode(payload.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Renders the tree as JSON. `compact` drops all indentation.
    pub fn to_json_string(&self, compact: bool) -> String {
        let value = self.to_json_value();
        let rendered = if compact {
            serde_json::to_string(&value)
        } else {
            serde_json::to_string_pretty(&value)
        };
        rendered.unwrap_or_else(|_| "null".to_string())
    }

    /// Parses a JSON document into a tree.
    pub fn from_json_str(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from(value))
    }

    pub fn to_json_value(&self) -> Value {
        match self {
            ModelNode::Undefined => Value::Null,
            ModelNode::Boolean(value) => Value::Bool(*value),
            ModelNode::Int(value) => Value::from(*value),
            ModelNode::Long(value) => Value::from(*value),
            ModelNode::Double(value) => Number::from_f64(*value).map(Value::Number).unwrap_or(Value::Null),
            ModelNode::String(value) => Value::String(value.clone()),
            ModelNode::Expression(value) => single_key_object(EXPRESSION_VALUE, Value::String(value.clone())),
            ModelNode::Type(model_type) => single_key_object(TYPE_MODEL_VALUE, Value::String(model_type.name().to_string())),
            ModelNode::Bytes(bytes) => single_key_object(BYTES_VALUE, Value::String(BASE64_STANDARD.encode(bytes))),
            ModelNode::List(items) => Value::Array(items.iter().map(ModelNode::to_json_value).collect()),
            ModelNode::Object(map) => Value::Object(map.iter().map(|(key, value)| (key.clone(), value.to_json_value())).collect()),
            ModelNode::Property(property) => single_key_object(&property.name, property.value.to_json_value()),
        }
    }
}

impl From<Value> for ModelNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ModelNode::Undefined,
            Value::Bool(value) => ModelNode::Boolean(value),
            Value::Number(number) => {
                if let Some(long) = number.as_i64() {
                    i32::try_from(long).map(ModelNode::Int).unwrap_or(ModelNode::Long(long))
                } else {
                    ModelNode::Double(number.as_f64().unwrap_or_default())
                }
            }
            Value::String(text) => ModelNode::String(text),
            Value::Array(items) => ModelNode::List(items.into_iter().map(ModelNode::from).collect()),
            Value::Object(map) => object_from_json(map),
        }
    }
}

fn single_key_object(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn object_from_json(map: Map<String, Value>) -> ModelNode {
    if map.len() == 1 {
        if let Some(Value::String(text)) = map.get(EXPRESSION_VALUE) {
            return ModelNode::Expression(text.clone());
        }
        if let Some(Value::String(text)) = map.get(BYTES_VALUE)
            && let Ok(bytes) = BASE64_STANDARD.decode(text)
        {
            return ModelNode::Bytes(bytes);
        }
    }
    let object: IndexMap<String, ModelNode> = map.into_iter().map(|(key, value)| (key, ModelNode::from(value))).collect();
    ModelNode::Object(object)
}

fn write_node<W: Write>(writer: &mut W, node: &ModelNode) -> Result<(), CodecError> {
    writer.write_all(&[node.model_type().tag()])?;
    match node {
        ModelNode::Undefined => {}
        ModelNode::Boolean(value) => writer.write_all(&[u8::from(*value)])?,
        ModelNode::Int(value) => writer.write_all(&value.to_be_bytes())?,
        ModelNode::Long(value) => writer.write_all(&value.to_be_bytes())?,
        ModelNode::Double(value) => writer.write_all(&value.to_bits().to_be_bytes())?,
        ModelNode::String(value) | ModelNode::Expression(value) => write_utf(writer, value)?,
        ModelNode::Bytes(bytes) => {
            write_length(writer, bytes.len())?;
            writer.write_all(bytes)?;
        }
        ModelNode::Type(model_type) => writer.write_all(&[model_type.tag()])?,
        ModelNode::List(items) => {
            write_length(writer, items.len())?;
            for item in items {
                write_node(writer, item)?;
            }
        }
        ModelNode::Object(map) => {
            write_length(writer, map.len())?;
            for (key, value) in map {
                write_utf(writer, key)?;
                write_node(writer, value)?;
            }
        }
        ModelNode::Property(property) => {
            write_utf(writer, &property.name)?;
            write_node(writer, &property.value)?;
        }
    }
    Ok(())
}

fn read_node(reader: &mut &[u8], depth: usize) -> Result<ModelNode, CodecError> {
    let tag = read_u8(reader)?;
    let model_type = ModelType::from_tag(tag).ok_or(CodecError::UnknownTag(tag))?;
    if matches!(model_type, ModelType::List | ModelType::Object | ModelType::Property) && depth >= MAX_DEPTH {
        return Err(CodecError::TooDeep(MAX_DEPTH));
    }

    let node = match model_type {
        ModelType::Undefined => ModelNode::Undefined,
        ModelType::Boolean => ModelNode::Boolean(read_u8(reader)? != 0),
        ModelType::Int => ModelNode::Int(i32::from_be_bytes(read_array(reader)?)),
        ModelType::Long => ModelNode::Long(i64::from_be_bytes(read_array(reader)?)),
        ModelType::Double => ModelNode::Double(f64::from_bits(u64::from_be_bytes(read_array(reader)?))),
        ModelType::String => ModelNode::String(read_utf(reader)?),
        ModelType::Expression => ModelNode::Expression(read_utf(reader)?),
        ModelType::Bytes => {
            let length = read_length(reader)?;
            ModelNode::Bytes(take(reader, length)?.to_vec())
        }
        ModelType::Type => {
            let inner = read_u8(reader)?;
            ModelNode::Type(ModelType::from_tag(inner).ok_or(CodecError::UnknownTag(inner))?)
        }
        ModelType::List => {
            // Every item takes at least its tag byte.
            let count = read_length(reader)?;
            check_remaining(reader, count)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_node(reader, depth + 1)?);
            }
            ModelNode::List(items)
        }
        ModelType::Object => {
            // Every entry takes at least a key length and a tag.
            let count = read_length(reader)?;
            check_remaining(reader, count.saturating_mul(3))?;
            let mut map = IndexMap::with_capacity(count);
            for _ in 0..count {
                let key = read_utf(reader)?;
                let value = read_node(reader, depth + 1)?;
                map.insert(key, value);
            }
            ModelNode::Object(map)
        }
        ModelType::Property => {
            let name = read_utf(reader)?;
            let value = read_node(reader, depth + 1)?;
            ModelNode::Property(Box::new(Property { name, value }))
        }
        ModelType::BigDecimal | ModelType::BigInteger => return Err(CodecError::Unsupported(model_type)),
    };
    Ok(node)
}

fn check_remaining(reader: &[u8], length: usize) -> Result<(), CodecError> {
    if length > reader.len() {
        return Err(CodecError::LengthExceedsInput {
            length,
            remaining: reader.len(),
        });
    }
    Ok(())
}

fn take<'a>(reader: &mut &'a [u8], length: usize) -> Result<&'a [u8], CodecError> {
    let input: &'a [u8] = *reader;
    check_remaining(input, length)?;
    let (head, rest) = input.split_at(length);
    *reader = rest;
    Ok(head)
}

fn read_u8(reader: &mut &[u8]) -> Result<u8, CodecError> {
    let [byte] = read_array::<1>(reader)?;
    Ok(byte)
}

fn read_array<const N: usize>(reader: &mut &[u8]) -> Result<[u8; N], CodecError> {
    let mut buffer = [0u8; N];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

fn write_length<W: Write>(writer: &mut W, length: usize) -> Result<(), CodecError> {
    let length = i32::try_from(length).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "collection too large"))?;
    writer.write_all(&length.to_be_bytes())?;
    Ok(())
}

fn read_length(reader: &mut &[u8]) -> Result<usize, CodecError> {
    let length = i32::from_be_bytes(read_array(reader)?);
    usize::try_from(length).map_err(|_| CodecError::NegativeLength(length))
}

fn write_utf<W: Write>(writer: &mut W, value: &str) -> Result<(), CodecError> {
    let mut encoded = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                encoded.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                encoded.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                encoded.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                encoded.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    let length = u16::try_from(encoded.len()).map_err(|_| CodecError::StringTooLong(encoded.len()))?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(&encoded)?;
    Ok(())
}

fn read_utf(reader: &mut &[u8]) -> Result<String, CodecError> {
    let length = usize::from(u16::from_be_bytes(read_array(reader)?));
    let bytes = take(reader, length)?;

    let mut units = Vec::with_capacity(length);
    let mut index = 0;
    while index < bytes.len() {
        let first = u16::from(bytes[index]);
        if first & 0x80 == 0 {
            units.push(first);
            index += 1;
        } else if first & 0xe0 == 0xc0 {
            let second = continuation(bytes, index + 1)?;
            units.push(((first & 0x1f) << 6) | second);
            index += 2;
        } else if first & 0xf0 == 0xe0 {
            let second = continuation(bytes, index + 1)?;
            let third = continuation(bytes, index + 2)?;
            units.push(((first & 0x0f) << 12) | (second << 6) | third);
            index += 3;
        } else {
            return Err(CodecError::MalformedString);
        }
    }
    String::from_utf16(&units).map_err(|_| CodecError::MalformedString)
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16, CodecError> {
    match bytes.get(index) {
        Some(byte) if byte & 0xc0 == 0x80 => Ok(u16::from(byte & 0x3f)),
        _ => Err(CodecError::MalformedString),
    }
}
