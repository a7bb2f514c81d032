//! # JSON <-> Protobuf Codec
//!
//! This module turns caller supplied JSON into Protobuf bytes and response bytes back into
//! JSON, driven purely by runtime [`MessageDescriptor`]s.
//!
//! ## How it works
//!
//! 1. **Encoder (JSON -> Proto)**:
//!    - Parses the request body, which follows the `google.protobuf.Any` JSON convention:
//!      an object whose `@type` member names the request type.
//!    - Maps the remaining members onto a [`DynamicMessage`] of the request type. Field names
//!      may be the proto name (`first_name`) or the JSON name (`firstName`). Unknown fields
//!      are rejected.
//!    - Wraps the message in an `Any` envelope and hands back the envelope's `value`, i.e. the
//!      serialized inner message.
//!
//! 2. **Decoder (Proto -> JSON)**:
//!    - Merges raw bytes into a fresh [`DynamicMessage`] of the response type.
//!    - Renders it with the standard Protobuf JSON mapping (JSON names, defaults omitted).
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use prost_types::Any;
use serde_json::{Map, Value};

const TYPE_FIELD: &str = "@type";
const VALUE_FIELD: &str = "value";
const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Well-known types whose JSON form is not an object. Inside an `Any` their JSON
/// representation is carried by the `value` member.
const WELL_KNOWN_JSON_TYPES: &[&str] = &[
    "google.protobuf.Any",
    "google.protobuf.Duration",
    "google.protobuf.Timestamp",
    "google.protobuf.FieldMask",
    "google.protobuf.Struct",
    "google.protobuf.Value",
    "google.protobuf.ListValue",
    "google.protobuf.DoubleValue",
    "google.protobuf.FloatValue",
    "google.protobuf.Int64Value",
    "google.protobuf.UInt64Value",
    "google.protobuf.Int32Value",
    "google.protobuf.UInt32Value",
    "google.protobuf.BoolValue",
    "google.protobuf.StringValue",
    "google.protobuf.BytesValue",
];

#[derive(thiserror::Error, Debug)]
pub enum JsonMappingError {
    #[error("Request body is not valid JSON: '{0}'")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Request body must be a JSON object")]
    NotAnObject,
    #[error("Request body is missing the '@type' field")]
    MissingType,
    #[error("The '@type' field must be a string")]
    InvalidType,
    #[error("Request body declares type '{found}' but the request type is '{expected}'")]
    TypeMismatch { expected: String, found: String },
    #[error("Request body for '{0}' is missing the 'value' field")]
    MissingValue(String),
    #[error("Unexpected field '{field}' in request body for '{message}'")]
    UnexpectedField { message: String, field: String },
    #[error("JSON structure does not match Protobuf schema of '{message}': '{source}'")]
    Schema {
        message: String,
        source: serde_json::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ResponseDecodeError {
    #[error("Failed to decode '{message}' from Protobuf bytes: '{source}'")]
    Binary {
        message: String,
        source: prost::DecodeError,
    },
    #[error("Failed to map '{message}' to JSON: '{source}'")]
    Render {
        message: String,
        source: serde_json::Error,
    },
}

/// Creates an empty message of the given type, every field at its default.
pub fn new_instance(descriptor: &MessageDescriptor) -> DynamicMessage {
    DynamicMessage::new(descriptor.clone())
}

/// The `Any` type URL of a message type.
pub fn type_url(descriptor: &MessageDescriptor) -> String {
    format!("{TYPE_URL_PREFIX}{}", descriptor.full_name())
}

/// Responsible for encoding a JSON request body into Protobuf bytes.
#[derive(Debug, Clone)]
pub struct JsonEncoder(MessageDescriptor);

impl JsonEncoder {
    pub fn new(request: MessageDescriptor) -> Self {
        Self(request)
    }

    /// Returns the serialized request message described by `body`.
    pub fn encode(&self, body: &str) -> Result<Vec<u8>, JsonMappingError> {
        Ok(self.envelope(body)?.value)
    }

    /// Applies `body` onto an `Any` envelope wrapping a message of the request type.
    pub fn envelope(&self, body: &str) -> Result<Any, JsonMappingError> {
        let json: Value = serde_json::from_str(body).map_err(JsonMappingError::InvalidJson)?;

        let Value::Object(mut fields) = json else {
            return Err(JsonMappingError::NotAnObject);
        };

        let message = match fields.remove(TYPE_FIELD) {
            Some(declared) => {
                self.check_type(&declared)?;
                self.map_fields(fields)?
            }
            // An empty object is an empty envelope.
            None if fields.is_empty() => new_instance(&self.0),
            None => return Err(JsonMappingError::MissingType),
        };

        Ok(Any {
            type_url: type_url(&self.0),
            value: message.encode_to_vec(),
        })
    }

    fn check_type(&self, declared: &Value) -> Result<(), JsonMappingError> {
        let declared = declared.as_str().ok_or(JsonMappingError::InvalidType)?;
        let name = declared
            .rsplit_once('/')
            .map_or(declared, |(_, name)| name);

        if name != self.0.full_name() {
            return Err(JsonMappingError::TypeMismatch {
                expected: self.0.full_name().to_string(),
                found: declared.to_string(),
            });
        }
        Ok(())
    }

    fn map_fields(
        &self,
        mut fields: Map<String, Value>,
    ) -> Result<DynamicMessage, JsonMappingError> {
        let full_name = self.0.full_name();

        let json = if WELL_KNOWN_JSON_TYPES.contains(&full_name) {
            let value = fields
                .remove(VALUE_FIELD)
                .ok_or_else(|| JsonMappingError::MissingValue(full_name.to_string()))?;

            if let Some(field) = fields.keys().next() {
                return Err(JsonMappingError::UnexpectedField {
                    message: full_name.to_string(),
                    field: field.clone(),
                });
            }
            value
        } else {
            Value::Object(fields)
        };

        // DynamicMessage::deserialize accepts any Serde Deserializer.
        // serde_json::Value implements IntoDeserializer, so we can pass it directly.
        DynamicMessage::deserialize(self.0.clone(), json).map_err(|source| {
            JsonMappingError::Schema {
                message: full_name.to_string(),
                source,
            }
        })
    }
}

/// Responsible for decoding Protobuf bytes into JSON text.
#[derive(Debug, Clone)]
pub struct JsonDecoder(MessageDescriptor);

impl JsonDecoder {
    pub fn new(response: MessageDescriptor) -> Self {
        Self(response)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, ResponseDecodeError> {
        let mut message = new_instance(&self.0);
        message
            .merge(bytes)
            .map_err(|source| ResponseDecodeError::Binary {
                message: self.0.full_name().to_string(),
                source,
            })?;

        serde_json::to_string(&message).map_err(|source| ResponseDecodeError::Render {
            message: self.0.full_name().to_string(),
            source,
        })
    }
}
