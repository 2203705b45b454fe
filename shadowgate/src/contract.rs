//! Declared request and response shapes of an operation.
//!
//! An [`InputContract`] is checked against the request body at the registry
//! boundary and is advertised in the payment challenge so clients know what
//! to send once they have paid. An [`OutputContract`] is advertised only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::InvalidInput;

/// JSON type of a body field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number with no fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldType {
    /// Lowercase type name as used in schemas.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// One field of an input contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Expected JSON type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed values of a string field.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl FieldSpec {
    /// An optional field of the given type.
    #[must_use]
    pub const fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            description: None,
            allowed: None,
        }
    }

    /// An optional string field.
    #[must_use]
    pub const fn string() -> Self {
        Self::new(FieldType::String)
    }

    /// An optional number field.
    #[must_use]
    pub const fn number() -> Self {
        Self::new(FieldType::Number)
    }

    /// An optional integer field.
    #[must_use]
    pub const fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    /// An optional array field.
    #[must_use]
    pub const fn array() -> Self {
        Self::new(FieldType::Array)
    }

    /// Marks the field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts a string field to a fixed set of values.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn check(&self, name: &str, value: &Value) -> Result<(), InvalidInput> {
        if !self.field_type.accepts(value) {
            return Err(InvalidInput::WrongType {
                field: name.to_owned(),
                expected: self.field_type.as_str(),
            });
        }
        match (&self.allowed, value.as_str()) {
            (Some(allowed), Some(s)) if !allowed.iter().any(|a| a == s) => {
                Err(InvalidInput::NotAllowed {
                    field: name.to_owned(),
                    allowed: allowed.join(", "),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Named body fields an operation accepts.
///
/// Fields not named in the contract are passed through untouched. A field
/// set to `null` is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputContract {
    fields: BTreeMap<String, FieldSpec>,
}

impl InputContract {
    /// A contract with no declared fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Checks a parsed body object.
    ///
    /// # Errors
    ///
    /// The first missing required field, wrongly typed field or disallowed
    /// value, in field-name order.
    pub fn validate(&self, body: &Map<String, Value>) -> Result<(), InvalidInput> {
        for (name, spec) in &self.fields {
            match body.get(name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(InvalidInput::MissingField(name.clone()));
                }
                None | Some(Value::Null) => {}
                Some(value) => spec.check(name, value)?,
            }
        }
        Ok(())
    }

    /// Checks an arbitrary JSON body and returns it as an object. `null`
    /// stands for an empty body.
    ///
    /// # Errors
    ///
    /// [`InvalidInput::NotAnObject`] for arrays and scalars, otherwise as
    /// [`validate`](Self::validate).
    pub fn accept(&self, body: Value) -> Result<Map<String, Value>, InvalidInput> {
        let object = match body {
            Value::Null => Map::new(),
            Value::Object(object) => object,
            _ => return Err(InvalidInput::NotAnObject),
        };
        self.validate(&object)?;
        Ok(object)
    }

    /// Schema advertised under `outputSchema.input`.
    #[must_use]
    pub fn to_schema(&self) -> Value {
        json!({
            "type": "http",
            "method": "POST",
            "bodyType": "json",
            "bodyFields": self.fields,
        })
    }
}

/// Named response fields an operation returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputContract {
    fields: BTreeMap<String, FieldType>,
}

impl OutputContract {
    /// A contract with no declared fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Schema advertised under `outputSchema.output`.
    #[must_use]
    pub fn to_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, ty)| (name.clone(), json!({ "type": ty })))
            .collect();
        json!({ "type": "object", "properties": properties })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_contract() -> InputContract {
        InputContract::new()
            .field("dropId", FieldSpec::string().required())
            .field("limit", FieldSpec::integer())
            .field("network", FieldSpec::string().one_of(["tor", "i2p", "clearnet"]))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_missing_required_field() {
        let err = drop_contract().validate(&Map::new()).unwrap_err();
        assert_eq!(err, InvalidInput::MissingField("dropId".into()));
        let err = drop_contract()
            .validate(&object(json!({ "dropId": null })))
            .unwrap_err();
        assert_eq!(err, InvalidInput::MissingField("dropId".into()));
    }

    #[test]
    fn test_wrong_type_and_enum() {
        let err = drop_contract()
            .validate(&object(json!({ "dropId": 7 })))
            .unwrap_err();
        assert!(matches!(err, InvalidInput::WrongType { expected: "string", .. }));

        let err = drop_contract()
            .validate(&object(json!({ "dropId": "d", "limit": 1.5 })))
            .unwrap_err();
        assert!(matches!(err, InvalidInput::WrongType { expected: "integer", .. }));

        let err = drop_contract()
            .validate(&object(json!({ "dropId": "d", "network": "vpn" })))
            .unwrap_err();
        assert!(matches!(err, InvalidInput::NotAllowed { .. }));
    }

    #[test]
    fn test_accept_passes_unknown_fields() {
        let body = drop_contract()
            .accept(json!({ "dropId": "d", "extra": true }))
            .unwrap();
        assert_eq!(body["extra"], json!(true));
    }

    #[test]
    fn test_accept_rejects_non_objects() {
        assert_eq!(
            InputContract::new().accept(json!([1, 2])).unwrap_err(),
            InvalidInput::NotAnObject
        );
        assert!(InputContract::new().accept(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_schema_shape() {
        let schema = drop_contract().to_schema();
        assert_eq!(schema["type"], "http");
        assert_eq!(schema["bodyType"], "json");
        assert_eq!(schema["bodyFields"]["dropId"]["required"], true);
        assert_eq!(schema["bodyFields"]["network"]["enum"][1], "i2p");
        assert!(schema["bodyFields"]["limit"].get("enum").is_none());

        let out = OutputContract::new().field("dropId", FieldType::String).to_schema();
        assert_eq!(out["properties"]["dropId"]["type"], "string");
    }
}
