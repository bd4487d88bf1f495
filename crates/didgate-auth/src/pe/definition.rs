//! Presentation definitions.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json_path::JsonPath;

use super::PeError;

/// Supported formats and their algorithms, e.g.
/// `{"jwt_vp": {"alg": ["ES256"]}, "ldp_vp": {"proof_type": ["JsonWebSignature2020"]}}`.
pub type VpFormats = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Describes the credentials a verifier requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationDefinition {
    /// Unique id of the definition.
    pub id: String,

    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Why the credentials are requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Formats accepted for all descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<VpFormats>,

    /// Required credentials.
    pub input_descriptors: Vec<InputDescriptor>,
}

impl PresentationDefinition {
    /// Parses a definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns `PeError::Parse` for invalid JSON or an empty id.
    pub fn parse(raw: &[u8]) -> Result<Self, PeError> {
        let definition: Self =
            serde_json::from_slice(raw).map_err(|e| PeError::Parse(e.to_string()))?;
        if definition.id.is_empty() {
            return Err(PeError::Parse("presentation definition id is empty".to_string()));
        }
        Ok(definition)
    }

    /// Looks up an input descriptor by id.
    #[must_use]
    pub fn input_descriptor(&self, id: &str) -> Option<&InputDescriptor> {
        self.input_descriptors.iter().find(|d| d.id == id)
    }
}

/// One required credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Id, referenced by submission descriptor maps.
    pub id: String,

    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Why this credential is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Formats accepted for this descriptor, overriding the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<VpFormats>,

    /// Constraints the credential must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

/// Field constraints of an input descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Fields that must be present (unless optional) and match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,

    /// `required` or `preferred`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_disclosure: Option<String>,
}

impl Constraints {
    /// Returns `true` if every non-optional field matches `credential`.
    ///
    /// # Errors
    ///
    /// Returns `PeError::Parse` for invalid JSONPath expressions or filter
    /// patterns.
    pub fn satisfied(&self, credential: &Value) -> Result<bool, PeError> {
        for field in &self.fields {
            if field.matched(credential)?.is_none() && !field.optional {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A constrained field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Optional id; values of fields with an id are exposed on access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// JSONPath expressions, tried in order.
    pub path: Vec<String>,

    /// Why the field is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Filter the value must pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    /// Whether the field may be absent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl Field {
    /// Returns the first value found under one of the paths that passes the
    /// filter, or `None`.
    ///
    /// # Errors
    ///
    /// Returns `PeError::Parse` for invalid JSONPath expressions or filter
    /// patterns.
    pub fn matched(&self, credential: &Value) -> Result<Option<Value>, PeError> {
        for path in &self.path {
            let jpath = JsonPath::parse(path)
                .map_err(|e| PeError::Parse(format!("invalid JSONPath '{path}': {e}")))?;
            for node in jpath.query(credential).all() {
                let passes = match &self.filter {
                    Some(filter) => filter.matches(node)?,
                    None => true,
                };
                if passes {
                    return Ok(Some(node.clone()));
                }
            }
        }
        Ok(None)
    }
}

/// The JSON Schema subset used by field filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Expected JSON type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Exact value.
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_: Option<Value>,

    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,

    /// Regular expression strings must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Filter {
    /// Tests a value against the filter. Arrays pass if any element passes.
    ///
    /// # Errors
    ///
    /// Returns `PeError::Parse` for an invalid pattern.
    pub fn matches(&self, value: &Value) -> Result<bool, PeError> {
        if let Value::Array(items) = value
            && self.type_.as_deref() != Some("array")
        {
            for item in items {
                if self.matches(item)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        if let Some(expected) = &self.type_ {
            let actual = match value {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            };
            let compatible = actual == expected || (expected == "number" && actual == "integer");
            if !compatible {
                return Ok(false);
            }
        }
        if let Some(expected) = &self.const_
            && expected != value
        {
            return Ok(false);
        }
        if let Some(allowed) = &self.enum_
            && !allowed.contains(value)
        {
            return Ok(false);
        }
        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern)
                .map_err(|e| PeError::Parse(format!("invalid filter pattern '{pattern}': {e}")))?;
            match value.as_str() {
                Some(s) if re.is_match(s) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}
