//! Presentation submissions.

use serde::{Deserialize, Serialize};

use super::PeError;

/// Describes how the presentations in a `vp_token` fulfil a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationSubmission {
    /// Unique id of the submission.
    pub id: String,

    /// Id of the fulfilled presentation definition.
    pub definition_id: String,

    /// One mapping per fulfilled input descriptor.
    pub descriptor_map: Vec<InputDescriptorMapping>,
}

impl PresentationSubmission {
    /// Parses a submission from JSON.
    ///
    /// # Errors
    ///
    /// Returns `PeError::Parse` for invalid JSON, empty ids or mappings
    /// without id, format or path.
    pub fn parse(raw: &[u8]) -> Result<Self, PeError> {
        let submission: Self =
            serde_json::from_slice(raw).map_err(|e| PeError::Parse(e.to_string()))?;
        if submission.id.is_empty() {
            return Err(PeError::Parse("id is empty".to_string()));
        }
        if submission.definition_id.is_empty() {
            return Err(PeError::Parse("definition_id is empty".to_string()));
        }
        for mapping in &submission.descriptor_map {
            if mapping.id.is_empty() {
                return Err(PeError::Parse("descriptor_map entry without id".to_string()));
            }
            mapping.check_shape()?;
        }
        Ok(submission)
    }
}

/// Maps an input descriptor to an element of the `vp_token`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptorMapping {
    /// Input descriptor id. Empty in nested mappings.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Format of the element found at `path`.
    pub format: String,

    /// JSONPath to the element.
    pub path: String,

    /// Mapping evaluated against the element found at `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<InputDescriptorMapping>>,
}

impl InputDescriptorMapping {
    fn check_shape(&self) -> Result<(), PeError> {
        if self.format.is_empty() || self.path.is_empty() {
            return Err(PeError::Parse(format!(
                "descriptor_map entry '{}' requires format and path",
                self.id
            )));
        }
        match &self.path_nested {
            Some(nested) => nested.check_shape(),
            None => Ok(()),
        }
    }
}
