//! DIF Presentation Exchange.
//!
//! - [`definition`] - presentation definitions and their constraints
//! - [`submission`] - presentation submissions and descriptor mappings
//! - [`envelope`] - the `vp_token` envelope holding one or more presentations
//! - [`validate`] - matching a submission against a definition

pub mod definition;
pub mod envelope;
pub mod submission;
pub mod validate;

use std::collections::BTreeMap;

pub use definition::{Constraints, Field, Filter, InputDescriptor, PresentationDefinition, VpFormats};
pub use envelope::Envelope;
pub use submission::{InputDescriptorMapping, PresentationSubmission};
pub use validate::{constraint_field_values, validate_submission};

use crate::vc::VerifiableCredential;

/// Matched credentials keyed by input descriptor id.
pub type CredentialMap = BTreeMap<String, VerifiableCredential>;

/// Presentation Exchange errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeError {
    /// The document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The submission refers to another definition.
    #[error("presentation submission references definition '{actual}', expected '{expected}'")]
    DefinitionMismatch {
        /// Id of the definition being matched.
        expected: String,
        /// `definition_id` found in the submission.
        actual: String,
    },

    /// No mapping for a required input descriptor.
    #[error("input descriptor '{0}' is not fulfilled by the presentation submission")]
    MissingDescriptor(String),

    /// A mapping refers to an input descriptor that the definition lacks.
    #[error("presentation submission contains unknown input descriptor '{0}'")]
    UnknownDescriptor(String),

    /// A descriptor path does not resolve to exactly one element.
    #[error("path '{0}' does not resolve to exactly one element")]
    PathNotFound(String),

    /// The element found is not in the format requested.
    #[error("format '{format}' not allowed for input descriptor '{descriptor}'")]
    FormatMismatch {
        /// Input descriptor id.
        descriptor: String,
        /// Format of the mapping.
        format: String,
    },

    /// A mapping's declared format disagrees with the element found.
    #[error("mapping for '{descriptor}' declares '{declared}' but element is '{actual}'")]
    FormatDeclaration {
        /// Input descriptor id.
        descriptor: String,
        /// Format declared in the mapping.
        declared: String,
        /// Format of the element.
        actual: String,
    },

    /// The credential does not satisfy the descriptor constraints.
    #[error("credential does not satisfy constraints of input descriptor '{0}'")]
    ConstraintsNotSatisfied(String),
}
