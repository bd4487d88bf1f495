//! Submission validation.
//!
//! Every input descriptor of the definition must be mapped. A mapping is
//! followed from the envelope root through its `path_nested` chain; the
//! element at the end of the chain is the credential, which must be in an
//! accepted format and satisfy the descriptor constraints.

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json_path::JsonPath;

use super::{CredentialMap, Envelope, InputDescriptorMapping, PeError, PresentationDefinition, PresentationSubmission};
use crate::vc::{VerifiableCredential, VerifiablePresentation};

/// Matches `submission` against `definition` and returns the credential
/// fulfilling each input descriptor.
///
/// # Errors
///
/// Returns the first [`PeError`] found.
pub fn validate_submission(
    definition: &PresentationDefinition,
    submission: &PresentationSubmission,
    envelope: &Envelope,
) -> Result<CredentialMap, PeError> {
    if submission.definition_id != definition.id {
        return Err(PeError::DefinitionMismatch {
            expected: definition.id.clone(),
            actual: submission.definition_id.clone(),
        });
    }
    if let Some(unknown) = submission
        .descriptor_map
        .iter()
        .find(|m| definition.input_descriptor(&m.id).is_none())
    {
        return Err(PeError::UnknownDescriptor(unknown.id.clone()));
    }

    let mut credentials = CredentialMap::new();
    for descriptor in &definition.input_descriptors {
        let mapping = submission
            .descriptor_map
            .iter()
            .find(|m| m.id == descriptor.id)
            .ok_or_else(|| PeError::MissingDescriptor(descriptor.id.clone()))?;

        let credential = resolve_credential(&descriptor.id, mapping, &envelope.value)?;

        let allowed = descriptor.format.as_ref().or(definition.format.as_ref());
        if let Some(allowed) = allowed
            && !allowed.contains_key(credential.descriptor_format())
        {
            return Err(PeError::FormatMismatch {
                descriptor: descriptor.id.clone(),
                format: credential.descriptor_format().to_string(),
            });
        }

        if let Some(constraints) = &descriptor.constraints
            && !constraints.satisfied(&credential.document())?
        {
            return Err(PeError::ConstraintsNotSatisfied(descriptor.id.clone()));
        }

        credentials.insert(descriptor.id.clone(), credential);
    }

    Ok(credentials)
}

fn query_one<'a>(path: &str, root: &'a Value) -> Result<&'a Value, PeError> {
    let jpath =
        JsonPath::parse(path).map_err(|e| PeError::Parse(format!("invalid JSONPath '{path}': {e}")))?;
    jpath
        .query(root)
        .exactly_one()
        .map_err(|_| PeError::PathNotFound(path.to_string()))
}

fn check_declared(descriptor: &str, declared: &str, actual: &str) -> Result<(), PeError> {
    if declared == actual {
        Ok(())
    } else {
        Err(PeError::FormatDeclaration {
            descriptor: descriptor.to_string(),
            declared: declared.to_string(),
            actual: actual.to_string(),
        })
    }
}

fn resolve_credential(
    descriptor: &str,
    mapping: &InputDescriptorMapping,
    root: &Value,
) -> Result<VerifiableCredential, PeError> {
    let mut current = mapping;
    let mut scope = root.clone();

    loop {
        let node = query_one(&current.path, &scope)?;
        let Some(nested) = &current.path_nested else {
            let credential = VerifiableCredential::from_value(node)
                .map_err(|e| PeError::Parse(format!("{}: {e}", current.path)))?;
            check_declared(descriptor, &current.format, credential.descriptor_format())?;
            return Ok(credential);
        };

        // Nested paths are relative to the presentation document.
        let presentation = VerifiablePresentation::from_value(node)
            .map_err(|e| PeError::Parse(format!("{}: {e}", current.path)))?;
        check_declared(descriptor, &current.format, presentation.descriptor_format())?;
        scope = presentation.document().clone();
        current = nested;
    }
}

/// Values of all constraint fields that carry an `id`, taken from the
/// credential matched to their descriptor.
///
/// # Errors
///
/// Returns `PeError::Parse` for invalid paths or filters.
pub fn constraint_field_values(
    definition: &PresentationDefinition,
    credentials: &CredentialMap,
) -> Result<BTreeMap<String, Value>, PeError> {
    let mut values = BTreeMap::new();
    for descriptor in &definition.input_descriptors {
        let (Some(credential), Some(constraints)) =
            (credentials.get(&descriptor.id), &descriptor.constraints)
        else {
            continue;
        };
        let document = credential.document();
        for field in &constraints.fields {
            let Some(id) = &field.id else { continue };
            if let Some(value) = field.matched(&document)? {
                values.insert(id.clone(), value);
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::vc::testing::{jwt, ldp_vp};

    fn definition() -> PresentationDefinition {
        serde_json::from_value(json!({
            "id": "pd-care",
            "format": { "ldp_vc": { "proof_type": ["JsonWebSignature2020"] }, "jwt_vc": { "alg": ["ES256"] } },
            "input_descriptors": [{
                "id": "organization_credential",
                "constraints": {
                    "fields": [
                        { "path": ["$.type"], "filter": { "type": "string", "const": "ExampleCredential" } },
                        { "id": "organization_name", "path": ["$.credentialSubject.organization.name"] }
                    ]
                }
            }]
        }))
        .unwrap()
    }

    fn submission(path: &str, vp_format: &str, vc_format: &str) -> PresentationSubmission {
        serde_json::from_value(json!({
            "id": "s1",
            "definition_id": "pd-care",
            "descriptor_map": [{
                "id": "organization_credential",
                "format": vp_format,
                "path": path,
                "path_nested": { "format": vc_format, "path": "$.verifiableCredential[0]" }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_single_ldp_presentation() {
        let vp = ldp_vp("did:web:h.example", "did:web:v.example", "c");
        let envelope = Envelope::parse(&vp.to_string()).unwrap();

        let map = validate_submission(&definition(), &submission("$", "ldp_vp", "ldp_vc"), &envelope).unwrap();
        assert!(map.contains_key("organization_credential"));

        let values = constraint_field_values(&definition(), &map).unwrap();
        assert_eq!(values.get("organization_name"), Some(&json!("Caretakers")));
    }

    #[test]
    fn test_jwt_presentation_in_array() {
        let credential = jwt(&json!({
            "iss": "did:web:issuer.example",
            "sub": "did:web:h.example",
            "vc": {
                "type": ["VerifiableCredential", "ExampleCredential"],
                "credentialSubject": { "organization": { "name": "Caretakers" } }
            }
        }));
        let vp = jwt(&json!({
            "iss": "did:web:h.example",
            "nonce": "n",
            "vp": { "verifiableCredential": [credential] }
        }));
        let envelope = Envelope::parse(&json!([vp]).to_string()).unwrap();

        let mut sub = submission("$[0]", "jwt_vp", "jwt_vc");
        sub.descriptor_map[0].path_nested.as_mut().unwrap().path = "$.vp.verifiableCredential[0]".into();

        let map = validate_submission(&definition(), &sub, &envelope).unwrap();
        assert_eq!(
            map["organization_credential"].subject_ids(),
            vec!["did:web:h.example"]
        );
    }

    #[test]
    fn test_mismatches() {
        let vp = ldp_vp("did:web:h.example", "did:web:v.example", "c");
        let envelope = Envelope::parse(&vp.to_string()).unwrap();

        let mut wrong_definition = submission("$", "ldp_vp", "ldp_vc");
        wrong_definition.definition_id = "other".into();
        assert!(matches!(
            validate_submission(&definition(), &wrong_definition, &envelope),
            Err(PeError::DefinitionMismatch { .. })
        ));

        assert!(matches!(
            validate_submission(&definition(), &submission("$", "jwt_vp", "ldp_vc"), &envelope),
            Err(PeError::FormatDeclaration { .. })
        ));

        assert!(matches!(
            validate_submission(&definition(), &submission("$[3]", "ldp_vp", "ldp_vc"), &envelope),
            Err(PeError::PathNotFound(_))
        ));

        let mut unknown = submission("$", "ldp_vp", "ldp_vc");
        unknown.descriptor_map[0].id = "unknown".into();
        assert!(matches!(
            validate_submission(&definition(), &unknown, &envelope),
            Err(PeError::UnknownDescriptor(_))
        ));

        let mut empty = submission("$", "ldp_vp", "ldp_vc");
        empty.descriptor_map.clear();
        assert!(matches!(
            validate_submission(&definition(), &empty, &envelope),
            Err(PeError::MissingDescriptor(_))
        ));
    }

    #[test]
    fn test_constraints_and_formats() {
        let mut vp = ldp_vp("did:web:h.example", "did:web:v.example", "c");
        vp["verifiableCredential"][0]["type"] = json!(["VerifiableCredential", "OtherCredential"]);
        let envelope = Envelope::parse(&vp.to_string()).unwrap();
        assert!(matches!(
            validate_submission(&definition(), &submission("$", "ldp_vp", "ldp_vc"), &envelope),
            Err(PeError::ConstraintsNotSatisfied(_))
        ));

        let vp = ldp_vp("did:web:h.example", "did:web:v.example", "c");
        let envelope = Envelope::parse(&vp.to_string()).unwrap();
        let mut jwt_only = definition();
        jwt_only.format = Some(serde_json::from_value(json!({"jwt_vc": {"alg": ["ES256"]}})).unwrap());
        assert!(matches!(
            validate_submission(&jwt_only, &submission("$", "ldp_vp", "ldp_vc"), &envelope),
            Err(PeError::FormatMismatch { .. })
        ));
    }
}
