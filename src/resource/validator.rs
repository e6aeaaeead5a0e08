//! Request validation
//!
//! Runs before any client call. A request that fails here never reaches a
//! backend.

use super::{parse_bool, Action, ParameterBag, ResourceKind};
use crate::error::{CrudError, CrudResult};

/// Fields an Identity create cannot do without
const IDENTITY_CREATE_REQUIRED: &[&str] = &["email"];

/// Identity fields that must hold a boolean when present
pub const IDENTITY_FLAGS: &[&str] = &["emailVerified", "disabled"];

/// Check that `params` is a well-formed `action` on `kind`
///
/// | Action | Rule |
/// |--------|------|
/// | Create | no identifier needed; Identity needs `email` |
/// | Read   | always valid; without identifier it is a scan |
/// | Update | identifier required |
/// | Delete | identifier required |
pub fn validate(kind: ResourceKind, action: Action, params: &ParameterBag) -> CrudResult<()> {
    let missing = |name: &str| CrudError::MissingParameter {
        kind,
        action,
        name: name.to_string(),
    };

    match action {
        Action::Create => {
            let required: &[&str] = match kind {
                ResourceKind::Identity => IDENTITY_CREATE_REQUIRED,
                ResourceKind::Document => &[],
            };
            if let Some(name) = required.iter().copied().find(|name| !params.contains(name)) {
                return Err(missing(name));
            }
        }
        Action::Read => {}
        Action::Update | Action::Delete => {
            if params.id(kind).is_none() {
                return Err(missing(kind.id_param()));
            }
        }
    }

    if kind == ResourceKind::Identity && action != Action::Delete {
        for name in IDENTITY_FLAGS {
            if let Some(value) = params.get(name) {
                if parse_bool(value).is_none() {
                    return Err(CrudError::InvalidParameter {
                        kind,
                        action,
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_and_delete_require_identifier() {
        for kind in ResourceKind::ALL {
            for action in [Action::Update, Action::Delete] {
                let err = validate(kind, action, &ParameterBag::new()).unwrap_err();
                assert_eq!(
                    err,
                    CrudError::MissingParameter {
                        kind,
                        action,
                        name: kind.id_param().to_string(),
                    }
                );
            }
        }
    }

    #[test]
    fn test_read_without_identifier_is_a_valid_scan() {
        for kind in ResourceKind::ALL {
            assert!(validate(kind, Action::Read, &ParameterBag::new()).is_ok());
        }
    }

    #[test]
    fn test_identity_create_requires_email() {
        let err =
            validate(ResourceKind::Identity, Action::Create, &ParameterBag::new()).unwrap_err();
        assert!(matches!(err, CrudError::MissingParameter { ref name, .. } if name == "email"));

        let params = ParameterBag::new().with("email", "a@example.com");
        assert!(validate(ResourceKind::Identity, Action::Create, &params).is_ok());
    }

    #[test]
    fn test_document_create_needs_nothing() {
        assert!(validate(ResourceKind::Document, Action::Create, &ParameterBag::new()).is_ok());
    }

    #[test]
    fn test_identity_id_param_is_not_the_document_one() {
        let params = ParameterBag::new().with("docId", "abc");
        assert!(validate(ResourceKind::Identity, Action::Delete, &params).is_err());
        assert!(validate(ResourceKind::Document, Action::Delete, &params).is_ok());
    }

    #[test]
    fn test_identity_flags_must_be_boolean() {
        let params = ParameterBag::new()
            .with("userId", "u1")
            .with("disabled", "sometimes");
        let err = validate(ResourceKind::Identity, Action::Update, &params).unwrap_err();
        assert_eq!(
            err,
            CrudError::InvalidParameter {
                kind: ResourceKind::Identity,
                action: Action::Update,
                name: "disabled".to_string(),
                value: "sometimes".to_string(),
            }
        );
    }

    #[test]
    fn test_document_fields_are_free_form() {
        let params = ParameterBag::new()
            .with("docId", "d1")
            .with("disabled", "sometimes");
        assert!(validate(ResourceKind::Document, Action::Update, &params).is_ok());
    }
}
