//! Property-based tests using proptest
//!
//! These tests verify the validation rules, selector parsing and Firestore
//! value encoding using randomized inputs.

use firecrud::error::{CrudError, UnknownName};
use firecrud::resource::firestore_value::{decode, encode, field_path};
use firecrud::resource::{validate, Action, ParameterBag, ResourceKind};
use proptest::prelude::*;
use serde_json::Value;

fn arb_kind() -> impl Strategy<Value = ResourceKind> {
    prop_oneof![Just(ResourceKind::Identity), Just(ResourceKind::Document)]
}

/// Parameter bags that never carry an identifier
fn arb_params_without_id() -> impl Strategy<Value = ParameterBag> {
    prop::collection::btree_map("[a-z][a-zA-Z]{0,10}", "[a-zA-Z0-9@.]{0,12}", 0..6).prop_map(
        |map| {
            map.into_iter()
                .filter(|(k, _)| k != "userId" && k != "docId")
                .collect::<ParameterBag>()
        },
    )
}

proptest! {
    /// Update and delete without an identifier always fail with the id name
    #[test]
    fn missing_identifier_is_always_reported(
        kind in arb_kind(),
        delete in any::<bool>(),
        params in arb_params_without_id(),
    ) {
        let action = if delete { Action::Delete } else { Action::Update };
        match validate(kind, action, &params) {
            Err(CrudError::MissingParameter { name, .. }) => prop_assert_eq!(name, kind.id_param()),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    /// Any identifier makes delete valid
    #[test]
    fn delete_with_identifier_is_valid(kind in arb_kind(), id in "[a-zA-Z0-9]{1,28}") {
        let params = ParameterBag::new().with(kind.id_param(), &id);
        prop_assert!(validate(kind, Action::Delete, &params).is_ok());
    }

    /// Document read is valid whatever else is supplied
    #[test]
    fn document_read_is_always_valid(params in arb_params_without_id()) {
        prop_assert!(validate(ResourceKind::Document, Action::Read, &params).is_ok());
    }

    /// Anything that is not a known action spelling is rejected
    #[test]
    fn unknown_actions_are_rejected(word in "[a-z]{1,12}") {
        prop_assume!(!["create", "read", "get", "update", "delete"].contains(&word.as_str()));
        prop_assert_eq!(word.parse::<Action>(), Err(UnknownName(word.clone())));
    }

    /// Integers survive encode/decode as numbers
    #[test]
    fn integers_decode_to_numbers(n in any::<i64>()) {
        prop_assert_eq!(decode(&encode(&n.to_string())), Value::from(n));
    }

    /// Zero-padded digit strings (zip codes, padded ids) keep every digit
    #[test]
    fn zero_padded_digits_stay_strings(digits in "0[0-9]{1,12}") {
        prop_assert_eq!(decode(&encode(&digits)), Value::String(digits.clone()));
    }

    /// Integers too wide for int64 are kept verbatim instead of rounded
    #[test]
    fn oversized_integers_stay_strings(n in (i64::MAX as u64 + 1)..=u64::MAX) {
        let raw = n.to_string();
        prop_assert_eq!(decode(&encode(&raw)), Value::String(raw.clone()));
    }

    /// Doubles survive encode/decode with their exact rendering
    #[test]
    fn doubles_keep_their_rendering(x in -1.0e9f64..1.0e9) {
        let raw = Value::from(x).to_string();
        prop_assert_eq!(decode(&encode(&raw)).to_string(), raw);
    }

    /// Plain words survive encode/decode as strings
    #[test]
    fn words_decode_to_strings(word in "[a-zA-Z][a-zA-Z ]{0,20}") {
        prop_assume!(!["true", "false", "null", "inf", "infinity", "nan"]
            .contains(&word.to_ascii_lowercase().as_str()));
        prop_assert_eq!(decode(&encode(&word)), Value::String(word.clone()));
    }

    /// Quoted field paths always start and end with a backtick
    #[test]
    fn field_paths_are_simple_or_quoted(name in "\\PC{1,16}") {
        let quoted = field_path(&name);
        prop_assert!(quoted == name || (quoted.starts_with('`') && quoted.ends_with('`')));
    }
}
