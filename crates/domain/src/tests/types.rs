// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{DomainError, EmployeeId, IdToken, resolve_token, swapped_identifiers};

fn id(value: &str) -> EmployeeId {
    value.parse().unwrap()
}

#[test]
fn test_employee_id_parses_and_normalizes_case() {
    let parsed: EmployeeId = "  o-002-05 ".parse().unwrap();
    assert_eq!(parsed.prefix(), 'O');
    assert_eq!(parsed.sequence(), 2);
    assert_eq!(parsed.year(), 5);
    assert_eq!(parsed.to_string(), "O-002-05");
}

#[test]
fn test_employee_id_rejects_malformed_values() {
    for raw in [
        "",
        "O-02-05",
        "O-0002-05",
        "O-002-5",
        "OO-002-05",
        "1-002-05",
        "O_002_05",
        "O-002-05-1",
        "O-A02-05",
        "TEMP_O-002-05",
    ] {
        assert!(
            matches!(
                raw.parse::<EmployeeId>(),
                Err(DomainError::InvalidIdentifier(_))
            ),
            "expected {raw:?} to be rejected"
        );
    }
}

#[test]
fn test_placeholder_is_prefixed_identifier() {
    assert_eq!(id("O-002-05").placeholder(), "TEMP_O-002-05");
}

#[test]
fn test_token_accepts_bare_sequence_and_pads() {
    assert_eq!("2".parse::<IdToken>().unwrap(), IdToken::Sequence(2));
    assert_eq!(" 002 ".parse::<IdToken>().unwrap(), IdToken::Sequence(2));
    assert_eq!(
        "o-003-04".parse::<IdToken>().unwrap(),
        IdToken::Full(id("O-003-04"))
    );
}

#[test]
fn test_token_rejects_garbage() {
    for raw in ["", "   ", "1234", "abc", "O-3-04"] {
        assert!(
            matches!(raw.parse::<IdToken>(), Err(DomainError::InvalidToken(_))),
            "expected {raw:?} to be rejected"
        );
    }
}

#[test]
fn test_resolve_token_by_sequence_and_full_id() {
    let known: Vec<EmployeeId> = vec![id("O-002-05"), id("O-003-04")];

    assert_eq!(resolve_token("002", &known).unwrap(), id("O-002-05"));
    assert_eq!(resolve_token("3", &known).unwrap(), id("O-003-04"));
    assert_eq!(resolve_token("O-003-04", &known).unwrap(), id("O-003-04"));
}

#[test]
fn test_resolve_token_unknown_sequence() {
    let known: Vec<EmployeeId> = vec![id("O-002-05")];
    let result = resolve_token("999", &known);
    assert!(matches!(result, Err(DomainError::UnknownIdentifier(ref s)) if s == "999"));
}

#[test]
fn test_resolve_token_unknown_full_id() {
    let known: Vec<EmployeeId> = vec![id("O-002-05")];
    assert!(matches!(
        resolve_token("O-002-06", &known),
        Err(DomainError::UnknownIdentifier(_))
    ));
}

#[test]
fn test_resolve_token_rejects_ambiguous_sequence() {
    let known: Vec<EmployeeId> = vec![id("O-002-05"), id("A-002-21"), id("O-003-04")];
    let result = resolve_token("002", &known);
    match result {
        Err(DomainError::AmbiguousSequence { token, matches }) => {
            assert_eq!(token, "002");
            assert_eq!(matches.len(), 2);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn test_swapped_identifiers_exchange_sequence_only() {
    let (first, second) = swapped_identifiers(&id("O-002-05"), &id("A-003-04")).unwrap();
    assert_eq!(first, id("O-003-05"));
    assert_eq!(second, id("A-002-04"));
}

#[test]
fn test_swapped_identifiers_rejects_same_employee() {
    assert!(matches!(
        swapped_identifiers(&id("O-002-05"), &id("O-002-05")),
        Err(DomainError::SameEmployee(_))
    ));
}

#[test]
fn test_swapped_identifiers_rejects_shared_sequence() {
    assert!(matches!(
        swapped_identifiers(&id("O-002-05"), &id("A-002-04")),
        Err(DomainError::SameSequence { sequence: 2 })
    ));
}
