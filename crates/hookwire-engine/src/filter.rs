//! Filter evaluator — ordered field predicates against a payload.
//!
//! Pure: no side effects, same inputs same answer. Short-circuits on
//! the first failing predicate; an empty filter list always passes.

use unicode_normalization::UnicodeNormalization;

use hookwire_core::{DeliveryPayload, Predicate, PredicateOp};

/// Evaluate a workflow's filter chain against one payload.
pub fn passes(payload: &DeliveryPayload, filters: &[Predicate]) -> bool {
    filters.iter().all(|p| matches(payload, p))
}

fn matches(payload: &DeliveryPayload, predicate: &Predicate) -> bool {
    let actual = normalize(&payload.field(&predicate.field));
    let expected = normalize(&predicate.value);
    match predicate.op {
        PredicateOp::Equals => actual == expected,
        PredicateOp::Contains => actual.contains(&expected),
        PredicateOp::NotEmpty => !actual.is_empty(),
        // Fail-open: an op this build doesn't know must not block the
        // workflow.
        PredicateOp::Unknown => true,
    }
}

/// Comparison normalization: Unicode NFC, trim, collapse internal
/// whitespace runs to a single space, lowercase. NFC first, so a
/// composed "é" and its decomposed form compare equal.
fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    let mut started = false;
    for ch in s.nfc() {
        if ch.is_whitespace() {
            if started && !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.extend(ch.to_lowercase());
            last_was_space = false;
            started = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::{SourceKind, TriggerKind, Workflow, WorkflowDraft, WorkflowParams};

    fn payload(fields: serde_json::Value) -> DeliveryPayload {
        let wf = Workflow::from_draft(WorkflowDraft {
            source: SourceKind::Spreadsheet,
            trigger: TriggerKind::NewRow,
            target: "chat".into(),
            action: "message".into(),
            params: WorkflowParams::default(),
            filters: vec![],
            poll_minutes: None,
        });
        DeliveryPayload::new(&wf, fields)
    }

    fn pred(field: &str, op: PredicateOp, value: &str) -> Predicate {
        Predicate {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[test]
    fn test_empty_filter_list_passes() {
        let p = payload(serde_json::json!({"status": "open"}));
        assert!(passes(&p, &[]));
    }

    #[test]
    fn test_equals_normalizes() {
        let p = payload(serde_json::json!({"Status": "  OPEN   now "}));
        assert!(passes(&p, &[pred("status", PredicateOp::Equals, "open now")]));
        assert!(!passes(&p, &[pred("status", PredicateOp::Equals, "closed")]));
    }

    #[test]
    fn test_equals_across_unicode_forms() {
        // "café" with a precomposed U+00E9 vs "cafe" + combining
        // U+0301: equal after NFC.
        let p = payload(serde_json::json!({"name": "Caf\u{00e9}"}));
        assert!(passes(&p, &[pred("name", PredicateOp::Equals, "cafe\u{0301}")]));
        let p = payload(serde_json::json!({"name": "cafe\u{0301}"}));
        assert!(passes(&p, &[pred("name", PredicateOp::Contains, "caf\u{00e9}")]));
    }

    #[test]
    fn test_contains() {
        let p = payload(serde_json::json!({"subject": "Invoice #42 overdue"}));
        assert!(passes(&p, &[pred("subject", PredicateOp::Contains, "invoice")]));
        assert!(!passes(&p, &[pred("subject", PredicateOp::Contains, "receipt")]));
    }

    #[test]
    fn test_missing_field_is_empty() {
        let p = payload(serde_json::json!({"a": "x"}));
        // not-empty fails on a missing field...
        assert!(!passes(&p, &[pred("b", PredicateOp::NotEmpty, "")]));
        // ...and equals "" passes.
        assert!(passes(&p, &[pred("b", PredicateOp::Equals, "")]));
    }

    #[test]
    fn test_unknown_op_passes() {
        let p = payload(serde_json::json!({"a": "x"}));
        assert!(passes(&p, &[pred("a", PredicateOp::Unknown, "anything")]));
    }

    #[test]
    fn test_short_circuit_order() {
        let p = payload(serde_json::json!({"a": "x", "b": ""}));
        let filters = [
            pred("b", PredicateOp::NotEmpty, ""),
            pred("a", PredicateOp::Equals, "x"),
        ];
        assert!(!passes(&p, &filters));
    }

    #[test]
    fn test_pure_reevaluation() {
        let p = payload(serde_json::json!({"k": "v"}));
        let filters = [pred("k", PredicateOp::Equals, "v")];
        assert_eq!(passes(&p, &filters), passes(&p, &filters));
    }
}
