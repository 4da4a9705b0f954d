#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use carelink_pipeline::config::{self, EventField, OverflowPolicy, PolicySpec};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
queue:
  capacty: 10 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.error_class().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.queue.capacity, 10_000);
    assert_eq!(cfg.queue.overflow, OverflowPolicy::Reject);
    assert_eq!(cfg.processing.timeout_ms, 2000);
    let names: Vec<&str> = cfg.policies.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["patient_id_present", "facility_id_present", "payload_size"]);
    assert!(cfg.eval.is_none());
    assert!(cfg.handoff.is_none());
}

#[test]
fn full_config_keeps_policy_order() {
    let ok = r#"
version: 1
queue: { capacity: 5, overflow: drop_oldest }
processing: { timeout_ms: 50, dead_letter_capacity: 3 }
policies:
  - { name: ts, kind: required_field, field: timestamp }
  - { name: types, kind: allowed_types, types: [admission, discharge] }
  - { name: sites, kind: facility_allowlist, facilities: [MERCY] }
  - { name: size, kind: max_payload_bytes, max_bytes: 1024 }
eval: { suite: eval/rules.yaml }
handoff: { path: /tmp/carelink/event.json }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.queue.overflow, OverflowPolicy::DropOldest);
    assert_eq!(cfg.policies.len(), 4);
    assert!(matches!(
        cfg.policies[0],
        PolicySpec::RequiredField { field: EventField::Timestamp, .. }
    ));
    assert_eq!(cfg.policies[3].name(), "size");
    assert_eq!(cfg.eval.unwrap().suite, "eval/rules.yaml");
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.error_class().as_str(), "CONFIG");
    assert!(err.to_string().contains('2'));
}

#[test]
fn out_of_range_values_fail_validation() {
    for bad in [
        "version: 1\nqueue: { capacity: 0 }\n",
        "version: 1\nprocessing: { timeout_ms: 0 }\n",
        "version: 1\nprocessing: { dead_letter_capacity: 0 }\n",
        "version: 1\nhandoff: { path: \"\" }\n",
    ] {
        assert!(config::load_from_str(bad).is_err(), "config should fail: {bad}");
    }
}

#[test]
fn bad_policies_fail_validation() {
    for bad in [
        // duplicate name
        "version: 1\npolicies:\n  - { name: a, kind: required_field, field: patient_id }\n  - { name: a, kind: required_field, field: facility_id }\n",
        // unknown kind
        "version: 1\npolicies:\n  - { name: a, kind: consent_present }\n",
        // unknown field
        "version: 1\npolicies:\n  - { name: a, kind: required_field, field: ssn }\n",
        // extra key on a policy
        "version: 1\npolicies:\n  - { name: a, kind: required_field, field: patient_id, strict: true }\n",
        // empty lists
        "version: 1\npolicies:\n  - { name: a, kind: allowed_types, types: [] }\n",
        "version: 1\npolicies:\n  - { name: a, kind: facility_allowlist, facilities: [] }\n",
        "version: 1\npolicies:\n  - { name: a, kind: max_payload_bytes, max_bytes: 0 }\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.error_class().as_str(), "CONFIG", "config={bad}");
    }
}

#[test]
fn empty_policy_list_is_allowed() {
    let cfg = config::load_from_str("version: 1\npolicies: []\n").expect("must parse");
    assert!(cfg.policies.is_empty());
}
