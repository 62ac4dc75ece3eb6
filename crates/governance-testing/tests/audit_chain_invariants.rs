//! Scenario tests over the tamper-evident audit hash chain.

use governance_core::audit::{AuditChain, EventType};

#[test]
fn chain_of_mixed_events_links_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let mut chain = AuditChain::open(dir.path().join("audit.jsonl")).unwrap();

    chain.log_decision(serde_json::json!({"intent_id": "i1", "decision": "APPROVED"}));
    chain.log_policy_reload("deadbeef", "production");
    chain.log_panic("operator requested lockdown");
    chain.log_manual_override("alice", "APPROVED", "verified manually");

    assert_eq!(chain.len(), 4);
    let (ok, bad_index) = chain.verify_chain();
    assert!(ok);
    assert_eq!(bad_index, None);

    assert_eq!(chain.get_entry(0).unwrap().event_type, EventType::Decision);
    assert_eq!(chain.get_entry(3).unwrap().event_type, EventType::Override);
}

#[test]
fn tampering_with_any_single_line_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    {
        let mut chain = AuditChain::open(&path).unwrap();
        for i in 0..5 {
            chain.log_decision(serde_json::json!({"seq_marker": i}));
        }
    }

    for target in 0..5usize {
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        lines[target] = lines[target].replace(&format!("\"seq_marker\":{target}"), "\"seq_marker\":9999");
        let tampered_path = dir.path().join(format!("tampered-{target}.jsonl"));
        std::fs::write(&tampered_path, lines.join("\n") + "\n").unwrap();

        let reopened = AuditChain::open(&tampered_path).unwrap();
        let (ok, bad_index) = reopened.verify_chain();
        assert!(!ok, "tampering entry {target} should break verification");
        assert_eq!(bad_index, Some(target as u64));
    }
}

#[test]
fn reopening_an_empty_chain_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    {
        let chain = AuditChain::open(&path).unwrap();
        assert!(chain.is_empty());
    }
    let reopened = AuditChain::open(&path).unwrap();
    assert!(reopened.is_empty());
    assert_eq!(reopened.verify_chain(), (true, None));
}

#[test]
fn compute_file_hash_is_stable_for_unchanged_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    std::fs::write(&path, "mode: production\n").unwrap();
    let h1 = governance_core::audit::compute_file_hash(&path).unwrap();
    let h2 = governance_core::audit::compute_file_hash(&path).unwrap();
    assert_eq!(h1, h2);

    std::fs::write(&path, "mode: paranoid\n").unwrap();
    let h3 = governance_core::audit::compute_file_hash(&path).unwrap();
    assert_ne!(h1, h3);
}
