//! Tamper-evident audit chain — an append-only, hash-linked log of every
//! governance decision and admin event.
//!
//! Each entry carries the SHA-256 hash of its predecessor. If any byte of
//! any persisted entry changes, `verify_chain` detects it. The canonical
//! hash input is pinned exactly as spec'd: a key-sorted JSON object over
//! `{seq, ts, type, data, prev}` — this is the wire contract that makes
//! the chain cross-verifiable outside this crate, so don't reorder or
//! rename these fields without a version bump.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{GovernanceError, Result};

pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
const GENESIS_HASH_LEN: usize = 64;

/// Event kinds an [`AuditEntry`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Decision,
    PolicyReload,
    Panic,
    Override,
}

/// A single entry in the hash-linked chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub timestamp: f64,
    pub event_type: EventType,
    pub data: Value,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// Exactly the bytes fed to SHA-256: a key-sorted JSON object over the
/// five canonical fields. `serde_json` serializes struct fields in
/// declaration order, so the struct below is declared in sorted-key
/// order (`data`, `prev`, `seq`, `ts`, `type`) to make the intent explicit.
#[derive(Serialize)]
struct CanonicalContent<'a> {
    data: &'a Value,
    prev: &'a str,
    seq: u64,
    ts: f64,
    #[serde(rename = "type")]
    event_type: EventType,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl AuditEntry {
    fn compute_hash(&self) -> String {
        let content = CanonicalContent {
            data: &self.data,
            prev: &self.prev_hash,
            seq: self.sequence,
            ts: self.timestamp,
            event_type: self.event_type,
        };
        let canonical = serde_json::to_vec(&content).expect("canonical content always serializes");
        sha256_hex(&canonical)
    }
}

/// On-disk line-delimited record, one JSON object per line.
#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    seq: u64,
    ts: f64,
    #[serde(rename = "type")]
    event_type: EventType,
    data: Value,
    prev_hash: String,
    hash: String,
}

/// Append-only, hash-chained audit log.
///
/// Appends are expected to be externally serialized (single writer, or a
/// mutex held across the exclusive region described in spec.md §5); this
/// type does no internal locking of its own.
pub struct AuditChain {
    log_path: PathBuf,
    chain: Vec<AuditEntry>,
    last_hash: String,
    sequence: u64,
}

impl AuditChain {
    /// Open (or create) a chain backed by `log_path`, replaying any
    /// existing entries and verifying their integrity.
    pub fn open(log_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();
        let mut chain = Self {
            log_path,
            chain: Vec::new(),
            last_hash: GENESIS_HASH.to_string(),
            sequence: 0,
        };
        chain.load_existing()?;
        Ok(chain)
    }

    fn load_existing(&mut self) -> Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }
        let file = std::fs::File::open(&self.log_path)?;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: PersistedRecord = serde_json::from_str(line)
                .map_err(|e| GovernanceError::AuditDecode(line_no as u64, e))?;
            let entry = AuditEntry {
                sequence: record.seq,
                timestamp: record.ts,
                event_type: record.event_type,
                data: record.data,
                prev_hash: record.prev_hash,
                entry_hash: record.hash,
            };
            self.last_hash = entry.entry_hash.clone();
            self.sequence = entry.sequence + 1;
            self.chain.push(entry);
        }

        match self.verify_chain() {
            (true, _) => {
                tracing::info!(target: "governance_core::audit", entries = self.chain.len(), "audit chain loaded, integrity OK");
            }
            (false, Some(i)) => {
                tracing::error!(target: "governance_core::audit", entry = i, "AUDIT CHAIN COMPROMISED — investigate immediately");
            }
            (false, None) => unreachable!("false verification always carries an index"),
        }
        Ok(())
    }

    /// Append a new entry. Disk write failures are logged but never
    /// block the in-memory advance — the decision path must not stall
    /// on disk (spec.md §4.6/§7).
    pub fn append(&mut self, event_type: EventType, data: Value) -> AuditEntry {
        let mut entry = AuditEntry {
            sequence: self.sequence,
            timestamp: unix_timestamp(),
            event_type,
            data,
            prev_hash: self.last_hash.clone(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();

        self.last_hash = entry.entry_hash.clone();
        self.sequence += 1;
        self.chain.push(entry.clone());

        if let Err(e) = self.persist(&entry) {
            tracing::error!(target: "governance_core::audit", error = %e, "failed to persist audit entry, continuing with in-memory chain");
        }

        entry
    }

    pub fn log_decision(&mut self, trace_dict: Value) -> AuditEntry {
        self.append(EventType::Decision, trace_dict)
    }

    pub fn log_policy_reload(&mut self, policy_hash: &str, mode: &str) -> AuditEntry {
        self.append(
            EventType::PolicyReload,
            serde_json::json!({ "policy_hash": policy_hash, "mode": mode }),
        )
    }

    pub fn log_panic(&mut self, reason: &str) -> AuditEntry {
        self.append(EventType::Panic, serde_json::json!({ "reason": reason }))
    }

    pub fn log_manual_override(&mut self, operator: &str, action: &str, justification: &str) -> AuditEntry {
        self.append(
            EventType::Override,
            serde_json::json!({
                "operator": operator,
                "action": action,
                "justification": justification,
            }),
        )
    }

    fn persist(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let record = PersistedRecord {
            seq: entry.sequence,
            ts: entry.timestamp,
            event_type: entry.event_type,
            data: entry.data.clone(),
            prev_hash: entry.prev_hash.clone(),
            hash: entry.entry_hash.clone(),
        };
        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Verify the whole chain. `(true, None)` if valid, `(false,
    /// Some(i))` with `i` the first offending index otherwise.
    pub fn verify_chain(&self) -> (bool, Option<u64>) {
        if self.chain.is_empty() {
            return (true, None);
        }
        if self.chain[0].prev_hash != GENESIS_HASH {
            return (false, Some(0));
        }
        for (i, entry) in self.chain.iter().enumerate() {
            let expected = entry.compute_hash();
            if entry.entry_hash != expected {
                return (false, Some(i as u64));
            }
            if i > 0 && entry.prev_hash != self.chain[i - 1].entry_hash {
                return (false, Some(i as u64));
            }
        }
        (true, None)
    }

    pub fn get_entry(&self, sequence: u64) -> Option<&AuditEntry> {
        self.chain.get(sequence as usize)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }
}

fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// SHA-256 of a file's contents, used to fingerprint the policy file for
/// `policy_reload` audit entries.
pub fn compute_file_hash(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_hex(&bytes))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            write!(out, "{b:02x}").expect("writing to a String never fails");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_64_zeroes() {
        assert_eq!(GENESIS_HASH.len(), GENESIS_HASH_LEN);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn fresh_chain_verifies_empty() {
        let dir = tempfile::tempdir().unwrap();
        let chain = AuditChain::open(dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(chain.verify_chain(), (true, None));
    }

    #[test]
    fn appended_entries_link_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let mut chain = AuditChain::open(dir.path().join("audit.jsonl")).unwrap();
        chain.append(EventType::Decision, serde_json::json!({"a": 1}));
        chain.append(EventType::Decision, serde_json::json!({"a": 2}));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.get_entry(0).unwrap().prev_hash, GENESIS_HASH);
        assert_eq!(chain.get_entry(1).unwrap().prev_hash, chain.get_entry(0).unwrap().entry_hash);
        assert_eq!(chain.verify_chain(), (true, None));
    }

    #[test]
    fn reopening_replays_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut chain = AuditChain::open(&path).unwrap();
            chain.append(EventType::Decision, serde_json::json!({"a": 1}));
            chain.append(EventType::Panic, serde_json::json!({"reason": "test"}));
        }
        let reopened = AuditChain::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.verify_chain(), (true, None));
    }

    #[test]
    fn tampering_with_entry_data_breaks_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut chain = AuditChain::open(&path).unwrap();
            chain.append(EventType::Decision, serde_json::json!({"a": 1}));
            chain.append(EventType::Decision, serde_json::json!({"a": 2}));
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        lines[0] = lines[0].replace("\"a\":1", "\"a\":999");
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        let reopened = AuditChain::open(&path).unwrap();
        let (ok, broken_at) = reopened.verify_chain();
        assert!(!ok);
        assert_eq!(broken_at, Some(0));
    }
}
