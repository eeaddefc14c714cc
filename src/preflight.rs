//! Reachability check run against the peer registry before a batch starts

use crate::error::PreflightError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// One node as reported by the peer network status interface
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerNode {
    #[serde(rename = "HostName")]
    pub hostname: String,

    #[serde(rename = "Online", default)]
    pub online: bool,
}

/// Point-in-time view of the peer network. Fetched fresh for every check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerStatusSnapshot {
    #[serde(rename = "Self")]
    pub self_node: PeerNode,

    /// Keyed by peer id. Absent or `null` when the node has no peers.
    #[serde(rename = "Peer", default)]
    peers: Option<HashMap<String, PeerNode>>,
}

impl PeerStatusSnapshot {
    pub fn new(self_hostname: impl Into<String>) -> Self {
        Self {
            self_node: PeerNode {
                hostname: self_hostname.into(),
                online: true,
            },
            peers: None,
        }
    }

    pub fn with_peer(mut self, id: impl Into<String>, hostname: impl Into<String>, online: bool) -> Self {
        self.peers.get_or_insert_with(HashMap::new).insert(
            id.into(),
            PeerNode {
                hostname: hostname.into(),
                online,
            },
        );
        self
    }

    /// Parse the JSON document produced by `tailscale status --json`
    pub fn from_json(bytes: &[u8]) -> Result<Self, PreflightError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn self_hostname(&self) -> &str {
        &self.self_node.hostname
    }

    pub fn peers(&self) -> impl Iterator<Item = (&str, &PeerNode)> {
        self.peers
            .iter()
            .flat_map(|peers| peers.iter())
            .map(|(id, node)| (id.as_str(), node))
    }

    /// Check `target` against this snapshot. Hostnames compare
    /// case-insensitively.
    pub fn validate_target(&self, target: &str) -> Result<(), PreflightError> {
        if same_hostname(self.self_hostname(), target) {
            return Err(PreflightError::SelfTarget {
                target: target.to_string(),
            });
        }

        // Any online entry with the name wins, so duplicate hostnames never
        // depend on map order.
        let mut found = false;
        for (id, node) in self.peers() {
            if same_hostname(&node.hostname, target) {
                debug!(peer_id = id, online = node.online, "Found target in peer list");
                if node.online {
                    return Ok(());
                }
                found = true;
            }
        }

        if found {
            Err(PreflightError::Offline {
                target: target.to_string(),
            })
        } else {
            Err(PreflightError::UnknownPeer {
                target: target.to_string(),
            })
        }
    }
}

/// Hostnames compare with full Unicode case folding, the same way file
/// extensions are matched.
fn same_hostname(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Source of peer network status snapshots
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<PeerStatusSnapshot, PreflightError>;
}

/// Fetch a fresh snapshot and verify `target` is a reachable peer
pub async fn check_reachable<S>(source: &S, target: &str) -> Result<(), PreflightError>
where
    S: StatusSource + ?Sized,
{
    let snapshot = source.fetch_status().await?;
    debug!(
        self_hostname = snapshot.self_hostname(),
        peers = snapshot.peers().count(),
        "Fetched peer status"
    );

    snapshot.validate_target(target)?;
    info!(peer = target, "Target machine is online");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_JSON: &str = r#"{
        "Version": "1.70.0",
        "BackendState": "Running",
        "Self": { "HostName": "laptop", "Online": true, "DNSName": "laptop.tail.ts.net." },
        "Peer": {
            "nodekey:aaa": { "HostName": "host1", "Online": true },
            "nodekey:bbb": { "HostName": "nas", "Online": false }
        }
    }"#;

    struct Fixed(PeerStatusSnapshot);

    #[async_trait]
    impl StatusSource for Fixed {
        async fn fetch_status(&self) -> Result<PeerStatusSnapshot, PreflightError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl StatusSource for Broken {
        async fn fetch_status(&self) -> Result<PeerStatusSnapshot, PreflightError> {
            Err(PreflightError::Query {
                reason: "tailscaled not running".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_status_json() {
        let snapshot = PeerStatusSnapshot::from_json(STATUS_JSON.as_bytes()).unwrap();
        assert_eq!(snapshot.self_hostname(), "laptop");
        assert_eq!(snapshot.peers().count(), 2);
    }

    #[test]
    fn test_parse_null_and_missing_peers() {
        let null_peers = br#"{ "Self": { "HostName": "solo" }, "Peer": null }"#;
        let snapshot = PeerStatusSnapshot::from_json(null_peers).unwrap();
        assert_eq!(snapshot.peers().count(), 0);

        let no_peers = br#"{ "Self": { "HostName": "solo" } }"#;
        assert_eq!(PeerStatusSnapshot::from_json(no_peers).unwrap().peers().count(), 0);
    }

    #[test]
    fn test_malformed_status_is_parse_error() {
        assert!(matches!(
            PeerStatusSnapshot::from_json(b"not json"),
            Err(PreflightError::Parse(_))
        ));
        assert!(matches!(
            PeerStatusSnapshot::from_json(br#"{ "Peer": {} }"#),
            Err(PreflightError::Parse(_))
        ));
    }

    #[test]
    fn test_self_target_is_rejected_case_insensitively() {
        let snapshot = PeerStatusSnapshot::from_json(STATUS_JSON.as_bytes()).unwrap();
        assert!(matches!(
            snapshot.validate_target("LAPTOP"),
            Err(PreflightError::SelfTarget { .. })
        ));
    }

    #[test]
    fn test_peer_lookup_outcomes() {
        let snapshot = PeerStatusSnapshot::from_json(STATUS_JSON.as_bytes()).unwrap();

        assert!(snapshot.validate_target("Host1").is_ok());
        assert!(matches!(
            snapshot.validate_target("nas"),
            Err(PreflightError::Offline { .. })
        ));
        assert!(matches!(
            snapshot.validate_target("desktop"),
            Err(PreflightError::UnknownPeer { .. })
        ));
    }

    #[test]
    fn test_non_ascii_hostnames_compare_case_insensitively() {
        let snapshot = PeerStatusSnapshot::new("Büro").with_peer("a", "Ångström", true);
        assert!(matches!(
            snapshot.validate_target("BÜRO"),
            Err(PreflightError::SelfTarget { .. })
        ));
        assert!(snapshot.validate_target("ÅNGSTRÖM").is_ok());
        assert!(snapshot.validate_target("ångström").is_ok());
    }

    #[test]
    fn test_duplicate_hostnames_prefer_online_entry() {
        let snapshot = PeerStatusSnapshot::new("laptop")
            .with_peer("old", "nas", false)
            .with_peer("new", "nas", true);
        assert!(snapshot.validate_target("nas").is_ok());
    }

    #[tokio::test]
    async fn test_check_reachable_uses_source() {
        let source = Fixed(PeerStatusSnapshot::new("laptop").with_peer("a", "host1", true));
        assert!(check_reachable(&source, "host1").await.is_ok());
        assert!(matches!(
            check_reachable(&source, "laptop").await,
            Err(PreflightError::SelfTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        assert!(matches!(
            check_reachable(&Broken, "host1").await,
            Err(PreflightError::Query { .. })
        ));
    }
}
