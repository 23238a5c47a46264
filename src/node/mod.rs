pub mod decode;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DecodeError;

pub use decode::decode_line;

/// WebSocket transport options, serialized as Clash `ws-opts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsOpts {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// gRPC transport options, serialized as Clash `grpc-opts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrpcOpts {
    #[serde(rename = "grpc-service-name")]
    pub grpc_service_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessNode {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    pub network: String,
    pub tls: bool,
    pub servername: String,
    #[serde(rename = "client-fingerprint")]
    pub client_fingerprint: String,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
    #[serde(rename = "grpc-opts", skip_serializing_if = "Option::is_none")]
    pub grpc_opts: Option<GrpcOpts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmessNode {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    #[serde(rename = "alterId")]
    pub alter_id: u32,
    pub cipher: String,
    pub network: String,
    pub tls: bool,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrojanNode {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub password: String,
    pub sni: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hysteria2Node {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
}

/// One decoded proxy node. Serializes directly as a Clash `proxies` entry,
/// with the protocol in the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeSpec {
    Vless(VlessNode),
    Vmess(VmessNode),
    Trojan(TrojanNode),
    Hysteria2(Hysteria2Node),
}

impl NodeSpec {
    pub fn name(&self) -> &str {
        match self {
            NodeSpec::Vless(n) => &n.name,
            NodeSpec::Vmess(n) => &n.name,
            NodeSpec::Trojan(n) => &n.name,
            NodeSpec::Hysteria2(n) => &n.name,
        }
    }

    pub fn server(&self) -> &str {
        match self {
            NodeSpec::Vless(n) => &n.server,
            NodeSpec::Vmess(n) => &n.server,
            NodeSpec::Trojan(n) => &n.server,
            NodeSpec::Hysteria2(n) => &n.server,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            NodeSpec::Vless(n) => n.port,
            NodeSpec::Vmess(n) => n.port,
            NodeSpec::Trojan(n) => n.port,
            NodeSpec::Hysteria2(n) => n.port,
        }
    }

    fn set_name(&mut self, name: String) {
        match self {
            NodeSpec::Vless(n) => n.name = name,
            NodeSpec::Vmess(n) => n.name = name,
            NodeSpec::Trojan(n) => n.name = name,
            NodeSpec::Hysteria2(n) => n.name = name,
        }
    }
}

/// Accumulates decoded nodes in subscription order. That order becomes the
/// proxy-group membership order, so the registry never reorders.
///
/// Duplicate display names are disambiguated with a ` 2`, ` 3`, ... suffix;
/// group members reference nodes by name, so an ambiguous name would make
/// the generated document refer to the wrong node.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Vec<NodeSpec>,
    name_counts: HashMap<String, usize>,
    failed: usize,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut node: NodeSpec) {
        let base = node.name().to_string();
        let count = self.name_counts.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            node.set_name(format!("{} {}", base, count));
        }
        self.nodes.push(node);
    }

    pub fn record_failure(&mut self, line: &str, err: &DecodeError) {
        warn!(%err, line = %truncate(line, 48), "skipping undecodable subscription line");
        self.failed += 1;
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn into_nodes(self) -> Vec<NodeSpec> {
        self.nodes
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
