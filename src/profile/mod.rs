pub mod constants;
pub mod writer;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ImportError;
use crate::node::{NodeRegistry, NodeSpec};
use constants::{
    DIRECT, GROUP_ADBLOCK, GROUP_AI, GROUP_PROXY, GROUP_STREAMING, REJECT, RULE_TABLE,
};

/// Transport mode of the engine, carried forward across regenerations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Tun,
    #[default]
    Proxy,
}

impl Mode {
    pub fn tun_enabled(&self) -> bool {
        matches!(self, Mode::Tun)
    }
}

/// Read the previously written document (if any) and keep its TUN flag.
/// First run, unreadable file, or missing key all mean [`Mode::Proxy`].
pub fn resolve_mode(path: &Path) -> Mode {
    let Ok(content) = fs::read_to_string(path) else {
        return Mode::Proxy;
    };
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(&content) else {
        return Mode::Proxy;
    };
    let enabled = value
        .get("tun")
        .and_then(|tun| tun.get("enable"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if enabled {
        Mode::Tun
    } else {
        Mode::Proxy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TunSettings {
    pub enable: bool,
    pub stack: String,
    pub auto_route: bool,
    pub auto_detect_interface: bool,
    pub dns_hijack: Vec<String>,
}

impl TunSettings {
    fn with_mode(mode: Mode) -> Self {
        Self {
            enable: mode.tun_enabled(),
            stack: "mixed".to_string(),
            auto_route: true,
            auto_detect_interface: true,
            dns_hijack: vec!["any:53".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DnsSettings {
    pub enable: bool,
    pub listen: String,
    pub enhanced_mode: String,
    pub fake_ip_range: String,
    pub fake_ip_filter: Vec<String>,
    pub default_nameserver: Vec<String>,
    pub nameserver: Vec<String>,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            enable: true,
            listen: "0.0.0.0:1053".to_string(),
            enhanced_mode: "fake-ip".to_string(),
            fake_ip_range: "198.18.0.1/16".to_string(),
            fake_ip_filter: vec![
                "*.lan".to_string(),
                "*.local".to_string(),
                "localhost.ptlogin2.qq.com".to_string(),
            ],
            default_nameserver: vec!["223.5.5.5".to_string(), "119.29.29.29".to_string()],
            nameserver: vec![
                "https://doh.pub/dns-query".to_string(),
                "https://dns.alidns.com/dns-query".to_string(),
            ],
        }
    }
}

/// A named selector over nodes and terminal actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub proxies: Vec<String>,
}

impl ProxyGroup {
    fn select(name: &str, members: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            group_type: "select".to_string(),
            proxies: members,
        }
    }
}

/// The full generated configuration document. Field order here is the
/// top-level key order in the written YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigDocument {
    pub mixed_port: u16,
    pub allow_lan: bool,
    pub bind_address: String,
    pub mode: String,
    pub log_level: String,
    pub external_controller: String,
    pub tun: TunSettings,
    pub dns: DnsSettings,
    pub proxies: Vec<NodeSpec>,
    pub proxy_groups: Vec<ProxyGroup>,
    pub rules: Vec<String>,
}

/// Assemble the document from the registry and the carried-forward mode.
///
/// An empty registry is fatal: the caller must not overwrite a working
/// configuration just because a subscription came back broken.
pub fn synthesize(registry: &NodeRegistry, mode: Mode) -> Result<ConfigDocument, ImportError> {
    if registry.is_empty() {
        return Err(ImportError::EmptyNodeSet {
            failed: registry.failed(),
        });
    }

    let names = registry.names();
    debug!(nodes = names.len(), tun = mode.tun_enabled(), "synthesizing document");

    let mut proxy_members = names.clone();
    proxy_members.push(DIRECT.to_string());
    let mut ai_members = names.clone();
    ai_members.push(GROUP_PROXY.to_string());
    let mut streaming_members = names;
    streaming_members.push(GROUP_PROXY.to_string());

    let proxy_groups = vec![
        ProxyGroup::select(GROUP_PROXY, proxy_members),
        ProxyGroup::select(GROUP_AI, ai_members),
        ProxyGroup::select(GROUP_STREAMING, streaming_members),
        ProxyGroup::select(GROUP_ADBLOCK, vec![REJECT.to_string(), DIRECT.to_string()]),
    ];

    Ok(ConfigDocument {
        mixed_port: 7890,
        allow_lan: false,
        bind_address: "*".to_string(),
        mode: "rule".to_string(),
        log_level: "info".to_string(),
        external_controller: "127.0.0.1:9090".to_string(),
        tun: TunSettings::with_mode(mode),
        dns: DnsSettings::default(),
        proxies: registry.nodes().to_vec(),
        proxy_groups,
        rules: RULE_TABLE.iter().map(|rule| rule.render()).collect(),
    })
}
