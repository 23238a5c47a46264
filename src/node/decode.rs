//! Per-protocol URI decoders.
//!
//! Each decoder is a pure function over one subscription line. A malformed
//! line yields a typed [`DecodeError`] and is skipped by the caller; no
//! single bad node aborts an import.

use std::collections::HashMap;

use base64::Engine;

use super::{GrpcOpts, Hysteria2Node, NodeSpec, TrojanNode, VlessNode, VmessNode, WsOpts};
use crate::error::DecodeError;

const DEFAULT_PORT: u16 = 443;

/// Decode one subscription line into a [`NodeSpec`], dispatching on the
/// scheme prefix.
pub fn decode_line(line: &str) -> Result<NodeSpec, DecodeError> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("vless://") {
        decode_vless(rest)
    } else if let Some(rest) = line.strip_prefix("vmess://") {
        decode_vmess(rest)
    } else if let Some(rest) = line.strip_prefix("trojan://") {
        decode_trojan(rest)
    } else if let Some(rest) = line.strip_prefix("hysteria2://") {
        decode_hysteria2(rest)
    } else if let Some(rest) = line.strip_prefix("hy2://") {
        decode_hysteria2(rest)
    } else {
        let scheme = line.split("://").next().unwrap_or(line);
        Err(DecodeError::UnsupportedScheme(truncate(scheme, 32)))
    }
}

fn decode_vless(rest: &str) -> Result<NodeSpec, DecodeError> {
    let (body, fragment) = split_fragment(rest);
    let (uuid, host_part) = body
        .split_once('@')
        .ok_or(DecodeError::MissingField("uuid"))?;
    if uuid.is_empty() {
        return Err(DecodeError::MissingField("uuid"));
    }

    let (addr, query) = split_query(host_part);
    let (server, port) = split_host_port(addr);
    if server.is_empty() {
        return Err(DecodeError::MissingField("host"));
    }
    let params = parse_query(query);

    let network = params
        .get("type")
        .cloned()
        .unwrap_or_else(|| "tcp".to_string());
    let tls = params.get("security").map(|s| s == "tls").unwrap_or(false);
    let servername = params.get("sni").cloned().unwrap_or_else(|| server.clone());
    let client_fingerprint = params
        .get("fp")
        .cloned()
        .unwrap_or_else(|| "chrome".to_string());

    let ws_opts = (network == "ws").then(|| WsOpts {
        path: params.get("path").cloned().unwrap_or_else(|| "/".to_string()),
        headers: params
            .get("host")
            .map(|h| HashMap::from([("Host".to_string(), h.clone())])),
    });
    let grpc_opts = (network == "grpc").then(|| GrpcOpts {
        grpc_service_name: params
            .get("serviceName")
            .cloned()
            .unwrap_or_else(|| "grpc".to_string()),
    });

    Ok(NodeSpec::Vless(VlessNode {
        name: node_name(fragment, "Vless", &server),
        server,
        port,
        uuid: uuid.to_string(),
        network,
        tls,
        servername,
        client_fingerprint,
        ws_opts,
        grpc_opts,
    }))
}

fn decode_vmess(rest: &str) -> Result<NodeSpec, DecodeError> {
    let payload = decode_base64(rest).ok_or(DecodeError::InvalidBase64)?;
    let json: serde_json::Value =
        serde_json::from_str(&payload).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let server = json
        .get("add")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingField("add"))?
        .to_string();
    let uuid = json
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingField("id"))?
        .to_string();

    let port = json.get("port").map(json_port).unwrap_or(DEFAULT_PORT);
    let alter_id = json.get("aid").map(json_u32).unwrap_or(0);
    let network = json
        .get("net")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("tcp")
        .to_string();
    let tls = match json.get("tls") {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "tls",
        _ => false,
    };

    let ws_opts = (network == "ws").then(|| WsOpts {
        path: json
            .get("path")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("/")
            .to_string(),
        headers: json
            .get("host")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|h| HashMap::from([("Host".to_string(), h.to_string())])),
    });

    let name = json
        .get("ps")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Vmess-{server}"));

    Ok(NodeSpec::Vmess(VmessNode {
        name,
        server,
        port,
        uuid,
        alter_id,
        cipher: "auto".to_string(),
        network,
        tls,
        ws_opts,
    }))
}

fn decode_trojan(rest: &str) -> Result<NodeSpec, DecodeError> {
    let (body, fragment) = split_fragment(rest);
    let (password, host_part) = body
        .split_once('@')
        .ok_or(DecodeError::MissingField("password"))?;
    if password.is_empty() {
        return Err(DecodeError::MissingField("password"));
    }

    let (addr, query) = split_query(host_part);
    let (server, port) = split_host_port(addr);
    if server.is_empty() {
        return Err(DecodeError::MissingField("host"));
    }
    let params = parse_query(query);
    let sni = params.get("sni").cloned().unwrap_or_else(|| server.clone());

    Ok(NodeSpec::Trojan(TrojanNode {
        name: node_name(fragment, "Trojan", &server),
        server,
        port,
        password: password.to_string(),
        sni,
    }))
}

fn decode_hysteria2(rest: &str) -> Result<NodeSpec, DecodeError> {
    let (body, fragment) = split_fragment(rest);
    let (password, host_part) = body
        .split_once('@')
        .ok_or(DecodeError::MissingField("password"))?;
    if password.is_empty() {
        return Err(DecodeError::MissingField("password"));
    }

    let (addr, query) = split_query(host_part);
    let (server, port) = split_host_port(addr);
    if server.is_empty() {
        return Err(DecodeError::MissingField("host"));
    }
    let params = parse_query(query);

    Ok(NodeSpec::Hysteria2(Hysteria2Node {
        name: node_name(fragment, "Hysteria2", &server),
        server,
        port,
        password: password.to_string(),
        sni: params.get("sni").cloned(),
    }))
}

/// Split off the `#fragment`, if any.
fn split_fragment(s: &str) -> (&str, Option<&str>) {
    match s.split_once('#') {
        Some((body, frag)) => (body, Some(frag)),
        None => (s, None),
    }
}

/// Split off the `?query`, if any.
fn split_query(s: &str) -> (&str, Option<&str>) {
    match s.split_once('?') {
        Some((addr, query)) => (addr, Some(query)),
        None => (s, None),
    }
}

/// Split `host[:port]`. Bracketed IPv6 literals are honored: the port
/// separator is only looked for after the closing `]`, and the brackets are
/// stripped from the stored server. The port keeps only its digits and falls
/// back to 443 when none remain.
fn split_host_port(s: &str) -> (String, u16) {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = match tail.strip_prefix(':') {
                Some(raw) => parse_port(raw),
                None => DEFAULT_PORT,
            };
            return (host.to_string(), port);
        }
    }
    match s.rsplit_once(':') {
        Some((host, raw)) => (host.to_string(), parse_port(raw)),
        None => (s.to_string(), DEFAULT_PORT),
    }
}

fn parse_port(raw: &str) -> u16 {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(DEFAULT_PORT)
}

/// vmess payloads carry ports and alter ids as either numbers or strings.
fn json_port(v: &serde_json::Value) -> u16 {
    match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .unwrap_or(DEFAULT_PORT),
        serde_json::Value::String(s) => parse_port(s),
        _ => DEFAULT_PORT,
    }
}

fn json_u32(v: &serde_json::Value) -> u32 {
    match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Display name from the percent-decoded fragment, or `<Protocol>-<server>`
/// when absent or empty.
fn node_name(fragment: Option<&str>, protocol: &str, server: &str) -> String {
    fragment
        .map(percent_decode)
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| format!("{protocol}-{server}"))
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some((k, v)) = pair.split_once('=') {
                params.insert(k.to_string(), percent_decode(v));
            }
        }
    }
    params
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Base64 with the padding and alphabet variants seen in the wild.
fn decode_base64(s: &str) -> Option<String> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let engines = [
        base64::engine::general_purpose::STANDARD,
        base64::engine::general_purpose::STANDARD_NO_PAD,
        base64::engine::general_purpose::URL_SAFE,
        base64::engine::general_purpose::URL_SAFE_NO_PAD,
    ];
    for engine in engines {
        if let Ok(bytes) = engine.decode(&compact) {
            return String::from_utf8(bytes).ok();
        }
    }
    None
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vmess(json: &str) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(json);
        format!("vmess://{payload}")
    }

    #[test]
    fn test_vless_all_fields() {
        let line = "vless://u1@example.com:443?type=ws&security=tls&path=%2Fabc&sni=sni.example.com#MyNode";
        let node = decode_line(line).unwrap();
        let NodeSpec::Vless(v) = node else {
            panic!("expected vless");
        };
        assert_eq!(v.name, "MyNode");
        assert_eq!(v.server, "example.com");
        assert_eq!(v.port, 443);
        assert_eq!(v.uuid, "u1");
        assert_eq!(v.network, "ws");
        assert!(v.tls);
        assert_eq!(v.servername, "sni.example.com");
        assert_eq!(v.ws_opts.as_ref().unwrap().path, "/abc");
    }

    #[test]
    fn test_vless_defaults() {
        let node = decode_line("vless://u1@example.com:8443").unwrap();
        let NodeSpec::Vless(v) = node else {
            panic!("expected vless");
        };
        assert_eq!(v.name, "Vless-example.com");
        assert_eq!(v.network, "tcp");
        assert!(!v.tls);
        assert_eq!(v.servername, "example.com");
        assert_eq!(v.client_fingerprint, "chrome");
        assert!(v.ws_opts.is_none());
        assert!(v.grpc_opts.is_none());
    }

    #[test]
    fn test_vless_ws_host_header() {
        let node = decode_line("vless://u1@example.com:443?type=ws&host=cdn.example.com#n").unwrap();
        let NodeSpec::Vless(v) = node else {
            panic!("expected vless");
        };
        let ws = v.ws_opts.unwrap();
        assert_eq!(ws.path, "/");
        assert_eq!(
            ws.headers.unwrap().get("Host").map(String::as_str),
            Some("cdn.example.com")
        );
    }

    #[test]
    fn test_vless_grpc_service_name() {
        let node = decode_line("vless://u1@example.com:443?type=grpc&serviceName=svc#n").unwrap();
        let NodeSpec::Vless(v) = node else {
            panic!("expected vless");
        };
        assert_eq!(v.grpc_opts.unwrap().grpc_service_name, "svc");

        let node = decode_line("vless://u1@example.com:443?type=grpc#n").unwrap();
        let NodeSpec::Vless(v) = node else {
            panic!("expected vless");
        };
        assert_eq!(v.grpc_opts.unwrap().grpc_service_name, "grpc");
    }

    #[test]
    fn test_vless_missing_uuid() {
        assert_eq!(
            decode_line("vless://example.com:443"),
            Err(DecodeError::MissingField("uuid"))
        );
    }

    #[test]
    fn test_vmess_full() {
        let line = encode_vmess(
            r#"{"ps":"VM1","add":"v.example.com","port":"8080","id":"uuid-1","aid":"2","net":"ws","host":"h.example.com","path":"/ws","tls":"tls"}"#,
        );
        let node = decode_line(&line).unwrap();
        let NodeSpec::Vmess(v) = node else {
            panic!("expected vmess");
        };
        assert_eq!(v.name, "VM1");
        assert_eq!(v.server, "v.example.com");
        assert_eq!(v.port, 8080);
        assert_eq!(v.uuid, "uuid-1");
        assert_eq!(v.alter_id, 2);
        assert_eq!(v.network, "ws");
        assert!(v.tls);
        let ws = v.ws_opts.unwrap();
        assert_eq!(ws.path, "/ws");
        assert_eq!(
            ws.headers.unwrap().get("Host").map(String::as_str),
            Some("h.example.com")
        );
    }

    #[test]
    fn test_vmess_defaults() {
        let line = encode_vmess(r#"{"add":"v.example.com","id":"uuid-1"}"#);
        let node = decode_line(&line).unwrap();
        let NodeSpec::Vmess(v) = node else {
            panic!("expected vmess");
        };
        assert_eq!(v.name, "Vmess-v.example.com");
        assert_eq!(v.port, 443);
        assert_eq!(v.alter_id, 0);
        assert_eq!(v.network, "tcp");
        assert!(!v.tls);
        assert!(v.ws_opts.is_none());
    }

    #[test]
    fn test_vmess_numeric_port_and_aid() {
        let line = encode_vmess(r#"{"add":"v.example.com","id":"u","port":443,"aid":0}"#);
        let node = decode_line(&line).unwrap();
        assert_eq!(node.port(), 443);
    }

    #[test]
    fn test_vmess_invalid_base64() {
        assert_eq!(
            decode_line("vmess://%%%not-base64%%%"),
            Err(DecodeError::InvalidBase64)
        );
    }

    #[test]
    fn test_vmess_invalid_json() {
        let payload = base64::engine::general_purpose::STANDARD.encode("not json at all");
        assert!(matches!(
            decode_line(&format!("vmess://{payload}")),
            Err(DecodeError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_vmess_missing_required() {
        let line = encode_vmess(r#"{"ps":"nameless","port":"443"}"#);
        assert_eq!(decode_line(&line), Err(DecodeError::MissingField("add")));
    }

    #[test]
    fn test_trojan_with_sni() {
        let node = decode_line("trojan://pwd@1.2.3.4:8443?sni=s.com#T1").unwrap();
        let NodeSpec::Trojan(t) = node else {
            panic!("expected trojan");
        };
        assert_eq!(t.name, "T1");
        assert_eq!(t.server, "1.2.3.4");
        assert_eq!(t.port, 8443);
        assert_eq!(t.password, "pwd");
        assert_eq!(t.sni, "s.com");
    }

    #[test]
    fn test_trojan_sni_defaults_to_host() {
        let node = decode_line("trojan://pwd@example.com#T").unwrap();
        let NodeSpec::Trojan(t) = node else {
            panic!("expected trojan");
        };
        assert_eq!(t.sni, "example.com");
        assert_eq!(t.port, 443);
    }

    #[test]
    fn test_hysteria2_minimal() {
        let node = decode_line("hysteria2://pwd@5.6.7.8").unwrap();
        let NodeSpec::Hysteria2(h) = node else {
            panic!("expected hysteria2");
        };
        assert_eq!(h.name, "Hysteria2-5.6.7.8");
        assert_eq!(h.server, "5.6.7.8");
        assert_eq!(h.port, 443);
        assert_eq!(h.password, "pwd");
        assert_eq!(h.sni, None);
    }

    #[test]
    fn test_hy2_alias_scheme() {
        let node = decode_line("hy2://pwd@h.example.com:4443?sni=s.example.com#H").unwrap();
        let NodeSpec::Hysteria2(h) = node else {
            panic!("expected hysteria2");
        };
        assert_eq!(h.name, "H");
        assert_eq!(h.port, 4443);
        assert_eq!(h.sni.as_deref(), Some("s.example.com"));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert_eq!(
            decode_line("ssr://whatever"),
            Err(DecodeError::UnsupportedScheme("ssr".to_string()))
        );
    }

    #[test]
    fn test_percent_decoded_fragment() {
        let node = decode_line("trojan://pwd@example.com:443#%E9%A6%99%E6%B8%AF%201").unwrap();
        assert_eq!(node.name(), "香港 1");
    }

    #[test]
    fn test_port_strips_non_digits() {
        let node = decode_line("trojan://pwd@example.com:8x443#T").unwrap();
        assert_eq!(node.port(), 8443);
    }

    #[test]
    fn test_port_empty_defaults_443() {
        let node = decode_line("trojan://pwd@example.com:#T").unwrap();
        assert_eq!(node.port(), 443);
    }

    #[test]
    fn test_bracketed_ipv6_host() {
        let node = decode_line("trojan://pwd@[2001:db8::1]:8443#V6").unwrap();
        let NodeSpec::Trojan(t) = node else {
            panic!("expected trojan");
        };
        assert_eq!(t.server, "2001:db8::1");
        assert_eq!(t.port, 8443);
    }

    #[test]
    fn test_serialized_shape_round_trip() {
        let node =
            decode_line("vless://u1@example.com:443?type=ws&security=tls&path=%2Fabc#N").unwrap();
        let value = serde_yaml::to_value(&node).unwrap();
        assert_eq!(value["type"], serde_yaml::Value::from("vless"));
        assert_eq!(value["port"], serde_yaml::Value::from(443));
        assert_eq!(value["tls"], serde_yaml::Value::from(true));
        assert_eq!(value["ws-opts"]["path"], serde_yaml::Value::from("/abc"));

        let back: NodeSpec = serde_yaml::from_value(value).unwrap();
        assert_eq!(back, node);
    }
}
