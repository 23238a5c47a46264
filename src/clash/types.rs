use serde::Deserialize;

/// One selector group from `GET /proxies/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupStatus {
    pub now: Option<String>,
    pub all: Option<Vec<String>>,
}

/// Response from `GET /version`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}
