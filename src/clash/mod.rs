mod client;
mod types;

pub use client::ClashClient;
pub use types::{GroupStatus, VersionResponse};
