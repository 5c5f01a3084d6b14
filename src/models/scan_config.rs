// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

/// Flat option payload understood by the remote scanning service.
pub type OptionMap = serde_json::Map<String, serde_json::Value>;

/// A boolean given either natively or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Flag {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A number given either natively or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Float(f64),
    Text(String),
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Number {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

fn default_method() -> Option<String> {
    Some("GET".to_owned())
}

/// Describes the request that is tested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub target: String,
    #[serde(default = "default_method")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
}

/// How the remote service reaches the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_cred: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tor_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomize: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_post: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_req_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tor: Option<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_tor: Option<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_url_encode: Option<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_ssl: Option<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunked: Option<Flag>,
    /// HTTP parameter pollution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpp: Option<Flag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Knobs {
    /// Seconds between two requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Number>,
    /// Seconds until a request times out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<Number>,
    /// Requests between two visits of the safe URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_freq: Option<Number>,
}

/// Configuration of a single scan as submitted by a client.
///
/// The groups are flattened, on the wire all fields live on the same level:
///
/// ```json
/// { "target": "http://example.com/?id=1", "tor": "yes", "delay": "1.5" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfiguration {
    #[serde(flatten)]
    pub request: RequestOptions,
    #[serde(flatten)]
    pub connection: ConnectionOptions,
    #[serde(flatten)]
    pub flags: Flags,
    #[serde(flatten)]
    pub knobs: Knobs,
    /// Passed through verbatim and merged last.
    #[serde(default, skip_serializing_if = "OptionMap::is_empty")]
    pub custom_options: OptionMap,
}

impl ScanConfiguration {
    pub fn new<S>(target: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            request: RequestOptions {
                target: target.into(),
                method: default_method(),
                data: None,
                cookie: None,
                user_agent: None,
                referer: None,
                headers: None,
            },
            connection: ConnectionOptions::default(),
            flags: Flags::default(),
            knobs: Knobs::default(),
            custom_options: OptionMap::new(),
        }
    }
}
