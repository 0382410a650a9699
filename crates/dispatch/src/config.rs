//! Configuration for the upload root and the session gate.
//!
//! Every field has a default, so a partial (or empty) JSON document is valid:
//!
//! ```
//! use micro_dispatch::config::WebConfig;
//!
//! let config = WebConfig::from_json_str(r#"{ "upload": { "root": "/tmp/files" } }"#).unwrap();
//! assert_eq!(config.upload.root.to_str(), Some("/tmp/files"));
//! assert_eq!(config.upload.buffer_size, 8192);
//! assert_eq!(config.session.protected, ["/private/**"]);
//! ```

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub upload: UploadConfig,
    pub session: SessionConfig,
}

impl WebConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory uploaded files are saved into.
    pub root: PathBuf,
    /// Capacity of the copy buffer, in bytes.
    pub buffer_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("upload"), buffer_size: 8 * 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// The session attribute whose presence lets a request through the gate.
    pub attribute: String,
    /// Where blocked requests are redirected.
    pub redirect_to: String,
    pub protected: Vec<String>,
    pub public: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "SESSIONID".to_owned(),
            attribute: "user".to_owned(),
            redirect_to: "/hello".to_owned(),
            protected: vec!["/private/**".to_owned()],
            public: vec![],
        }
    }
}
