use base64::Engine;
use jsonrpsee::http_client::{HeaderMap, HeaderValue};
use std::{fs, path::PathBuf};

/// How the RPC client authenticates against the node.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// A fixed `user:password` pair, as configured directly.
    UserPass { user: String, password: String },
    /// A path to the node's `.cookie` file, re-read on every client construction so a restarted
    /// node's regenerated cookie is picked up.
    CookieFile(PathBuf),
}

impl Credentials {
    pub(crate) fn to_headers(&self) -> Result<HeaderMap, std::io::Error> {
        let userpass = match self {
            Self::UserPass { user, password } => format!("{user}:{password}"),
            Self::CookieFile(path) => fs::read_to_string(path)?.trim().to_owned(),
        };

        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode(userpass.as_bytes());
        let value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .unwrap_or_else(|_| HeaderValue::from_static(""));
        headers.insert(jsonrpsee::http_client::header::AUTHORIZATION, value);
        Ok(headers)
    }
}
