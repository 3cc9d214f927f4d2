//! Request targets.
//!
//! A [`Target`] is the scheme + host + port a request is addressed to. The
//! guard only filters traffic to its main target; everything else goes
//! straight to the transport.

use std::fmt;

use axum::http::Uri;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    scheme: String,
    host: String,
    /// Explicit port, else the scheme's default; `None` for schemes without one.
    port: Option<u16>,
}

impl Target {
    /// Target of any URI with an authority, whatever its scheme. `None` only
    /// for relative URIs.
    pub fn from_uri(uri: &Uri) -> Option<Self> {
        let host = uri.host()?.to_ascii_lowercase();
        let scheme = uri.scheme_str().unwrap_or_default().to_ascii_lowercase();
        let port = uri.port_u16().or_else(|| default_port(&scheme));
        Some(Self { scheme, host, port })
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        Some(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port_or_known_default(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `scheme://host:port/`
    pub fn root_uri(&self) -> Option<Uri> {
        self.to_string().parse().ok()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        f.write_str("/")
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}
