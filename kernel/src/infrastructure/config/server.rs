//! HTTP control plane configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// Address the HTTP API listens on.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Interface, `127.0.0.1` unless configured.
    pub host: String,
    /// TCP port; `0` picks a free one.
    pub port: u16,
}

impl ServerSettings {
    /// Parses `host:port` into a bindable address.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() -> anyhow::Result<()> {
        let settings = ServerSettings {
            host: "127.0.0.1".into(),
            port: 9090,
        };
        assert_eq!(settings.socket_addr()?.port(), 9090);

        let bad = ServerSettings {
            host: "localhost name".into(),
            port: 1,
        };
        assert!(bad.socket_addr().is_err());
        Ok(())
    }
}
