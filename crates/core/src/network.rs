//! Basic network reachability checks before pushing

use serde::Serialize;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default connect timeout for reachability checks
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a DNS lookup plus TCP connect
#[derive(Debug, Clone, Serialize)]
pub struct Reachability {
    /// Host that was checked
    pub host: String,
    /// Port that was checked
    pub port: u16,
    /// Resolved addresses (empty when DNS failed)
    pub addresses: Vec<IpAddr>,
    /// DNS failure message
    pub dns_error: Option<String>,
    /// Whether any resolved address accepted a TCP connection
    pub connected: bool,
    /// Last connect failure message
    pub connect_error: Option<String>,
}

impl Reachability {
    /// DNS resolved and a connection succeeded
    pub fn is_reachable(&self) -> bool {
        self.dns_error.is_none() && self.connected
    }

    /// Troubleshooting lines matching the failure
    pub fn hints(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if self.dns_error.is_some() {
            hints.push(format!("DNS lookup for {} failed.", self.host));
            hints.push("Check your DNS settings, or try a public resolver such as 8.8.8.8 or 1.1.1.1.".to_string());
            hints.push(format!("Try: nslookup {}", self.host));
        } else if !self.connected {
            hints.push(format!(
                "{} resolved but port {} did not accept a connection.",
                self.host, self.port
            ));
            hints.push("If you are behind a proxy, configure it for git:".to_string());
            hints.push("  git config --global http.proxy http://proxy.example.com:8080".to_string());
            hints.push("Check firewall or VPN settings that may block HTTPS traffic.".to_string());
        }
        hints
    }
}

/// Resolve `host` and try a TCP connection to `port`
pub fn check_host(host: &str, port: u16, timeout: Duration) -> Reachability {
    let mut report = Reachability {
        host: host.to_string(),
        port,
        addresses: Vec::new(),
        dns_error: None,
        connected: false,
        connect_error: None,
    };

    let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            tracing::warn!(host, error = %e, "DNS lookup failed");
            report.dns_error = Some(e.to_string());
            return report;
        }
    };

    if addrs.is_empty() {
        report.dns_error = Some("no addresses returned".to_string());
        return report;
    }
    report.addresses = addrs.iter().map(SocketAddr::ip).collect();

    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(_) => {
                report.connected = true;
                report.connect_error = None;
                break;
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "Connect failed");
                report.connect_error = Some(e.to_string());
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_local_listener_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let report = check_host("127.0.0.1", port, Duration::from_secs(1));
        assert!(report.is_reachable());
        assert!(report.hints().is_empty());
    }

    #[test]
    fn test_dns_failure_hints() {
        let report = check_host("nonexistent.invalid", 443, Duration::from_millis(200));
        assert!(!report.is_reachable());
        assert!(report.dns_error.is_some());
        assert!(report.hints().iter().any(|h| h.contains("DNS")));
    }

    #[test]
    fn test_connect_failure_hints() {
        let report = Reachability {
            host: "github.com".to_string(),
            port: 443,
            addresses: vec!["140.82.112.3".parse().unwrap()],
            dns_error: None,
            connected: false,
            connect_error: Some("timed out".to_string()),
        };
        assert!(report.hints().iter().any(|h| h.contains("proxy")));
    }
}
