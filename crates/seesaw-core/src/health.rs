//! Boot health probes.
//!
//! What "healthy" means beyond basic reachability is deliberately open;
//! the validator only needs a yes/no with a reason. Deeper checks are new
//! implementations of [`HealthProbe`], not changes to the validator.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A boot-time health check.
pub trait HealthProbe {
    /// `Ok` when the system looks healthy, `Err` with a human-readable
    /// reason otherwise. Must be side-effect free; the validator may be
    /// retried across boots.
    fn check(&self) -> Result<(), String>;

    /// Short name for log lines.
    fn name(&self) -> &'static str;
}

/// The default probe: a TCP connect to a well-known external address.
///
/// A placeholder for deeper checks, but a useful one: it proves the kernel,
/// network stack, interface configuration, and default route all came up.
#[derive(Debug, Clone)]
pub struct TcpReachability {
    addr: String,
    timeout: Duration,
}

impl TcpReachability {
    /// Probe `addr` (host:port) with `timeout` per connection attempt.
    #[must_use]
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

impl HealthProbe for TcpReachability {
    fn check(&self) -> Result<(), String> {
        let addrs = self
            .addr
            .to_socket_addrs()
            .map_err(|err| format!("cannot resolve {}: {err}", self.addr))?;
        let mut last_err = format!("{} did not resolve to any address", self.addr);
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return Ok(()),
                Err(err) => last_err = format!("connect to {addr} failed: {err}"),
            }
        }
        Err(last_err)
    }

    fn name(&self) -> &'static str {
        "tcp-reachability"
    }
}

/// Test probe with a fixed answer.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    healthy: bool,
}

impl FixedProbe {
    /// A probe that always reports healthy.
    #[must_use]
    pub fn healthy() -> Self {
        Self { healthy: true }
    }

    /// A probe that always reports unhealthy.
    #[must_use]
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }
}

impl HealthProbe for FixedProbe {
    fn check(&self) -> Result<(), String> {
        if self.healthy {
            Ok(())
        } else {
            Err("probe fixed to unhealthy".to_owned())
        }
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn fixed_probe_answers() {
        assert!(FixedProbe::healthy().check().is_ok());
        assert!(FixedProbe::unhealthy().check().is_err());
    }

    #[test]
    fn tcp_probe_reaches_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpReachability::new(addr.to_string(), Duration::from_secs(1));
        probe.check().unwrap();
    }

    #[test]
    fn tcp_probe_fails_on_unresolvable_host() {
        let probe = TcpReachability::new(
            "definitely-not-a-host.invalid:80",
            Duration::from_millis(100),
        );
        assert!(probe.check().is_err());
    }
}
