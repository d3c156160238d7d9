//! Reachability probing
//!
//! A probe answers one question: did the host reply within the timeout?
//! Every failure mode (timeout, unreachable network, missing ICMP permission,
//! unresolvable name) collapses into `false`; probes never return errors.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tracing::{debug, trace};

use crate::config::MonitorConfig;

const PAYLOAD: [u8; 56] = [0; 56];

/// Liveness check against a network address
#[async_trait]
pub trait Prober: Send + Sync {
    /// `true` if the host answered, `false` for any failure
    async fn probe(&self, address: &str) -> bool;
}

/// ICMP echo prober
///
/// Uses unprivileged datagram ICMP sockets, so it works without root on
/// hosts that allow it (`net.ipv4.ping_group_range` on Linux). Without that
/// permission every probe reports unreachable.
pub struct IcmpProber {
    timeout: Duration,
    count: u16,
    identifier: AtomicU16,
}

impl IcmpProber {
    pub fn new(timeout: Duration, count: u16) -> Self {
        Self {
            timeout,
            count: count.max(1),
            identifier: AtomicU16::new(std::process::id() as u16),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.probe_timeout(), config.probe_count)
    }

    /// Literal IP, or the first address the name resolves to
    async fn resolve(&self, address: &str) -> Option<IpAddr> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Some(ip);
        }

        let lookup = tokio::net::lookup_host((address, 0));
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(mut addrs)) => addrs.next().map(|addr| addr.ip()),
            Ok(Err(e)) => {
                debug!("failed to resolve {address}: {e}");
                None
            }
            Err(_) => {
                debug!("resolving {address} timed out");
                None
            }
        }
    }

    async fn echo(&self, ip: IpAddr) -> bool {
        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };

        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                debug!("cannot open ICMP socket for {ip}: {e}");
                return false;
            }
        };

        let identifier = PingIdentifier(self.identifier.fetch_add(1, Ordering::Relaxed));
        let mut pinger = client.pinger(ip, identifier).await;
        pinger.timeout(self.timeout);

        for seq in 0..self.count {
            match pinger.ping(PingSequence(seq), &PAYLOAD).await {
                Ok((_, rtt)) => {
                    trace!("reply from {ip} in {rtt:?}");
                    return true;
                }
                Err(e) => trace!("no reply from {ip} (seq {seq}): {e}"),
            }
        }

        false
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }

        match self.resolve(address).await {
            Some(ip) => self.echo(ip).await,
            None => false,
        }
    }
}
