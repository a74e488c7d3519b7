//! Reverse DNS Module
//!
//! This module enriches record source IPs with a hostname. Lookups are
//! best-effort: any failure, including a timeout or an unparsable address,
//! degrades to [`NO_HOSTNAME`] instead of failing the record.
use crate::error::{DmarcError, Result};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Placeholder used when a source IP has no resolvable name.
pub const NO_HOSTNAME: &str = "No hostname found";

/// Something that can map an IP address to a hostname.
#[allow(async_fn_in_trait)]
pub trait HostnameResolver {
    async fn reverse_lookup(&self, ip: &str) -> Result<String>;
}

/// Resolves `ip`, falling back to [`NO_HOSTNAME`] on any error.
pub async fn hostname_or_placeholder<R: HostnameResolver>(resolver: &R, ip: &str) -> String {
    match resolver.reverse_lookup(ip).await {
        Ok(name) => name,
        Err(e) => {
            log::debug!("No hostname for {}: {}", ip, e);
            NO_HOSTNAME.to_string()
        }
    }
}

/// PTR lookups through the system resolver configuration.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsResolver {
    /// Builds a resolver from the system configuration, or public defaults if
    /// the system configuration cannot be read.
    pub fn new(timeout: Duration) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            log::warn!("Falling back to default resolver configuration: {}", e);
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver, timeout }
    }
}

impl HostnameResolver for DnsResolver {
    async fn reverse_lookup(&self, ip: &str) -> Result<String> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| DmarcError::Dns(format!("{:?} is not an IP address", ip)))?;
        match timeout(self.timeout, self.resolver.reverse_lookup(addr)).await {
            Ok(Ok(lookup)) => lookup
                .iter()
                .next()
                .map(|name| name.to_utf8().trim_end_matches('.').to_string())
                .ok_or_else(|| DmarcError::Dns(format!("no PTR record for {}", addr))),
            Ok(Err(e)) => Err(DmarcError::Dns(e.to_string())),
            Err(_) => Err(DmarcError::Dns(format!("lookup of {} timed out", addr))),
        }
    }
}
