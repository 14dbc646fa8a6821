//! Subscription callback validation (SSRF guard).
//!
//! A callback must be an http(s) URL whose host is not a loopback literal
//! and does not resolve into any blocked range. The range list is built at
//! startup and injected; DNS goes through [`HostResolver`] so tests can
//! supply fixed answers.
//!
//! Known gap: validation happens once, at subscription time. A host that
//! later re-resolves to a private address (DNS rebinding) is not caught
//! here; delivery must re-validate. When resolution fails outright the
//! callback is accepted and delivery will fail on its own.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use url::{Host, Url};

// ---------------------------------------------------------------------------
// IpRange
// ---------------------------------------------------------------------------

/// A CIDR block, e.g. `10.0.0.0/8` or `fc00::/7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix_len: u8,
}

impl IpRange {
    /// Returns `None` if `prefix_len` exceeds the address width.
    #[must_use]
    pub fn new(network: IpAddr, prefix_len: u8) -> Option<Self> {
        let width = if network.is_ipv4() { 32 } else { 128 };
        (prefix_len <= width).then_some(Self {
            network,
            prefix_len,
        })
    }

    const fn v4(a: u8, b: u8, c: u8, d: u8, prefix_len: u8) -> Self {
        Self {
            network: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            prefix_len,
        }
    }

    const fn v6(network: Ipv6Addr, prefix_len: u8) -> Self {
        Self {
            network: IpAddr::V6(network),
            prefix_len,
        }
    }

    /// Addresses of the other family never match.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CIDR range '{0}'")]
pub struct InvalidRange(String);

impl FromStr for IpRange {
    type Err = InvalidRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRange(s.to_string());
        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let network: IpAddr = addr.trim().parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix.trim().parse().map_err(|_| invalid())?;
        Self::new(network, prefix_len).ok_or_else(invalid)
    }
}

/// Loopback, RFC 1918, link-local and IPv6 ULA/link-local blocks.
#[must_use]
pub fn default_blocked_ranges() -> Vec<IpRange> {
    vec![
        IpRange::v4(127, 0, 0, 0, 8),
        IpRange::v4(10, 0, 0, 0, 8),
        IpRange::v4(172, 16, 0, 0, 12),
        IpRange::v4(192, 168, 0, 0, 16),
        IpRange::v4(169, 254, 0, 0, 16),
        IpRange::v6(Ipv6Addr::LOCALHOST, 128),
        IpRange::v6(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
        IpRange::v6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    ]
}

// ---------------------------------------------------------------------------
// HostResolver
// ---------------------------------------------------------------------------

/// Hostname resolution used by the callback validator.
#[async_trait]
pub trait HostResolver: Send + Sync + 'static {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system (`getaddrinfo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

// ---------------------------------------------------------------------------
// CallbackValidator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("callback is not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("callback URL scheme '{0}' is not allowed; use http or https")]
    UnsupportedScheme(String),
    #[error("callback URL must include a host")]
    MissingHost,
    #[error("callback host '{0}' is a loopback address")]
    LoopbackHost(String),
    #[error("callback host '{host}' resolves to blocked address {addr}")]
    BlockedAddress { host: String, addr: IpAddr },
}

/// Validates subscription callback URLs against a blocked-range list.
pub struct CallbackValidator {
    blocked: Vec<IpRange>,
    resolver: Arc<dyn HostResolver>,
}

impl CallbackValidator {
    #[must_use]
    pub fn new(blocked: Vec<IpRange>, resolver: Arc<dyn HostResolver>) -> Self {
        Self { blocked, resolver }
    }

    /// Validates `callback`, returning the parsed URL.
    ///
    /// # Errors
    ///
    /// Returns the first rule the callback violates.
    pub async fn validate(&self, callback: &str) -> Result<Url, CallbackError> {
        let url = Url::parse(callback).map_err(|e| CallbackError::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(CallbackError::UnsupportedScheme(other.to_string())),
        }

        let host_str = url.host_str().unwrap_or_default();
        if host_str.is_empty() {
            return Err(CallbackError::MissingHost);
        }
        let bare = host_str.trim_start_matches('[').trim_end_matches(']');
        if bare.eq_ignore_ascii_case("localhost") || bare == "127.0.0.1" || bare == "::1" {
            warn!(callback, "rejected loopback callback host");
            return Err(CallbackError::LoopbackHost(bare.to_string()));
        }

        match url.host() {
            Some(Host::Ipv4(ip)) => self.check_addr(bare, IpAddr::V4(ip))?,
            Some(Host::Ipv6(ip)) => self.check_addr(bare, IpAddr::V6(ip))?,
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                match self.resolver.resolve(domain, port).await {
                    Ok(addrs) => {
                        for addr in addrs {
                            self.check_addr(domain, addr)?;
                        }
                    }
                    Err(e) => {
                        warn!(host = domain, error = %e, "callback host did not resolve; accepting");
                    }
                }
            }
            None => return Err(CallbackError::MissingHost),
        }

        Ok(url)
    }

    fn check_addr(&self, host: &str, addr: IpAddr) -> Result<(), CallbackError> {
        // ::ffff:10.0.0.1 must be judged as 10.0.0.1.
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
            IpAddr::V4(_) => addr,
        };
        if let Some(range) = self.blocked.iter().find(|r| r.contains(addr)) {
            warn!(host, %addr, %range, "rejected callback resolving to blocked range");
            return Err(CallbackError::BlockedAddress {
                host: host.to_string(),
                addr,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Resolver answering from a fixed table; unknown hosts fail to resolve.
    #[derive(Default)]
    pub(crate) struct StaticResolver {
        answers: HashMap<String, Vec<IpAddr>>,
    }

    impl StaticResolver {
        pub(crate) fn with(mut self, host: &str, addrs: &[&str]) -> Self {
            let parsed = addrs.iter().map(|a| a.parse().unwrap()).collect();
            self.answers.insert(host.to_string(), parsed);
            self
        }
    }

    #[async_trait]
    impl HostResolver for StaticResolver {
        async fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
            self.answers.get(host).cloned().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such host")
            })
        }
    }

    fn validator(resolver: StaticResolver) -> CallbackValidator {
        CallbackValidator::new(default_blocked_ranges(), Arc::new(resolver))
    }

    #[test]
    fn cidr_parsing_and_matching() {
        let range: IpRange = "172.16.0.0/12".parse().unwrap();
        assert!(range.contains("172.31.255.1".parse().unwrap()));
        assert!(!range.contains("172.32.0.1".parse().unwrap()));
        assert!(!range.contains("::1".parse().unwrap()));
        assert_eq!(range.to_string(), "172.16.0.0/12");

        let all: IpRange = "0.0.0.0/0".parse().unwrap();
        assert!(all.contains("8.8.8.8".parse().unwrap()));

        assert!("10.0.0.0/33".parse::<IpRange>().is_err());
        assert!("10.0.0.0".parse::<IpRange>().is_err());
        assert!("nope/8".parse::<IpRange>().is_err());
    }

    #[test]
    fn default_ranges_cover_private_space() {
        let ranges = default_blocked_ranges();
        for addr in ["10.1.2.3", "172.20.0.1", "192.168.1.1", "169.254.169.254", "127.0.0.53", "fd00::1", "fe80::1", "::1"] {
            let ip: IpAddr = addr.parse().unwrap();
            assert!(ranges.iter().any(|r| r.contains(ip)), "{addr} should be blocked");
        }
        let public: IpAddr = "93.184.216.34".parse().unwrap();
        assert!(!ranges.iter().any(|r| r.contains(public)));
    }

    #[tokio::test]
    async fn loopback_literals_are_rejected() {
        let v = validator(StaticResolver::default());
        for cb in ["http://localhost/x", "http://127.0.0.1/x", "http://[::1]/x", "http://LOCALHOST:8080/x"] {
            let err = v.validate(cb).await.unwrap_err();
            assert!(matches!(err, CallbackError::LoopbackHost(_)), "{cb}: {err}");
        }
    }

    #[tokio::test]
    async fn non_http_schemes_are_rejected() {
        let v = validator(StaticResolver::default());
        let err = v.validate("ftp://example.com/x").await.unwrap_err();
        assert_eq!(err, CallbackError::UnsupportedScheme("ftp".into()));
        assert!(err.to_string().contains("scheme"));
    }

    #[tokio::test]
    async fn unparseable_callbacks_are_rejected() {
        let v = validator(StaticResolver::default());
        assert!(matches!(
            v.validate("not a url").await,
            Err(CallbackError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn hosts_resolving_to_private_ranges_are_rejected() {
        let resolver = StaticResolver::default()
            .with("ten.example", &["10.0.0.5"])
            .with("mid.example", &["172.16.4.4"])
            .with("home.example", &["192.168.0.10"])
            .with("meta.example", &["169.254.169.254"]);
        let v = validator(resolver);
        for host in ["ten.example", "mid.example", "home.example", "meta.example"] {
            let err = v.validate(&format!("https://{host}/hook")).await.unwrap_err();
            assert!(
                matches!(err, CallbackError::BlockedAddress { ref host, .. } if host.ends_with(".example")),
                "{err}"
            );
        }
    }

    #[tokio::test]
    async fn any_blocked_address_rejects_mixed_answers() {
        let v = validator(StaticResolver::default().with("mixed.example", &["93.184.216.34", "10.9.9.9"]));
        assert!(v.validate("https://mixed.example/x").await.is_err());
    }

    #[tokio::test]
    async fn private_ip_literals_and_mapped_addresses_are_rejected() {
        let v = validator(StaticResolver::default());
        assert!(v.validate("http://10.0.0.1/x").await.is_err());
        assert!(v.validate("http://[::ffff:192.168.1.1]/x").await.is_err());
        assert!(v.validate("http://[fe80::1]/x").await.is_err());
    }

    #[tokio::test]
    async fn public_host_is_accepted() {
        let v = validator(StaticResolver::default().with("public.example.com", &["93.184.216.34"]));
        let url = v.validate("https://public.example.com/x").await.unwrap();
        assert_eq!(url.host_str(), Some("public.example.com"));
    }

    #[tokio::test]
    async fn resolution_failure_fails_open() {
        let v = validator(StaticResolver::default());
        assert!(v.validate("https://unresolvable.example/x").await.is_ok());
    }

    #[tokio::test]
    async fn injected_ranges_override_defaults() {
        let ranges = vec!["100.64.0.0/10".parse().unwrap()];
        let v = CallbackValidator::new(
            ranges,
            Arc::new(StaticResolver::default().with("cgnat.example", &["100.64.1.1"])),
        );
        assert!(v.validate("https://cgnat.example/x").await.is_err());
        assert!(v.validate("http://10.0.0.1/x").await.is_ok());
    }

    proptest::proptest! {
        #[test]
        fn range_contains_its_own_network(bits: u32, prefix in 0u8..=32) {
            let addr = IpAddr::V4(Ipv4Addr::from(bits));
            let range = IpRange::new(addr, prefix).unwrap();
            proptest::prop_assert!(range.contains(addr));
            proptest::prop_assert!(!range.contains(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        }

        #[test]
        fn flipping_a_prefix_bit_leaves_the_range(bits: u32, prefix in 1u8..=32) {
            let addr = Ipv4Addr::from(bits);
            let range = IpRange::new(IpAddr::V4(addr), prefix).unwrap();
            let flipped = Ipv4Addr::from(bits ^ (1u32 << (32 - u32::from(prefix))));
            proptest::prop_assert!(!range.contains(IpAddr::V4(flipped)));
        }
    }
}
