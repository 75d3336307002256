// src/resolver.rs
//! Canonical-name resolution with a CNAME -> A-record fallback chain

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::RecordType;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::types::{ResolutionMethod, ResolutionOutcome};

/// Raw DNS operations the resolver needs
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// CNAME targets published for `name`, in answer order
    async fn cname_records(&self, name: &str) -> Result<Vec<String>>;

    /// Owner name of the address records after following any alias chain
    async fn address_canonical(&self, name: &str) -> Result<Option<String>>;
}

/// Produces one best-effort canonical name per target
#[async_trait]
pub trait CnameResolver: Send + Sync {
    async fn resolve(&self, target: &str) -> ResolutionOutcome;
}

/// Fallback-chain resolver over any [`DnsLookup`]
pub struct Resolver<L> {
    lookup: L,
    timeout: Duration,
}

impl<L: DnsLookup> Resolver<L> {
    pub fn new(lookup: L, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    async fn direct_cname(&self, target: &str) -> Result<Option<String>> {
        let records = timeout(self.timeout, self.lookup.cname_records(target))
            .await
            .map_err(|_| anyhow::anyhow!("CNAME lookup timed out after {:?}", self.timeout))??;

        Ok(records
            .into_iter()
            .map(|r| strip_root(&r).to_string())
            .find(|r| !r.is_empty()))
    }

    async fn chase_address(&self, target: &str) -> Result<Option<String>> {
        let canonical = timeout(self.timeout, self.lookup.address_canonical(target))
            .await
            .map_err(|_| anyhow::anyhow!("A lookup timed out after {:?}", self.timeout))??;

        Ok(canonical
            .map(|c| strip_root(&c).to_string())
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(target)))
    }
}

#[async_trait]
impl<L: DnsLookup> CnameResolver for Resolver<L> {
    async fn resolve(&self, target: &str) -> ResolutionOutcome {
        let name = strip_root(target.trim());
        let mut cname_error = None;

        match self.direct_cname(name).await {
            Ok(Some(cname)) => {
                debug!(target = name, cname = %cname, "found CNAME record");
                return ResolutionOutcome::found(target, cname, ResolutionMethod::DirectCname);
            }
            Ok(None) => debug!(target = name, "no CNAME record"),
            Err(e) => {
                debug!(target = name, error = %e, "CNAME lookup failed, trying A record");
                cname_error = Some(format!("CNAME: {e:#}"));
            }
        }

        match self.chase_address(name).await {
            Ok(Some(canonical)) => {
                debug!(target = name, canonical = %canonical, "A record chain settled on alias");
                ResolutionOutcome::found(target, canonical, ResolutionMethod::ARecordChase)
            }
            Ok(None) => ResolutionOutcome::unresolved(target, cname_error),
            Err(e) => {
                let a_error = format!("A: {e:#}");
                let error = match cname_error {
                    Some(c) => format!("{c}; {a_error}"),
                    None => a_error,
                };
                ResolutionOutcome::unresolved(target, Some(error))
            }
        }
    }
}

fn strip_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// [`DnsLookup`] backed by hickory's tokio resolver
#[derive(Clone)]
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Use the system resolver configuration, or Cloudflare if it cannot be read
    pub fn from_system(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!("Could not read system DNS config ({}), using Cloudflare", e);
                (ResolverConfig::cloudflare(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Query only the given `ip:port` nameservers over UDP
    pub fn with_nameservers(nameservers: &[String], timeout: Duration) -> Result<Self> {
        let mut config = ResolverConfig::new();
        for ns in nameservers {
            let socket_addr: SocketAddr = ns
                .parse()
                .with_context(|| format!("Invalid nameserver address '{}'", ns))?;
            config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn cname_records(&self, name: &str) -> Result<Vec<String>> {
        let Some(lookup) = answered(self.resolver.lookup(name, RecordType::CNAME).await)? else {
            return Ok(Vec::new());
        };

        Ok(lookup
            .record_iter()
            .filter_map(|record| record.data().and_then(|d| d.as_cname()))
            .map(|cname| cname.to_string())
            .collect())
    }

    async fn address_canonical(&self, name: &str) -> Result<Option<String>> {
        let Some(lookup) = answered(self.resolver.lookup(name, RecordType::A).await)? else {
            return Ok(None);
        };

        Ok(lookup
            .record_iter()
            .find(|record| record.record_type() == RecordType::A)
            .map(|record| record.name().to_string()))
    }
}

fn is_no_records(e: &ResolveError) -> bool {
    matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

/// An empty answer is `None`; every other resolver error propagates
fn answered<T>(result: std::result::Result<T, ResolveError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_no_records(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct ScriptedLookup {
        cnames: HashMap<String, Result<Vec<String>, String>>,
        addresses: HashMap<String, Result<Option<String>, String>>,
        stall: bool,
    }

    #[async_trait]
    impl DnsLookup for ScriptedLookup {
        async fn cname_records(&self, name: &str) -> Result<Vec<String>> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            match self.cnames.get(name) {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(e)) => Err(anyhow::anyhow!(e.clone())),
                None => Ok(Vec::new()),
            }
        }

        async fn address_canonical(&self, name: &str) -> Result<Option<String>> {
            match self.addresses.get(name) {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(e)) => Err(anyhow::anyhow!(e.clone())),
                None => Ok(None),
            }
        }
    }

    fn resolver(lookup: ScriptedLookup) -> Resolver<ScriptedLookup> {
        Resolver::new(lookup, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_direct_cname_strips_root_dot() {
        let mut lookup = ScriptedLookup::default();
        lookup.cnames.insert(
            "a.example.com".into(),
            Ok(vec!["x.s3.amazonaws.com.".into(), "ignored.example.net.".into()]),
        );

        let outcome = resolver(lookup).resolve("a.example.com").await;
        assert_eq!(outcome.canonical_name.as_deref(), Some("x.s3.amazonaws.com"));
        assert_eq!(outcome.method, ResolutionMethod::DirectCname);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_address_chain() {
        let mut lookup = ScriptedLookup::default();
        lookup
            .cnames
            .insert("www.example.com".into(), Err("NXDOMAIN".into()));
        lookup.addresses.insert(
            "www.example.com".into(),
            Ok(Some("edge.azureedge.net.".into())),
        );

        let outcome = resolver(lookup).resolve("www.example.com").await;
        assert_eq!(outcome.canonical_name.as_deref(), Some("edge.azureedge.net"));
        assert_eq!(outcome.method, ResolutionMethod::ARecordChase);
    }

    #[tokio::test]
    async fn test_address_canonical_equal_to_target_is_none() {
        let mut lookup = ScriptedLookup::default();
        lookup.addresses.insert(
            "b.example.com".into(),
            Ok(Some("B.Example.com.".into())),
        );

        let outcome = resolver(lookup).resolve("b.example.com").await;
        assert_eq!(outcome.canonical_name, None);
        assert_eq!(outcome.method, ResolutionMethod::None);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_both_lookups_failing_populates_error() {
        let mut lookup = ScriptedLookup::default();
        lookup.cnames.insert("gone.example.com".into(), Err("SERVFAIL".into()));
        lookup
            .addresses
            .insert("gone.example.com".into(), Err("NXDOMAIN".into()));

        let outcome = resolver(lookup).resolve("gone.example.com").await;
        assert_eq!(outcome.canonical_name, None);
        assert_eq!(outcome.method, ResolutionMethod::None);
        let error = outcome.error.unwrap();
        assert!(error.contains("SERVFAIL"));
        assert!(error.contains("NXDOMAIN"));
    }

    #[tokio::test]
    async fn test_stalled_lookup_times_out() {
        let lookup = ScriptedLookup {
            stall: true,
            ..Default::default()
        };
        let resolver = Resolver::new(lookup, Duration::from_millis(50));

        let outcome = resolver.resolve("slow.example.com").await;
        assert_eq!(outcome.method, ResolutionMethod::None);
        assert!(outcome.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_outcome_keeps_original_target() {
        let mut lookup = ScriptedLookup::default();
        lookup
            .cnames
            .insert("a.example.com".into(), Ok(vec!["app.herokuapp.com.".into()]));

        let outcome = resolver(lookup).resolve("a.example.com.").await;
        assert_eq!(outcome.target, "a.example.com.");
        assert_eq!(outcome.canonical_name.as_deref(), Some("app.herokuapp.com"));
    }

    fn no_records_error() -> ResolveError {
        use hickory_resolver::proto::op::{Query, ResponseCode};
        use hickory_resolver::proto::rr::Name;

        let name = Name::from_ascii("gone.example.com.").unwrap();
        ResolveError::from(ResolveErrorKind::NoRecordsFound {
            query: Box::new(Query::query(name, RecordType::CNAME)),
            soa: None,
            negative_ttl: None,
            response_code: ResponseCode::NXDomain,
            trusted: false,
        })
    }

    #[test]
    fn test_empty_answer_is_not_an_error() {
        assert!(is_no_records(&no_records_error()));

        let answer = answered::<Vec<String>>(Err(no_records_error())).unwrap();
        assert!(answer.is_none());

        let answer = answered(Ok(vec!["x.s3.amazonaws.com.".to_string()])).unwrap();
        assert_eq!(answer, Some(vec!["x.s3.amazonaws.com.".to_string()]));
    }

    #[test]
    fn test_resolver_failure_propagates() {
        let err = ResolveError::from(ResolveErrorKind::Message("connection refused"));
        assert!(!is_no_records(&err));

        let answer = answered::<Vec<String>>(Err(err));
        assert!(answer.unwrap_err().to_string().contains("connection refused"));
    }
}
