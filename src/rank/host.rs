use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{RankError, RankResult};

/// Host identity: the URL origin (scheme + host + port).
///
/// Paths, queries and fragments are ignored, and default ports are dropped,
/// so `https://a.example:443/x?y` and `https://a.example` are the same site.
/// A different subdomain, scheme or port is a different site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Wrap an already-normalized origin string (snapshots, tests).
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    /// Normalize an absolute URL to its origin.
    pub fn from_url(raw: &str) -> RankResult<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| RankError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let origin = url.origin();
        if !origin.is_tuple() {
            // mailto:, data:, javascript: ... have no host to rank
            return Err(RankError::InvalidUrl {
                url: raw.to_string(),
                reason: "url has no host origin".to_string(),
            });
        }

        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HostId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Distinct host identities of `links`, in first-seen order.
///
/// Links that fail to parse are skipped; the second value counts them.
pub fn distinct_hosts<I, S>(links: I) -> (Vec<HostId>, usize)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    let mut skipped = 0;

    for link in links {
        match HostId::from_url(link.as_ref()) {
            Ok(host) => {
                if seen.insert(host.clone()) {
                    hosts.push(host);
                }
            }
            Err(e) => {
                debug!("Skipping link: {}", e);
                skipped += 1;
            }
        }
    }

    (hosts, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_ignores_path_query_fragment() {
        let host = HostId::from_url("https://Example.com/docs/page?x=1#top").unwrap();
        assert_eq!(host.as_str(), "https://example.com");
    }

    #[test]
    fn test_default_port_dropped_custom_port_kept() {
        let a = HostId::from_url("https://example.com:443/").unwrap();
        let b = HostId::from_url("https://example.com").unwrap();
        let c = HostId::from_url("https://example.com:8443").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.as_str(), "https://example.com:8443");
    }

    #[test]
    fn test_scheme_and_subdomain_are_distinct_sites() {
        let https = HostId::from_url("https://example.com").unwrap();
        let http = HostId::from_url("http://example.com").unwrap();
        let sub = HostId::from_url("https://www.example.com").unwrap();
        assert_ne!(https, http);
        assert_ne!(https, sub);
    }

    #[test]
    fn test_relative_and_opaque_urls_rejected() {
        assert!(matches!(
            HostId::from_url("/just/a/path"),
            Err(RankError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HostId::from_url("mailto:someone@example.com"),
            Err(RankError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_distinct_hosts_keeps_first_seen_order() {
        let links = [
            "https://b.example/one",
            "not a url",
            "https://a.example/",
            "https://b.example/two",
            "https://c.example",
            "https://a.example/again",
        ];
        let (hosts, skipped) = distinct_hosts(links);
        let names: Vec<&str> = hosts.iter().map(|h| h.as_str()).collect();
        assert_eq!(
            names,
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
        assert_eq!(skipped, 1);
    }
}
