//! ISP descriptions shown to the client before a test starts.
//!
//! The description (`processedString`) combines the client's address, the
//! provider name, its country and the distance to this server. The client
//! echoes it back with its results, which is where result cards get their
//! footer.

use anyhow::{Context, Result};
use ipnet::{Ipv4Net, Ipv6Net};
use regex::Regex;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::distance::{distance, parse_location_or_origin, Coordinates, DistanceUnit};
use crate::models::IpInfo;

pub const DEFAULT_IPINFO_URL: &str = "https://ipinfo.io";

fn asn_prefix() -> &'static Regex {
    static ASN: OnceLock<Regex> = OnceLock::new();
    ASN.get_or_init(|| Regex::new(r"AS\d+\s").expect("ASN pattern must compile"))
}

/// Remove autonomous-system tokens such as `"AS64500 "` from an
/// organization name.
pub fn strip_asn(organization: &str) -> String {
    asn_prefix().replace_all(organization, "").into_owned()
}

/// Fixed description for addresses that never reach a geolocation lookup.
pub fn classify(ip: IpAddr) -> Option<&'static str> {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };

    match ip {
        IpAddr::V4(v4) => {
            let cgnat: Ipv4Net = "100.64.0.0/10".parse().ok()?;
            if v4.is_loopback() {
                Some("localhost IPv4 access")
            } else if v4.is_private() {
                Some("private IPv4 access")
            } else if v4.is_link_local() {
                Some("link-local IPv4 access")
            } else if cgnat.contains(&v4) {
                Some("CGNAT IPv4 access")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            let link_local: Ipv6Net = "fe80::/10".parse().ok()?;
            let unique_local: Ipv6Net = "fc00::/7".parse().ok()?;
            if v6.is_loopback() {
                Some("localhost IPv6 access")
            } else if link_local.contains(&v6) {
                Some("link-local IPv6 access")
            } else if unique_local.contains(&v6) {
                Some("ULA IPv6 access")
            } else {
                None
            }
        }
    }
}

/// Build the `"<ip> - <isp>, <country>, (<distance>)"` description.
///
/// The distance is only included when both the server location and the
/// client's location are known.
pub fn describe(
    ip: &str,
    info: &IpInfo,
    server: Option<Coordinates>,
    unit: DistanceUnit,
) -> String {
    let mut isp = strip_asn(&info.organization);
    if isp.is_empty() {
        isp = "Unknown ISP".to_string();
    }

    if !info.country.is_empty() {
        isp.push_str(", ");
        isp.push_str(&info.country);
    }

    if let Some(server) = server.filter(|_| !info.location.is_empty()) {
        let client = parse_location_or_origin(&info.location);
        isp.push_str(&format!(", ({})", distance(server, client, unit)));
    }

    format!("{ip} - {isp}")
}

/// Response body of `/getIP`.
#[derive(Debug, Clone, Serialize)]
pub struct IpDescription {
    #[serde(rename = "processedString")]
    pub processed_string: String,
    /// Decoded ipinfo.io response, or an empty string when no lookup ran.
    #[serde(rename = "rawIspInfo")]
    pub raw_isp_info: serde_json::Value,
}

impl IpDescription {
    /// Description without any lookup data.
    pub fn bare(processed_string: impl Into<String>) -> Self {
        Self {
            processed_string: processed_string.into(),
            raw_isp_info: serde_json::Value::String(String::new()),
        }
    }
}

/// Client for the ipinfo.io JSON API.
#[derive(Debug, Clone)]
pub struct IspLookup {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl IspLookup {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build ipinfo HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, ip: Option<IpAddr>) -> String {
        let mut url = match ip {
            Some(ip) => format!("{}/{}/json", self.base_url, ip),
            None => format!("{}/json", self.base_url),
        };
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            url.push_str("?token=");
            url.push_str(key);
        }
        url
    }

    /// Look up `ip`, or this host's own address when `ip` is `None`.
    ///
    /// Returns the raw response body alongside the decoded fields. A body
    /// that does not decode still yields its raw text and empty fields.
    pub async fn lookup(&self, ip: Option<IpAddr>) -> Result<(String, IpInfo)> {
        let raw = self
            .client
            .get(self.url(ip))
            .send()
            .await
            .context("ipinfo request failed")?
            .error_for_status()
            .context("ipinfo returned an error status")?
            .text()
            .await
            .context("failed to read ipinfo response")?;

        let info = serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to parse ipinfo response");
            IpInfo::default()
        });
        Ok((raw, info))
    }

    /// Coordinates of this server as seen by ipinfo.io.
    pub async fn server_location(&self) -> Option<Coordinates> {
        match self.lookup(None).await {
            Ok((_, info)) if !info.location.is_empty() => {
                Some(parse_location_or_origin(&info.location))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "could not determine server location");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(org: &str, country: &str, loc: &str) -> IpInfo {
        IpInfo {
            organization: org.to_string(),
            country: country.to_string(),
            location: loc.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_asn() {
        assert_eq!(strip_asn("AS64500 Example ISP"), "Example ISP");
        assert_eq!(strip_asn("Example ISP"), "Example ISP");
        assert_eq!(strip_asn("AS3320 Deutsche Telekom AG"), "Deutsche Telekom AG");
        assert_eq!(strip_asn("AS64500"), "AS64500");
    }

    #[test]
    fn test_classify_special_addresses() {
        let cases = [
            ("127.0.0.1", Some("localhost IPv4 access")),
            ("10.1.2.3", Some("private IPv4 access")),
            ("172.16.0.1", Some("private IPv4 access")),
            ("172.31.255.1", Some("private IPv4 access")),
            ("192.168.1.1", Some("private IPv4 access")),
            ("169.254.10.10", Some("link-local IPv4 access")),
            ("100.64.0.1", Some("CGNAT IPv4 access")),
            ("100.127.255.254", Some("CGNAT IPv4 access")),
            ("::1", Some("localhost IPv6 access")),
            ("fe80::1", Some("link-local IPv6 access")),
            ("fd12:3456::1", Some("ULA IPv6 access")),
            ("::ffff:192.168.0.4", Some("private IPv4 access")),
            ("172.32.0.1", None),
            ("100.128.0.1", None),
            ("203.0.113.5", None),
            ("2001:db8::1", None),
        ];
        for (ip, expected) in cases {
            assert_eq!(classify(ip.parse().unwrap()), expected, "{ip}");
        }
    }

    #[test]
    fn test_describe_with_distance() {
        let server = Coordinates::new(0.0, 0.0);
        let description = describe(
            "203.0.113.5",
            &info("AS64500 Example ISP", "US", "0,1"),
            Some(server),
            DistanceUnit::Kilometers,
        );
        assert_eq!(description, "203.0.113.5 - Example ISP, US, (111.19 km)");
    }

    #[test]
    fn test_describe_without_server_location() {
        let description = describe(
            "203.0.113.5",
            &info("AS64500 Example ISP", "US", "0,1"),
            None,
            DistanceUnit::Miles,
        );
        assert_eq!(description, "203.0.113.5 - Example ISP, US");
    }

    #[test]
    fn test_describe_unknown_isp() {
        let description = describe("198.51.100.1", &IpInfo::default(), None, DistanceUnit::Miles);
        assert_eq!(description, "198.51.100.1 - Unknown ISP");
    }

    #[test]
    fn test_lookup_url() {
        let lookup = IspLookup::new("https://ipinfo.io/", Some("secret".to_string())).unwrap();
        assert_eq!(
            lookup.url(Some("203.0.113.5".parse().unwrap())),
            "https://ipinfo.io/203.0.113.5/json?token=secret"
        );
        let anonymous = IspLookup::new(DEFAULT_IPINFO_URL, None).unwrap();
        assert_eq!(anonymous.url(None), "https://ipinfo.io/json");
    }
}
