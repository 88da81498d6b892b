//! Scrubbing of addresses and hostnames from submitted telemetry.
//!
//! Matching is pattern based rather than a full address parser: malformed
//! or partial addresses may slip through, but every well-formed IPv4 or
//! IPv6 literal is replaced.

use regex::Regex;

/// Replacement for every matched address.
pub const REDACTED_ADDRESS: &str = "0.0.0.0";

/// Replacement for the `hostname` field of an ISP info blob.
pub const REDACTED_HOSTNAME: &str = r#""hostname":"REDACTED""#;

const REDACTED_HOSTNAME_ESCAPED: &str = r#"\"hostname\":\"REDACTED\""#;

const IPV4_OCTET: &str = r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";
const HEX: &str = "[0-9a-fA-F]{1,4}";

fn ipv4_pattern() -> String {
    format!(r"(?:{IPV4_OCTET}\.){{3}}{IPV4_OCTET}")
}

/// IPv6 alternatives, longest forms first.
///
/// The regex engine picks the first alternative that matches at a given
/// position, so forms carrying an embedded IPv4 tail and forms with more
/// trailing groups have to be tried before the shorter compressed ones.
fn ipv6_pattern() -> String {
    let v4 = ipv4_pattern();
    let alternatives = [
        format!("(?:{HEX}:){{7}}{HEX}"),
        format!("fe80:(?::[0-9a-fA-F]{{0,4}}){{0,4}}%[0-9a-zA-Z]+"),
        format!("::(?:ffff(?::0{{1,4}})?:)?{v4}"),
        format!("(?:{HEX}:){{1,4}}:{v4}"),
        format!("{HEX}:(?::{HEX}){{1,6}}"),
        format!("(?:{HEX}:){{1,2}}(?::{HEX}){{1,5}}"),
        format!("(?:{HEX}:){{1,3}}(?::{HEX}){{1,4}}"),
        format!("(?:{HEX}:){{1,4}}(?::{HEX}){{1,3}}"),
        format!("(?:{HEX}:){{1,5}}(?::{HEX}){{1,2}}"),
        format!("(?:{HEX}:){{1,6}}:{HEX}"),
        format!("(?:{HEX}:){{1,7}}:"),
        format!(":(?:(?::{HEX}){{1,7}}|:)"),
    ];
    alternatives.join("|")
}

/// Compiled redaction patterns plus the on/off switch from configuration.
#[derive(Debug, Clone)]
pub struct Redactor {
    enabled: bool,
    ipv4: Regex,
    ipv6: Regex,
    hostname: Regex,
    hostname_escaped: Regex,
}

impl Redactor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ipv4: compile(&ipv4_pattern()),
            ipv6: compile(&ipv6_pattern()),
            hostname: compile(r#""hostname"\s*:\s*"(?:[^"\\]|\\.)*""#),
            hostname_escaped: compile(r#"\\"hostname\\"\s*:\s*\\"[^"\\]*\\""#),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return `text` with addresses and hostnames replaced.
    ///
    /// When redaction is disabled the input is returned unchanged.
    pub fn redact(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }

        let text = self.ipv6.replace_all(text, REDACTED_ADDRESS);
        let text = self.ipv4.replace_all(&text, REDACTED_ADDRESS);
        let text = self.hostname.replace_all(&text, REDACTED_HOSTNAME);
        let text = self
            .hostname_escaped
            .replace_all(&text, REDACTED_HOSTNAME_ESCAPED);
        text.into_owned()
    }

    /// Redact the visible client address.
    ///
    /// The whole value is replaced, so unusual forms (zone ids, ports) never
    /// survive the way they might when matched inside free text.
    pub fn redact_address(&self, address: &str) -> String {
        if self.enabled {
            REDACTED_ADDRESS.to_string()
        } else {
            address.to_string()
        }
    }
}

// Patterns are fixed at compile time; a failure here is a programming error.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in redaction pattern must compile")
}
