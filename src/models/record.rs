use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One completed speed test, as persisted.
///
/// Measurements are kept as the exact strings the client submitted; they
/// are never parsed into floats on their way to or from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TelemetryRecord {
    #[sqlx(rename = "uuid")]
    pub id: String,
    #[sqlx(rename = "ip")]
    pub ip_address: String,
    #[sqlx(rename = "ispinfo")]
    pub isp_info: String,
    pub extra: String,
    #[sqlx(rename = "ua")]
    pub user_agent: String,
    #[sqlx(rename = "lang")]
    pub language: String,
    #[sqlx(rename = "dl")]
    pub download: String,
    #[sqlx(rename = "ul")]
    pub upload: String,
    pub ping: String,
    pub jitter: String,
    pub log: String,
}

/// Form fields posted by the speedtest client at the end of a run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub ispinfo: String,
    #[serde(default)]
    pub dl: String,
    #[serde(default)]
    pub ul: String,
    #[serde(default)]
    pub ping: String,
    #[serde(default)]
    pub jitter: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub extra: String,
}

impl Submission {
    /// Assign one posted field by name; unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "ispinfo" => &mut self.ispinfo,
            "dl" => &mut self.dl,
            "ul" => &mut self.ul,
            "ping" => &mut self.ping,
            "jitter" => &mut self.jitter,
            "log" => &mut self.log,
            "extra" => &mut self.extra,
            _ => return,
        };
        *slot = value;
    }
}

/// Request-derived details that accompany a submission.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: String,
    pub user_agent: String,
    pub language: String,
}

/// The blob returned by `/getIP` and echoed back by the client as `ispinfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IspInfo {
    #[serde(rename = "processedString", default)]
    pub processed_string: String,
    /// Raw geolocation lookup. Older backends send it as a JSON-encoded
    /// string, newer ones as an object.
    #[serde(rename = "rawIspInfo", default)]
    pub raw_isp_info: serde_json::Value,
}

impl IspInfo {
    /// Decode the nested geolocation lookup, if present and well formed.
    pub fn lookup(&self) -> Option<IpInfo> {
        match &self.raw_isp_info {
            serde_json::Value::String(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(raw).ok()
            }
            serde_json::Value::Object(_) => serde_json::from_value(self.raw_isp_info.clone()).ok(),
            _ => None,
        }
    }
}

/// ipinfo.io lookup response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpInfo {
    pub ip: String,
    pub hostname: String,
    pub city: String,
    pub region: String,
    pub country: String,
    /// `"lat,lng"`
    #[serde(rename = "loc")]
    pub location: String,
    #[serde(rename = "org")]
    pub organization: String,
    pub postal: String,
    pub timezone: String,
}
