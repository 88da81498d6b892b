mod record;

pub use record::{ClientContext, IpInfo, IspInfo, Submission, TelemetryRecord};
