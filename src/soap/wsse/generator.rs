use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Validity window claimed by every generated timestamp
pub const TIMESTAMP_TTL_MINUTES: i64 = 10;

const SOAP_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Generate a random opaque identifier (128 bits, hex encoded)
pub fn generate_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Current UTC instant in SOAP timestamp format.
///
/// Each call reads the clock, so a `generate_created`/`generate_expires` pair
/// may be up to a second more than the TTL apart. Use [`Timestamp::now`] for a
/// pair built on one instant.
pub fn generate_created() -> String {
    format_soap_date(&Utc::now())
}

/// Current UTC instant plus the timestamp TTL in SOAP timestamp format.
///
/// Reads the clock on its own, see [`generate_created`].
pub fn generate_expires() -> String {
    format_soap_date(&(Utc::now() + Duration::minutes(TIMESTAMP_TTL_MINUTES)))
}

fn format_soap_date(instant: &DateTime<Utc>) -> String {
    instant.format(SOAP_DATE_FORMAT).to_string()
}

/// A `Created`/`Expires` pair for the security header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub created: String,
    pub expires: String,
}

impl Timestamp {
    /// Timestamp starting now and expiring after the default TTL
    pub fn now() -> Self {
        Self::with_ttl(Utc::now(), Duration::minutes(TIMESTAMP_TTL_MINUTES))
    }

    /// Timestamp starting at `created` (truncated to the second) and valid for `ttl`
    pub fn with_ttl(created: DateTime<Utc>, ttl: Duration) -> Self {
        let created = created.trunc_subsecs(0);
        Self {
            created: format_soap_date(&created),
            expires: format_soap_date(&(created + ttl)),
        }
    }
}
