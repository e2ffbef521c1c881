// Opaque pagination token over the (created_at, id) sort key
//
// Clients round-trip this token between pages without interpreting it.
// This module is the only place that understands the token's internals;
// storage receives the decoded pair and routes receive the encoded string.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// The last-seen position in a tenant's `(created_at, id)` order.
///
/// Wire form is `"<RFC 3339 UTC timestamp>|<event id>"`, e.g.
/// `2025-11-11T10:00:00.000000Z|01934b2f-…`. Timestamps are encoded at
/// microsecond precision, matching what the store persists, so a token
/// decodes back to exactly the position it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Render the opaque wire form.
    pub fn encode(&self) -> String {
        format!(
            "{}|{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id
        )
    }

    /// Parse a wire token. Returns `None` for anything malformed: wrong
    /// piece count, a timestamp that is not RFC 3339, or a bad id.
    pub fn decode(token: &str) -> Option<Self> {
        let (timestamp, id) = token.split_once('|')?;
        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { created_at, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 11, 10, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456)
    }

    #[test]
    fn test_encode_format() {
        let cursor = Cursor::new(sample_time(), Uuid::nil());
        assert_eq!(
            cursor.encode(),
            "2025-11-11T10:00:00.123456Z|00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_round_trip_exact() {
        let cursor = Cursor::new(sample_time(), Uuid::now_v7());
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_round_trip_whole_second() {
        let cursor = Cursor::new(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(), Uuid::nil());
        assert_eq!(Cursor::decode(&cursor.encode()), Some(cursor));
    }

    #[test]
    fn test_decode_accepts_offset_form() {
        let decoded = Cursor::decode(
            "2025-11-11T10:00:00.123456+00:00|00000000-0000-0000-0000-000000000000",
        )
        .unwrap();
        assert_eq!(decoded.created_at, sample_time());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(Cursor::decode(""), None);
        assert_eq!(Cursor::decode("no-separator"), None);
        assert_eq!(Cursor::decode("2025-11-11T10:00:00Z"), None);
        assert_eq!(
            Cursor::decode("not-a-timestamp|00000000-0000-0000-0000-000000000000"),
            None
        );
        assert_eq!(Cursor::decode("2025-11-11T10:00:00Z|not-a-uuid"), None);
        // a date without a time is not a valid position
        assert_eq!(
            Cursor::decode("2025-11-11|00000000-0000-0000-0000-000000000000"),
            None
        );
    }

    #[test]
    fn test_decode_keeps_extra_separators_in_id_half() {
        // Only the first separator splits; anything after it must parse as an id.
        assert_eq!(Cursor::decode("2025-11-11T10:00:00Z|abc|def"), None);
    }
}
