//! Chunk provenance helpers: source keys and publish dates

use crate::corpus::EvidenceChunk;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Source key used when a chunk has neither a source nor a usable URL
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Publisher key for diversity capping: `source`, else URL host, else "unknown"
pub fn source_key(chunk: &EvidenceChunk) -> String {
    if let Some(source) = chunk.source.as_deref().map(str::trim) {
        if !source.is_empty() {
            return source.to_string();
        }
    }
    chunk
        .url
        .as_deref()
        .and_then(url_domain)
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Lowercase host of a URL without userinfo, port or a leading `www.`
pub fn url_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?;
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Parse RFC 3339 timestamps or a leading `YYYY-MM-DD` date (midnight UTC)
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Oldest publish time still considered fresh; `None` when out of range
pub fn age_cutoff(now: DateTime<Utc>, max_age_days: u32) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(i64::from(max_age_days)).and_then(|age| now.checked_sub_signed(age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_field_wins() {
        let chunk = EvidenceChunk::new("1", "t")
            .with_source("Reuters")
            .with_url("https://www.bbc.co.uk/news/1");
        assert_eq!(source_key(&chunk), "Reuters");
    }

    #[test]
    fn test_blank_source_falls_back_to_domain() {
        let chunk = EvidenceChunk::new("1", "t")
            .with_source("  ")
            .with_url("https://www.BBC.co.uk/news/1");
        assert_eq!(source_key(&chunk), "bbc.co.uk");
    }

    #[test]
    fn test_unknown_source() {
        assert_eq!(source_key(&EvidenceChunk::new("1", "t")), UNKNOWN_SOURCE);
        let chunk = EvidenceChunk::new("1", "t").with_url("");
        assert_eq!(source_key(&chunk), UNKNOWN_SOURCE);
    }

    #[test]
    fn test_url_domain_variants() {
        assert_eq!(
            url_domain("https://user@news.example.com:8443/a?b=c").as_deref(),
            Some("news.example.com")
        );
        assert_eq!(url_domain("apnews.com/article/x").as_deref(), Some("apnews.com"));
        assert_eq!(url_domain("http://example.org#frag").as_deref(), Some("example.org"));
        assert_eq!(url_domain("https:///path"), None);
    }

    #[test]
    fn test_parse_published_at() {
        let midnight = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_published_at("2024-05-01"), Some(midnight));
        assert_eq!(parse_published_at("2024-05-01 10:00"), Some(midnight));
        assert_eq!(
            parse_published_at("2024-05-01T12:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_published_at("yesterday"), None);
        assert_eq!(parse_published_at(""), None);
    }

    #[test]
    fn test_age_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap();
        assert_eq!(
            age_cutoff(now, 30),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(age_cutoff(now, u32::MAX), None);
    }
}
