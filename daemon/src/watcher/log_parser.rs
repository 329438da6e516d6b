//! VRChat log line classification.
//!
//! Turns one raw log line into at most one [`TimedEvent`]. Classification is
//! pure and total: anything unrecognised yields `None`, or a
//! [`LogEvent::DurationHint`] when the line happens to carry a `dur=` URL.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use url::Url;

/// Offsets at or below this many seconds count as "start of stream".
pub const ZERO_OFFSET_EPSILON: f64 = 0.05;

/// Literal marker the Unity video player writes when it stops.
const STOP_MARKER: &str = "Send Event _OnStop";

const LOG_TS_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

static LOG_TS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<ts>\d{4}\.\d{2}\.\d{2} \d{2}:\d{2}:\d{2})\s+\w+\s+-\s+")
        .expect("timestamp regex")
});

static ATTEMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Video Playback\]\s+Attempting to resolve URL '(?P<url>[^']+)'")
        .expect("attempt regex")
});

static RESOLVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Video Playback\]\s+URL '(?P<url>[^']+)' resolved to '(?P<resolved>[^']+)'")
        .expect("resolved regex")
});

static OPENING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[AVProVideo\]\s+Opening\s+(?P<url>https?://\S+)(?:\s+\(offset\s+(?P<offset>\d+(?:\.\d+)?)\))?",
    )
    .expect("opening regex")
});

static GENERIC_STOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)video stop").expect("stop regex"));

static GENERIC_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:PlayerError|Video player error|Video error|\[AVProVideo\]\s+Error)")
        .expect("error regex")
});

static ANY_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url regex"));

static DUR_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]dur=(?P<dur>\d+(?:\.\d+)?)").expect("duration regex")
});

/// A playback-relevant fact extracted from one log line.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// The world's video player started resolving a URL.
    AttemptResolve { url: String },
    /// Resolution finished; the resolved URL may carry `dur=`.
    Resolved {
        requested_url: String,
        resolved_url: String,
    },
    /// The media backend started playback at an offset into the stream.
    Opening { url: String, offset_seconds: f64 },
    Stop,
    /// A transient playback error. Not a stop.
    Error { message: String },
    /// A duration seen in some unrelated line.
    DurationHint { seconds: f64 },
}

/// A [`LogEvent`] plus the instant it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub at: DateTime<Utc>,
    pub event: LogEvent,
}

/// Classify a line, falling back to the current time when it has no
/// parsable timestamp.
pub fn classify(line: &str) -> Option<TimedEvent> {
    classify_at(line, Utc::now())
}

/// Classify a line, falling back to `observed_at` when it has no parsable
/// timestamp. First match wins; the patterns overlap textually.
pub fn classify_at(line: &str, observed_at: DateTime<Utc>) -> Option<TimedEvent> {
    let event = classify_event(line)?;
    let at = parse_log_timestamp(line).unwrap_or(observed_at);
    Some(TimedEvent { at, event })
}

fn classify_event(line: &str) -> Option<LogEvent> {
    if let Some(caps) = ATTEMPT.captures(line) {
        return Some(LogEvent::AttemptResolve {
            url: caps["url"].to_string(),
        });
    }

    if let Some(caps) = RESOLVED.captures(line) {
        return Some(LogEvent::Resolved {
            requested_url: caps["url"].to_string(),
            resolved_url: caps["resolved"].to_string(),
        });
    }

    if let Some(caps) = OPENING.captures(line) {
        let offset_seconds = caps
            .name("offset")
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0);
        return Some(LogEvent::Opening {
            url: caps["url"].to_string(),
            offset_seconds,
        });
    }

    if line.contains(STOP_MARKER) || GENERIC_STOP.is_match(line) {
        return Some(LogEvent::Stop);
    }

    if let Some(m) = GENERIC_ERROR.find(line) {
        return Some(LogEvent::Error {
            message: m.as_str().to_string(),
        });
    }

    duration_in_line(line).map(|seconds| LogEvent::DurationHint { seconds })
}

/// Parse the `YYYY.MM.DD HH:MM:SS <Level> - ` prefix as local time.
pub fn parse_log_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = LOG_TS.captures(line)?;
    let naive = NaiveDateTime::parse_from_str(&caps["ts"], LOG_TS_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Video identity for YouTube URLs: `youtu.be/<id>`, `youtube.com/watch?v=<id>`,
/// `youtube.com/shorts/<id>` and `youtube.com/embed/<id>`.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    if is_host(&host, "youtu.be") {
        return segments.first().map(|id| id.to_string());
    }

    if is_host(&host, "youtube.com") {
        if let Some((_, v)) = url.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
            return Some(v.into_owned());
        }
        if let [kind, id, ..] = segments.as_slice() {
            if *kind == "shorts" || *kind == "embed" {
                return Some(id.to_string());
            }
        }
    }

    None
}

fn is_host(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Canonical watch page for a YouTube URL, or the URL itself.
pub fn watch_url(raw: &str) -> String {
    match extract_video_id(raw) {
        Some(id) => format!("https://www.youtube.com/watch?v={id}"),
        None => raw.to_string(),
    }
}

/// The `dur=` query parameter of a URL, if positive.
pub fn duration_param(url: &str) -> Option<f64> {
    let caps = DUR_PARAM.captures(url)?;
    caps["dur"]
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Duration carried by the first URL in an arbitrary line.
pub fn duration_in_line(line: &str) -> Option<f64> {
    ANY_URL
        .find(line)
        .and_then(|m| duration_param(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PREFIX: &str = "2024.01.15 20:31:02 Log        -  ";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    fn event(line: &str) -> Option<LogEvent> {
        classify_at(line, fixed_now()).map(|e| e.event)
    }

    #[test]
    fn attempt_resolve() {
        let line = format!(
            "{PREFIX}[Video Playback] Attempting to resolve URL 'https://www.youtube.com/watch?v=abc'"
        );
        assert_eq!(
            event(&line),
            Some(LogEvent::AttemptResolve {
                url: "https://www.youtube.com/watch?v=abc".to_string()
            })
        );
    }

    #[test]
    fn resolved_keeps_both_urls() {
        let line = format!(
            "{PREFIX}[Video Playback] URL 'https://youtu.be/abc' resolved to 'https://rr1.googlevideo.com/videoplayback?id=1&dur=212.5'"
        );
        assert_eq!(
            event(&line),
            Some(LogEvent::Resolved {
                requested_url: "https://youtu.be/abc".to_string(),
                resolved_url: "https://rr1.googlevideo.com/videoplayback?id=1&dur=212.5"
                    .to_string(),
            })
        );
    }

    #[test]
    fn opening_with_and_without_offset() {
        let line = format!("{PREFIX}[AVProVideo] Opening https://cdn.example/v.mp4 (offset 42)");
        assert_eq!(
            event(&line),
            Some(LogEvent::Opening {
                url: "https://cdn.example/v.mp4".to_string(),
                offset_seconds: 42.0,
            })
        );

        let line = format!("{PREFIX}[AVProVideo] Opening https://cdn.example/v.mp4");
        assert_eq!(
            event(&line),
            Some(LogEvent::Opening {
                url: "https://cdn.example/v.mp4".to_string(),
                offset_seconds: 0.0,
            })
        );
    }

    #[test]
    fn stop_markers() {
        assert_eq!(
            event(&format!("{PREFIX}[Behaviour] Send Event _OnStop")),
            Some(LogEvent::Stop)
        );
        assert_eq!(event("something VIDEO STOP happened"), Some(LogEvent::Stop));
    }

    #[test]
    fn error_phrases_are_case_insensitive() {
        assert_eq!(
            event(&format!("{PREFIX}[AVProVideo] Error: loading failed")),
            Some(LogEvent::Error {
                message: "[AVProVideo] Error".to_string()
            })
        );
        assert_eq!(
            event("[USharpVideo] video PLAYER ERROR: Invalid URL"),
            Some(LogEvent::Error {
                message: "video PLAYER ERROR".to_string()
            })
        );
    }

    #[test]
    fn earlier_patterns_win_over_later_ones() {
        let line = "[AVProVideo] Opening https://cdn.example/v.mp4 (offset 3) after Video error";
        assert!(matches!(event(line), Some(LogEvent::Opening { offset_seconds, .. }) if offset_seconds == 3.0));
    }

    #[test]
    fn duration_hint_from_any_url() {
        assert_eq!(
            event("[Misc] cached https://host/x?a=1&dur=95 for later"),
            Some(LogEvent::DurationHint { seconds: 95.0 })
        );
    }

    #[test]
    fn unrelated_lines_yield_nothing() {
        assert_eq!(event(""), None);
        assert_eq!(event(&format!("{PREFIX}[Behaviour] Joining wrld_123")), None);
        assert_eq!(event("see https://example.com/page?x=1"), None);
        assert_eq!(event("dur=120 but no url"), None);
    }

    #[test]
    fn timestamp_from_prefix_is_local_time() {
        let line = format!("{PREFIX}[Video Playback] Attempting to resolve URL 'https://youtu.be/x'");
        let expected = Local
            .with_ymd_and_hms(2024, 1, 15, 20, 31, 2)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(classify_at(&line, fixed_now()).unwrap().at, expected);
    }

    #[test]
    fn missing_or_bad_timestamp_falls_back_to_observation_time() {
        let no_prefix = "[Video Playback] Attempting to resolve URL 'https://youtu.be/x'";
        assert_eq!(classify_at(no_prefix, fixed_now()).unwrap().at, fixed_now());

        let bad_date =
            "2024.13.45 99:99:99 Log        -  [Video Playback] Attempting to resolve URL 'https://youtu.be/x'";
        assert_eq!(parse_log_timestamp(bad_date), None);
        assert_eq!(classify_at(bad_date, fixed_now()).unwrap().at, fixed_now());
    }

    #[test]
    fn video_id_extraction() {
        assert_eq!(extract_video_id("https://youtu.be/abc123"), Some("abc123".into()));
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=xyz789&t=10"),
            Some("xyz789".into())
        );
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/zzz"),
            Some("zzz".into())
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/embed/emb1?autoplay=1"),
            Some("emb1".into())
        );
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
        assert_eq!(extract_video_id("https://notyoutube.com/watch?v=abc"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/abc"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn watch_url_is_canonical_for_youtube_only() {
        assert_eq!(
            watch_url("https://youtu.be/abc123"),
            "https://www.youtube.com/watch?v=abc123"
        );
        assert_eq!(watch_url("https://cdn.example/v.mp4"), "https://cdn.example/v.mp4");
    }

    #[test]
    fn duration_param_parsing() {
        assert_eq!(duration_param("https://h/p?dur=120"), Some(120.0));
        assert_eq!(duration_param("https://h/p?a=b&dur=61.25&c=d"), Some(61.25));
        assert_eq!(duration_param("https://h/p?xdur=5"), None);
        assert_eq!(duration_param("https://h/p?dur=0"), None);
    }
}
