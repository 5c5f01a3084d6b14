use serde::{Deserializer, Serializer, de::Visitor};
use std::time::Duration;

/// Deserialize a duration from a string like "2m", "5s" or "500ms".
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

struct DurationVisitor;
impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a duration like \"5s\" or a number of seconds")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        parse(v).map_err(serde::de::Error::custom)
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Duration::from_secs(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u64::try_from(v)
            .map(Duration::from_secs)
            .map_err(|_| serde::de::Error::custom(format!("negative duration {v}")))
    }
}

/// Serialize a duration into a string like "1s" or "500ms".
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(duration))
}

/// Parses duration from String
pub fn parse(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let value: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: u64 = value
        .parse()
        .map_err(|_| format!("Invalid number in duration: {s}"))?;
    let unit_part = s.trim_start_matches(|c: char| c.is_ascii_digit()).trim();

    let supported_units: &[(&'static str, fn(u64) -> Duration)] = &[
        ("ns", Duration::from_nanos),
        ("us", Duration::from_micros),
        ("µs", Duration::from_micros),
        ("ms", Duration::from_millis),
        ("s", Duration::from_secs),
        ("m", from_mins),
    ];
    for (u, f) in supported_units {
        if *u == unit_part {
            return Ok(f(value));
        }
    }
    let supported_units = supported_units
        .iter()
        .map(|(k, _)| *k)
        .collect::<Vec<_>>()
        .join(", ");
    Err(format!(
        "Unknown duration unit '{unit_part}' only '{supported_units}' are supported",
    ))
}

fn from_mins(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

fn format_duration(duration: &Duration) -> String {
    if duration.as_nanos() % 1_000_000 == 0 {
        let ms = duration.as_millis();
        if ms % 1000 == 0 {
            format!("{}s", ms / 1000)
        } else {
            format!("{ms}ms")
        }
    } else {
        format!("{}ns", duration.as_nanos())
    }
}
