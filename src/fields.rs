//! Structured log fields.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};

/// A single field value.
///
/// Kept to a small closed set so every sink serializes it the same way.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    /// Rendered as RFC 3339 with second precision.
    Time(DateTime<Utc>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Time(t) => f.write_str(&rfc3339(t)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::Str(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::Str(s) }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self { Self::Uint(n) }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self { Self::Uint(n.into()) }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Self::Float(n) }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self { Self::Time(t) }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Uint(n) => serde_json::Value::from(*n),
            // NaN and infinities have no JSON form and become null.
            Value::Float(n) => serde_json::Value::from(*n),
            Value::Time(t) => serde_json::Value::String(rfc3339(t)),
        }
    }
}

/// An ordered set of named values.
///
/// Keys are unique: [`insert`](Fields::insert) on an existing key replaces
/// the value in place, keeping its position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new() -> Self { Self(Vec::new()) }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Fields::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool { self.get(key).is_some() }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Inserts every entry of `other`, overwriting keys already present.
    pub fn extend(&mut self, other: &Fields) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// logfmt rendering: `key=value key="quoted value"`.
impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}=")?;
            write_logfmt_value(f, &v.to_string())?;
        }
        Ok(())
    }
}

/// Writes `value` bare when it only contains "safe" characters, otherwise
/// double-quoted with `"` and `\` escaped.
pub(crate) fn write_logfmt_value(w: &mut impl fmt::Write, value: &str) -> fmt::Result {
    if !value.is_empty() && value.chars().all(is_bare) {
        return w.write_str(value);
    }
    w.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => w.write_str("\\\"")?,
            '\\' => w.write_str("\\\\")?,
            '\n' => w.write_str("\\n")?,
            c => w.write_char(c)?,
        }
    }
    w.write_char('"')
}

fn is_bare(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+')
}

pub(crate) fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human-readable duration: `0s`, `850ns`, `48.211µs`, `1.5ms`, `1m2.5s`,
/// `1h0m0s`. Sub-second values use the largest unit that keeps the integer
/// part non-zero; longer ones are split into hours, minutes, and seconds.
pub fn human_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    match ns {
        0 => "0s".to_owned(),
        1..=999 => format!("{ns}ns"),
        1_000..=999_999 => scaled(ns, 1_000, "µs"),
        1_000_000..=999_999_999 => scaled(ns, 1_000_000, "ms"),
        _ => {
            let secs = d.as_secs();
            let (h, m) = (secs / 3600, secs / 60 % 60);
            let mut out = String::new();
            if h > 0 {
                out.push_str(&format!("{h}h"));
            }
            if h > 0 || m > 0 {
                out.push_str(&format!("{m}m"));
            }
            let rem = u128::from(secs % 60) * 1_000_000_000 + u128::from(d.subsec_nanos());
            out.push_str(&scaled(rem, 1_000_000_000, "s"));
            out
        }
    }
}

/// `value / unit` with the fraction printed exactly, trailing zeros dropped.
fn scaled(value: u128, unit: u128, suffix: &str) -> String {
    let (whole, frac) = (value / unit, value % unit);
    if frac == 0 {
        return format!("{whole}{suffix}");
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}{suffix}", digits.trim_end_matches('0'))
}

// ── Timestamp ─────────────────────────────────────────────────────────────────

/// A point in time read from both clocks at once.
///
/// The wall-clock half is what gets printed; the monotonic half is what
/// latencies are computed from, so a clock adjustment mid-request cannot
/// produce a negative or inflated duration.
#[derive(Clone, Copy, Debug)]
pub struct Timestamp {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Timestamp {
    pub fn now() -> Self {
        Self { wall: Utc::now(), mono: Instant::now() }
    }

    pub fn wall(&self) -> DateTime<Utc> { self.wall }

    pub fn instant(&self) -> Instant { self.mono }

    /// RFC 3339, second precision, UTC (`2026-10-16T09:30:00Z`).
    pub fn rfc3339(&self) -> String { rfc3339(&self.wall) }

    /// Monotonic time elapsed since `earlier`; zero if `earlier` is later.
    pub fn duration_since(&self, earlier: &Timestamp) -> Duration {
        self.mono.saturating_duration_since(earlier.mono)
    }
}
