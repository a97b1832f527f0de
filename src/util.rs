use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use std::io;
use std::time::{Duration, SystemTime};

/// Stored form of every timestamp column: ISO-8601, local time, microseconds.
/// Fixed width so lexical order in SQL matches chronological order.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Microsecond stamp used for snapshot ids and backup file names.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Second-resolution stamp used for pre-restore safety copies and export file names.
pub const SECOND_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Local wall-clock time truncated to what the stored format can hold.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

pub fn to_iso(ts: &NaiveDateTime) -> String {
    ts.format(ISO_FORMAT).to_string()
}

/// Parses the timestamp shapes found in the wild: our own fixed format,
/// isoformat without fraction, sqlite's CURRENT_TIMESTAMP and RFC 3339.
pub fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

pub fn file_stamp(ts: &NaiveDateTime) -> String {
    ts.format(FILE_STAMP_FORMAT).to_string()
}

pub fn second_stamp(ts: &NaiveDateTime) -> String {
    ts.format(SECOND_STAMP_FORMAT).to_string()
}

const MAX_STAMP_ATTEMPTS: usize = 1000;

/// Claims a fresh microsecond stamp. `claim` must fail with `AlreadyExists`
/// when the stamp is taken (e.g. `create_dir`, `create_new`); the stamp is
/// then advanced by one microsecond so names stay in chronological order.
pub fn reserve_stamp<T>(
    mut claim: impl FnMut(&str) -> io::Result<T>,
) -> io::Result<(String, T)> {
    let mut ts = now();
    for _ in 0..MAX_STAMP_ATTEMPTS {
        let stamp = file_stamp(&ts);
        match claim(&stamp) {
            Ok(value) => return Ok((stamp, value)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                ts = ts + chrono::Duration::microseconds(1);
            }
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free timestamp slot for new backup",
    ))
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// "3h 12m ago" style age, truncated to whole seconds.
pub fn format_age(then: SystemTime) -> String {
    match SystemTime::now().duration_since(then) {
        Ok(elapsed) if elapsed.as_secs() == 0 => "just now".to_string(),
        Ok(elapsed) => {
            let secs = elapsed.as_secs();
            // drop the seconds once the age is past an hour, they are noise
            let rounded = if secs >= 3600 { secs - secs % 60 } else { secs };
            format!("{} ago", humantime::format_duration(Duration::from_secs(rounded)))
        }
        Err(_) => "in the future".to_string(),
    }
}

/// Serde adapter for `NaiveDateTime` fields stored as ISO-8601 strings.
pub mod iso_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    /// Same adapter for nullable fields.
    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&crate::util::to_iso(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => crate::util::parse_iso(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_micro_opt(7, 5, 2, 42))
            .unwrap()
    }

    #[test]
    fn iso_is_fixed_width() {
        assert_eq!(to_iso(&sample()), "2024-03-09T07:05:02.000042");
    }

    #[test]
    fn parse_accepts_common_shapes() {
        assert_eq!(parse_iso("2024-03-09T07:05:02.000042"), Some(sample()));
        assert!(parse_iso("2024-03-09T07:05:02").is_some());
        assert!(parse_iso("2024-03-09 07:05:02").is_some());
        assert!(parse_iso("2024-03-09T07:05:02+00:00").is_some());
        assert!(parse_iso("yesterday").is_none());
    }

    #[test]
    fn stamps_sort_chronologically() {
        assert_eq!(file_stamp(&sample()), "20240309_070502_000042");
        assert_eq!(second_stamp(&sample()), "20240309_070502");
    }

    #[test]
    fn reserve_stamp_skips_taken_slots() {
        let mut taken = 0;
        let (stamp, attempts) = reserve_stamp(|_| {
            taken += 1;
            if taken < 3 {
                Err(io::Error::new(io::ErrorKind::AlreadyExists, "taken"))
            } else {
                Ok(taken)
            }
        })
        .unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(stamp.len(), "20240309_070502_000042".len());
    }

    #[test]
    fn reserve_stamp_propagates_other_errors() {
        let err = reserve_stamp(|_| -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "no"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
