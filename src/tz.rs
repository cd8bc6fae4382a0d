//! Timezone lookup
//!
//! Coordinate→timezone mapping is a pure `tz_of(lat, lon) -> Tz` seam
//! behind the `TzResolver` trait, since a real geo-timezone-polygon
//! dataset is a separate concern from routing. The default
//! implementation approximates the zone from longitude (15° per hour of
//! offset) rather than a true polygon lookup, while still returning a
//! real `chrono_tz::Tz` so the rest of the system reasons in proper
//! timezone arithmetic.

use chrono_tz::Tz;

pub trait TzResolver: Send + Sync {
    fn tz_of(&self, lat: f64, lon: f64) -> Tz;
}

/// Longitude-banded approximation: one hour per 15 degrees, clamped to
/// the 24 fixed-offset `Etc/GMT` zones. Good enough for TTL bucketing;
/// not a substitute for a real boundary dataset.
pub struct ApproximateTzResolver;

impl TzResolver for ApproximateTzResolver {
    fn tz_of(&self, _lat: f64, lon: f64) -> Tz {
        let offset_hours = (lon / 15.0).round() as i32;
        let clamped = offset_hours.clamp(-12, 12);
        offset_to_etc_gmt(clamped)
    }
}

fn offset_to_etc_gmt(offset_hours: i32) -> Tz {
    // `Etc/GMT` zones use POSIX sign convention: west of Greenwich is
    // positive. Our offset is conventional (east positive), so negate.
    let posix = -offset_hours;
    match posix {
        0 => Tz::Etc__GMT,
        1 => Tz::Etc__GMTPlus1,
        2 => Tz::Etc__GMTPlus2,
        3 => Tz::Etc__GMTPlus3,
        4 => Tz::Etc__GMTPlus4,
        5 => Tz::Etc__GMTPlus5,
        6 => Tz::Etc__GMTPlus6,
        7 => Tz::Etc__GMTPlus7,
        8 => Tz::Etc__GMTPlus8,
        9 => Tz::Etc__GMTPlus9,
        10 => Tz::Etc__GMTPlus10,
        11 => Tz::Etc__GMTPlus11,
        12 => Tz::Etc__GMTPlus12,
        -1 => Tz::Etc__GMTMinus1,
        -2 => Tz::Etc__GMTMinus2,
        -3 => Tz::Etc__GMTMinus3,
        -4 => Tz::Etc__GMTMinus4,
        -5 => Tz::Etc__GMTMinus5,
        -6 => Tz::Etc__GMTMinus6,
        -7 => Tz::Etc__GMTMinus7,
        -8 => Tz::Etc__GMTMinus8,
        -9 => Tz::Etc__GMTMinus9,
        -10 => Tz::Etc__GMTMinus10,
        -11 => Tz::Etc__GMTMinus11,
        -12 => Tz::Etc__GMTMinus12,
        -13 => Tz::Etc__GMTMinus13,
        -14 => Tz::Etc__GMTMinus14,
        _ => Tz::UTC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tehran_longitude_resolves_east_of_utc() {
        let resolver = ApproximateTzResolver;
        let tz = resolver.tz_of(35.6892, 51.3890);
        assert_eq!(tz, Tz::Etc__GMTMinus3);
    }

    #[test]
    fn prime_meridian_resolves_to_utc() {
        let resolver = ApproximateTzResolver;
        assert_eq!(resolver.tz_of(51.5, 0.0), Tz::Etc__GMT);
    }
}
