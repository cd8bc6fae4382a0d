//! Geohash encode/decode/neighbors.
//!
//! Neighbor search is approximate rather than true bit-interleaving
//! adjacency: decode to a centroid, step by a precision-dependent delta
//! in degrees, and re-encode. Good enough for the candidate-hash
//! prefilter this feeds.

const ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

pub const PRECISION_NODE: usize = 7;
pub const PRECISION_PLACE: usize = 6;
pub const PRECISION_CACHE: usize = 5;

/// Encode a coordinate to a geohash of the given precision. Returns an
/// empty string on NaN/out-of-range input rather than erroring.
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    if precision == 0 || !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon)
    {
        return String::new();
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut is_lon = true;
    let mut bit = 0u8;
    let mut ch = 0u8;
    let mut out = String::with_capacity(precision);

    while out.len() < precision {
        if is_lon {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch |= 1 << (4 - bit);
                lon_range.0 = mid;
            } else {
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch |= 1 << (4 - bit);
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }
        }
        is_lon = !is_lon;

        if bit < 4 {
            bit += 1;
        } else {
            out.push(ALPHABET[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    out
}

/// Decode a geohash to its cell centroid. Returns `(0.0, 0.0)` for an
/// invalid geohash.
pub fn decode(geohash: &str) -> (f64, f64) {
    if !validate(geohash) {
        return (0.0, 0.0);
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut is_lon = true;

    for c in geohash.chars() {
        let idx = match ALPHABET.iter().position(|&b| b == c as u8) {
            Some(i) => i,
            None => return (0.0, 0.0),
        };
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if is_lon {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            is_lon = !is_lon;
        }
    }

    (
        (lat_range.0 + lat_range.1) / 2.0,
        (lon_range.0 + lon_range.1) / 2.0,
    )
}

fn delta_for_precision(precision: usize) -> f64 {
    match precision {
        5 => 0.022,
        6 => 0.0055,
        7 => 0.00068,
        8 => 0.000085,
        _ => 0.001,
    }
}

/// Up to 8 neighboring cells at the same precision, self excluded,
/// deduplicated.
pub fn neighbors(geohash: &str) -> Vec<String> {
    if !validate(geohash) || geohash.is_empty() {
        return Vec::new();
    }

    let (lat, lon) = decode(geohash);
    let precision = geohash.len();
    let delta = delta_for_precision(precision);

    let offsets = [
        (delta, 0.0),
        (-delta, 0.0),
        (0.0, delta),
        (0.0, -delta),
        (delta, delta),
        (-delta, delta),
        (delta, -delta),
        (-delta, -delta),
    ];

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (dlon, dlat) in offsets {
        let candidate = encode(lat + dlat, lon + dlon, precision);
        if candidate.is_empty() || candidate == geohash {
            continue;
        }
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

/// 1 or up to 9 candidate hashes for a proximity prefilter: the center
/// hash plus its neighbors.
pub fn candidate_hashes(lat: f64, lon: f64, precision: usize, with_neighbors: bool) -> Vec<String> {
    let center = encode(lat, lon, precision);
    if center.is_empty() {
        return Vec::new();
    }
    if !with_neighbors {
        return vec![center];
    }

    let mut out = vec![center.clone()];
    out.extend(neighbors(&center));
    out
}

pub fn get_prefix(geohash: &str, prefix_length: usize) -> String {
    if geohash.is_empty() || prefix_length == 0 {
        return String::new();
    }
    geohash.chars().take(prefix_length).collect()
}

pub fn validate(geohash: &str) -> bool {
    if geohash.is_empty() {
        return false;
    }
    geohash
        .chars()
        .all(|c| ALPHABET.contains(&(c.to_ascii_lowercase() as u8)))
}

pub fn batch_encode(coordinates: &[(f64, f64)], precision: usize) -> Vec<String> {
    coordinates
        .iter()
        .map(|&(lat, lon)| encode(lat, lon, precision))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_same_precision() {
        let hash = encode(35.6892, 51.3890, 7);
        assert_eq!(hash.len(), 7);
        let hash2 = encode(35.6892, 51.3890, 7);
        assert_eq!(hash, hash2);
    }

    #[test]
    fn invalid_coordinates_return_empty() {
        assert_eq!(encode(f64::NAN, 10.0, 7), "");
        assert_eq!(encode(200.0, 10.0, 7), "");
    }

    #[test]
    fn candidate_hashes_includes_center_and_at_most_nine() {
        let hashes = candidate_hashes(35.6892, 51.3890, 7, true);
        let center = encode(35.6892, 51.3890, 7);
        assert!(hashes.contains(&center));
        assert!(hashes.len() <= 9);
    }

    #[test]
    fn neighbors_excludes_self() {
        let center = encode(35.6892, 51.3890, 7);
        let ns = neighbors(&center);
        assert!(!ns.contains(&center));
    }

    #[test]
    fn validate_rejects_excluded_letters() {
        assert!(!validate("tw3ail4"));
        assert!(validate("tw3vvk4"));
    }

    #[test]
    fn prefix_truncates() {
        assert_eq!(get_prefix("tw3vvk4", 4), "tw3v");
        assert_eq!(get_prefix("tw3vvk4", 20), "tw3vvk4");
    }
}
