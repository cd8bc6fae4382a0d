//! H3 hexagonal cell indexing, via the `h3o` crate.

use h3o::{CellIndex, LatLng, Resolution};

pub const DEFAULT_RESOLUTION: u8 = 7;

fn resolution(res: u8) -> Resolution {
    Resolution::try_from(res).unwrap_or(Resolution::Seven)
}

/// H3 cell index for (lat, lon) at the given resolution, as its string
/// form. Empty string on invalid input.
pub fn cell(lat: f64, lon: f64, res: u8) -> String {
    match LatLng::new(lat, lon) {
        Ok(ll) => ll.to_cell(resolution(res)).to_string(),
        Err(_) => String::new(),
    }
}

pub fn cell_index(lat: f64, lon: f64, res: u8) -> Option<CellIndex> {
    LatLng::new(lat, lon).ok().map(|ll| ll.to_cell(resolution(res)))
}

/// Neighboring cells within `ring` grid steps, for fallback lookup when a
/// coordinate sits near a cell boundary. Excludes the center cell.
pub fn neighbors(cell_str: &str, ring: u32) -> Vec<String> {
    let Ok(idx) = cell_str.parse::<CellIndex>() else {
        return Vec::new();
    };
    idx.grid_disk::<Vec<_>>(ring)
        .into_iter()
        .filter(|c| *c != idx)
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_stable_for_same_point() {
        let a = cell(35.6892, 51.3890, 7);
        let b = cell(35.6892, 51.3890, 7);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn invalid_coordinates_return_empty() {
        assert_eq!(cell(200.0, 10.0, 7), "");
    }

    #[test]
    fn neighbors_excludes_center() {
        let c = cell(35.6892, 51.3890, 7);
        let ns = neighbors(&c, 1);
        assert!(!ns.contains(&c));
        assert!(!ns.is_empty());
    }
}
