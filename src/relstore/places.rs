use super::{Place, PlaceType, RelStore};
use anyhow::Context;

impl RelStore {
    pub async fn find_place(
        &self,
        normalized_name: &str,
        place_type: Option<PlaceType>,
        country: Option<&str>,
    ) -> anyhow::Result<Option<i64>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let row = client
            .query_opt(
                "SELECT place_id FROM places \
                 WHERE name = $1 \
                 AND ($2::text IS NULL OR place_type = $2) \
                 AND ($3::text IS NULL OR country = $3) \
                 LIMIT 1",
                &[
                    &normalized_name,
                    &place_type.map(|t| t.as_str()),
                    &country,
                ],
            )
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_place(
        &self,
        normalized_name: &str,
        place_type: PlaceType,
        country: Option<&str>,
        province: Option<&str>,
        center: (f64, f64),
        boundary_wkt: Option<&str>,
        geohash: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<i64> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let (lat, lon) = center;
        let row = client
            .query_one(
                "INSERT INTO places \
                 (name, place_type, country, province, center_geom, boundary_geom, geohash, metadata) \
                 VALUES ($1, $2, $3, $4, ST_SetSRID(ST_MakePoint($6, $5), 4326), \
                         CASE WHEN $7::text IS NULL THEN NULL ELSE ST_SetSRID(ST_GeomFromText($7), 4326) END, \
                         $8, $9) \
                 ON CONFLICT (name, place_type, province) DO UPDATE SET \
                   center_geom = EXCLUDED.center_geom, \
                   boundary_geom = COALESCE(EXCLUDED.boundary_geom, places.boundary_geom), \
                   geohash = EXCLUDED.geohash, \
                   metadata = EXCLUDED.metadata \
                 RETURNING place_id",
                &[
                    &normalized_name,
                    &place_type.as_str(),
                    &country,
                    &province,
                    &lat,
                    &lon,
                    &boundary_wkt,
                    &geohash,
                    &metadata,
                ],
            )
            .await?;
        Ok(row.get(0))
    }

    /// `ST_Contains` lookup used by PlaceAlerts.
    pub async fn places_containing(
        &self,
        lat: f64,
        lon: f64,
    ) -> anyhow::Result<Vec<(i64, String, String, Option<String>)>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let rows = client
            .query(
                "SELECT place_id, name, place_type, province FROM places \
                 WHERE boundary_geom IS NOT NULL \
                 AND ST_Contains(boundary_geom, ST_SetSRID(ST_MakePoint($2, $1), 4326))",
                &[&lat, &lon],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get(0), r.get(1), r.get(2), r.get(3)))
            .collect())
    }

    pub async fn get_place(&self, place_id: i64) -> anyhow::Result<Option<Place>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let row = client
            .query_opt(
                "SELECT place_id, name, place_type, country, province, \
                        ST_Y(center_geom) AS lat, ST_X(center_geom) AS lon, \
                        ST_AsText(boundary_geom), geohash, metadata \
                 FROM places WHERE place_id = $1",
                &[&place_id],
            )
            .await?;
        let Some(row) = row else { return Ok(None) };
        let place_type_str: String = row.get(2);
        let place_type = match place_type_str.as_str() {
            "city" => PlaceType::City,
            "town" => PlaceType::Town,
            "village" => PlaceType::Village,
            "hamlet" => PlaceType::Hamlet,
            "suburb" => PlaceType::Suburb,
            _ => PlaceType::Region,
        };
        Ok(Some(Place {
            place_id: row.get(0),
            name: row.get(1),
            place_type,
            country: row.get(3),
            province: row.get(4),
            center: (row.get(5), row.get(6)),
            boundary_wkt: row.get(7),
            geohash: row.get(8),
            metadata: row.get(9),
        }))
    }
}
