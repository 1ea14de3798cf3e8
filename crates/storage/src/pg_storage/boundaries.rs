//! BoundaryStore implementation for PgStore.

use async_trait::async_trait;

use super::{PgStore, row_to_upserted};
use crate::error::StorageError;
use crate::traits::BoundaryStore;
use crate::types::{BoundaryRow, Upserted};

#[async_trait]
impl BoundaryStore for PgStore {
    async fn upsert_boundary(&self, boundary: &BoundaryRow) -> Result<Upserted, StorageError> {
        let mut tx = self.pool.begin().await?;
        let parent_id = match &boundary.parent_osm_id {
            Some(parent) => Some(
                sqlx::query_scalar::<_, i64>("SELECT id FROM locations_adminboundary WHERE osm_id = $1")
                    .bind(parent)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| StorageError::ForeignKey {
                        target: "admin boundary".to_owned(),
                        id: parent.clone(),
                    })?,
            ),
            None => None,
        };
        let geometry = boundary.geometry.as_ref().map(serde_json::Value::to_string);
        let row = sqlx::query(
            "INSERT INTO locations_adminboundary (osm_id, name, level, parent_id, path, simplified_geometry)
             VALUES ($1, $2, $3, $4, $5, ST_GeomFromGeoJSON($6::text))
             ON CONFLICT (osm_id) DO UPDATE SET
               name = EXCLUDED.name,
               level = EXCLUDED.level,
               parent_id = EXCLUDED.parent_id,
               path = EXCLUDED.path,
               simplified_geometry = COALESCE(EXCLUDED.simplified_geometry, locations_adminboundary.simplified_geometry)
             RETURNING id, (xmax = 0) AS inserted",
        )
        .bind(&boundary.osm_id)
        .bind(&boundary.name)
        .bind(boundary.level)
        .bind(parent_id)
        .bind(&boundary.path)
        .bind(geometry)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        row_to_upserted(&row)
    }
}
