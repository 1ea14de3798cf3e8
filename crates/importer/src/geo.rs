//! Loader for static administrative boundary files.
//!
//! Boundaries are GeoJSON `FeatureCollection`s whose features carry `osm_id`,
//! `name`, `admin_level` and an optional `parent_id`. They are independent of
//! the import pipeline and never touch the remap table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use temba_migrate_core::SourceId;
use temba_migrate_storage::BoundaryRow;
use temba_migrate_storage::traits::BoundaryStore;

use crate::error::ImportError;

/// Separator between levels of a boundary path.
const PATH_SEPARATOR: &str = " > ";

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    geometry: Option<Value>,
}

/// A feature validated into boundary fields, before its path is known.
#[derive(Debug)]
struct ParsedBoundary {
    osm_id: String,
    name: String,
    level: i32,
    parent_osm_id: Option<String>,
    geometry: Option<Value>,
}

fn id_property(props: &Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(SourceId::from_json).map(|id| id.to_string())
}

fn level_property(props: &Map<String, Value>) -> Option<i32> {
    match props.get("admin_level")? {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_feature(path: &Path, index: usize, feature: Feature) -> Result<ParsedBoundary, ImportError> {
    let invalid = |reason: &str| ImportError::GeoFile {
        path: path.to_path_buf(),
        reason: format!("feature {index}: {reason}"),
    };
    let props = &feature.properties;
    let osm_id = id_property(props, "osm_id").ok_or_else(|| invalid("missing `osm_id`"))?;
    let name = props
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| invalid("missing `name`"))?
        .to_owned();
    let level = level_property(props).ok_or_else(|| invalid("missing or invalid `admin_level`"))?;
    let parent_osm_id = id_property(props, "parent_id");

    Ok(ParsedBoundary {
        osm_id,
        name,
        level,
        parent_osm_id,
        geometry: feature.geometry.filter(|g| !g.is_null()),
    })
}

async fn read_file(path: &Path) -> Result<Vec<ParsedBoundary>, ImportError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Io { path: path.to_path_buf(), source })?;
    let collection: FeatureCollection = serde_json::from_str(&content).map_err(|e| {
        ImportError::GeoFile { path: path.to_path_buf(), reason: e.to_string() }
    })?;
    if collection.kind != "FeatureCollection" {
        return Err(ImportError::GeoFile {
            path: path.to_path_buf(),
            reason: format!("expected a FeatureCollection, found `{}`", collection.kind),
        });
    }

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| parse_feature(path, index, feature))
        .collect()
}

/// Load every boundary in `paths`, parents before children, and return how
/// many were written.
///
/// Files are fully parsed before the first write, so a malformed file leaves
/// the store untouched.
pub async fn import_geo_files(
    store: &dyn BoundaryStore,
    paths: &[PathBuf],
) -> Result<u64, ImportError> {
    let mut boundaries = Vec::new();
    for path in paths {
        let parsed = read_file(path).await?;
        tracing::debug!(path = %path.display(), features = parsed.len(), "boundary file parsed");
        boundaries.extend(parsed);
    }
    boundaries.sort_by_key(|b| b.level);

    let mut paths_by_osm_id: HashMap<String, String> = HashMap::new();
    let mut written: u64 = 0;
    for boundary in boundaries {
        let path = match boundary.parent_osm_id.as_ref().and_then(|p| paths_by_osm_id.get(p)) {
            Some(parent_path) => format!("{parent_path}{PATH_SEPARATOR}{}", boundary.name),
            None => boundary.name.clone(),
        };
        let row = BoundaryRow {
            osm_id: boundary.osm_id,
            name: boundary.name,
            level: boundary.level,
            parent_osm_id: boundary.parent_osm_id,
            path: path.clone(),
            geometry: boundary.geometry,
        };
        store.upsert_boundary(&row).await?;
        paths_by_osm_id.insert(row.osm_id, path);
        written = written.saturating_add(1);
    }

    tracing::info!(files = paths.len(), boundaries = written, "boundaries imported");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use temba_migrate_storage::MemoryStore;
    use tempfile::TempDir;

    use super::*;

    fn feature(osm_id: Value, name: &str, level: Value, parent: Option<&str>) -> Value {
        let mut props = json!({"osm_id": osm_id, "name": name, "admin_level": level});
        if let Some(parent) = parent {
            props["parent_id"] = json!(parent);
        }
        json!({
            "type": "Feature",
            "properties": props,
            "geometry": {"type": "MultiPolygon", "coordinates": []},
        })
    }

    fn write_collection(dir: &TempDir, name: &str, features: Vec<Value>) -> PathBuf {
        let path = dir.path().join(name);
        let body = json!({"type": "FeatureCollection", "features": features});
        fs::write(&path, body.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn children_in_earlier_files_load_after_parents() {
        let dir = TempDir::new().unwrap();
        let districts = write_collection(
            &dir,
            "R171496_2.json",
            vec![feature(json!("R1711131"), "Gatsibo", json!(2), Some("R1711142"))],
        );
        let country = write_collection(
            &dir,
            "R171496_0.json",
            vec![
                feature(json!("R1711142"), "Eastern Province", json!("1"), Some("R171496")),
                feature(json!("R171496"), "Rwanda", json!(0), None),
            ],
        );

        let store = MemoryStore::new();
        let written = import_geo_files(&store, &[districts, country]).await.unwrap();
        assert_eq!(written, 3);

        let (_, district) = store.boundary("R1711131").unwrap();
        assert_eq!(district.path, "Rwanda > Eastern Province > Gatsibo");
        assert_eq!(district.level, 2);
        assert!(district.geometry.is_some());
        assert_eq!(store.boundary("R171496").unwrap().1.parent_osm_id, None);
    }

    #[tokio::test]
    async fn reloading_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let path =
            write_collection(&dir, "country.json", vec![feature(json!(171496), "Rwanda", json!(0), None)]);

        let store = MemoryStore::new();
        import_geo_files(&store, std::slice::from_ref(&path)).await.unwrap();
        let (first_id, _) = store.boundary("171496").unwrap();
        import_geo_files(&store, &[path]).await.unwrap();
        assert_eq!(store.boundary("171496").unwrap().0, first_id);
    }

    #[tokio::test]
    async fn missing_osm_id_is_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let path = write_collection(
            &dir,
            "broken.json",
            vec![
                feature(json!("R1"), "Rwanda", json!(0), None),
                json!({"type": "Feature", "properties": {"name": "Nowhere", "admin_level": 1}}),
            ],
        );

        let store = MemoryStore::new();
        let err = import_geo_files(&store, &[path]).await.unwrap_err();
        assert!(matches!(err, ImportError::GeoFile { .. }));
        assert!(err.to_string().contains("feature 1: missing `osm_id`"));
        assert!(store.boundary("R1").is_none());
    }

    #[tokio::test]
    async fn non_collection_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feature.json");
        fs::write(&path, json!({"type": "Feature", "properties": {}}).to_string()).unwrap();

        let err = import_geo_files(&MemoryStore::new(), &[path]).await.unwrap_err();
        assert!(err.to_string().contains("expected a FeatureCollection"));
    }

    #[tokio::test]
    async fn unreadable_file_reports_its_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let err = import_geo_files(&MemoryStore::new(), &[path]).await.unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
        assert!(err.to_string().contains("missing.json"));
    }
}
