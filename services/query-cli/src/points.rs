//! Points file parsing.
//!
//! Two layouts are accepted:
//!
//! ```json
//! {"locations": [[100, 200, 5], [101, 200, 5]]}
//! {"x": [100, 101], "y": [200, 200], "z": [5, 5]}
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use volume_common::QueryPoint;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointsFile {
    Locations { locations: Vec<[f64; 3]> },
    Columns { x: Vec<f64>, y: Vec<f64>, z: Vec<f64> },
}

/// Parse points from a JSON document.
pub fn parse_points(content: &str) -> Result<Vec<QueryPoint>> {
    let file: PointsFile = serde_json::from_str(content)
        .context("points must be {\"locations\": [[x, y, z], ...]} or {\"x\": [...], \"y\": [...], \"z\": [...]}")?;

    match file {
        PointsFile::Locations { locations } => {
            Ok(locations.into_iter().map(QueryPoint::from).collect())
        }
        PointsFile::Columns { x, y, z } => {
            if x.len() != y.len() || x.len() != z.len() {
                bail!(
                    "coordinate columns differ in length: x={}, y={}, z={}",
                    x.len(),
                    y.len(),
                    z.len()
                );
            }
            Ok(x.into_iter()
                .zip(y)
                .zip(z)
                .map(|((x, y), z)| QueryPoint::new(x, y, z))
                .collect())
        }
    }
}

/// Read and parse a points file.
pub fn read_points_file(path: &Path) -> Result<Vec<QueryPoint>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read points file: {}", path.display()))?;
    let points = parse_points(&content)
        .with_context(|| format!("Failed to parse points file: {}", path.display()))?;

    tracing::debug!(path = %path.display(), points = points.len(), "Loaded points");
    Ok(points)
}
