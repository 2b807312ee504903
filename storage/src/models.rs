use bson::oid::ObjectId;
use relief_core::{Grid2D, GridError};
use serde::{Deserialize, Serialize};

// Generation/simulation settings stored next to the field so a run can be
// reproduced later. Optional fields only apply to some generators.
#[derive(Debug, Serialize, Deserialize)]
pub struct TerrainParams {
    pub generator: String, // e.g. "diamond_square", "perlin2d", "voronoi2d"
    pub iterations: Option<u32>,
    pub height: Option<f32>,
    pub persistence: Option<f32>,
    pub scale: Option<f64>,
    pub n_points: Option<u32>,
    pub erosion_iterations: Option<u32>,
    pub talus_angle: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TerrainDoc2D {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub name: String,
    pub seed: i64,
    pub params: TerrainParams,
    // the field itself, stored verbatim: side length plus the flattened
    // row-major buffer of length size * size
    pub size: u32,
    pub height_map: Vec<f32>,
    pub dimensions: u8, // always 2 here
}

impl TerrainDoc2D {
    // Snapshot a finished field into a storable document.
    pub fn from_grid(name: &str, seed: i64, params: TerrainParams, grid: &Grid2D) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            seed,
            params,
            size: grid.size() as u32,
            height_map: grid.to_buffer(),
            dimensions: 2,
        }
    }

    // Rebuild the field; fails on corrupt documents whose buffer does not
    // match the recorded size.
    pub fn to_grid(&self) -> Result<Grid2D, GridError> {
        Grid2D::from_flat(self.height_map.clone(), self.size as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::{TerrainDoc2D, TerrainParams};
    use relief_core::Grid2D;

    fn params() -> TerrainParams {
        TerrainParams {
            generator: "diamond_square".to_string(),
            iterations: Some(5),
            height: Some(100.0),
            persistence: Some(0.5),
            scale: None,
            n_points: None,
            erosion_iterations: None,
            talus_angle: None,
        }
    }

    #[test]
    fn doc_roundtrips_through_grid() {
        let grid = Grid2D::linear(9);
        let doc = TerrainDoc2D::from_grid("ramp", 42, params(), &grid);
        assert_eq!(doc.size, 9);
        assert_eq!(doc.height_map.len(), 81);
        assert_eq!(doc.to_grid().unwrap(), grid);
    }

    #[test]
    fn doc_rejects_corrupt_buffer() {
        let grid = Grid2D::linear(4);
        let mut doc = TerrainDoc2D::from_grid("bad", 1, params(), &grid);
        doc.height_map.pop();
        assert!(doc.to_grid().is_err());
    }
}
