use relief_core::{DiamondSquare2D, ThermalErosion2D, ThermalParams};
use relief_storage::Storage2D;
use relief_storage::models::{TerrainDoc2D, TerrainParams};
use tokio::runtime::Builder;

#[test]
#[ignore = "needs a running MongoDB at localhost:27017"]
fn test_roundtrip_2d() {
    // Build a single-threaded Tokio runtime
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime");

    rt.block_on(async {
        // Generate a small field and run a few erosion steps over it
        let terrain = DiamondSquare2D::new(42, 6, 100.0, 0.5).generate();
        let soil = relief_core::Grid2D::ones(terrain.size()).mul_scalar(0.5);
        let eroded = ThermalErosion2D::new(ThermalParams {
            talus_angle: 0.1,
            pipe_area: 1.0,
            pipe_length: 1.0,
            dt: 0.02,
            cycles_per_iteration: 1,
        })
        .simulate(&terrain, &soil, 3)
        .expect("valid parameters")
        .last()
        .expect("three snapshots");

        let params = TerrainParams {
            generator: "diamond_square".to_string(),
            iterations: Some(6),
            height: Some(100.0),
            persistence: Some(0.5),
            scale: None,
            n_points: None,
            erosion_iterations: Some(3),
            talus_angle: Some(0.1),
        };
        let doc = TerrainDoc2D::from_grid("roundtrip", 42, params, &eroded.soil);
        let size = doc.size as usize;

        // Initialize storage (MongoDB must be running)
        let storage = Storage2D::init("mongodb://localhost:27017", "terrain_db", "terrain2d")
            .await
            .expect("storage init failed");

        // Insert, read back, assert
        let original = eroded.soil.clone();
        storage.create(doc).await.expect("create failed");
        let found = storage
            .read_by_seed(42)
            .await
            .expect("read failed")
            .expect("doc not found");

        assert_eq!(found.height_map.len(), size * size);
        assert_eq!(found.to_grid().expect("square document"), original);

        // Clean up
        storage.delete_by_seed(42).await.expect("delete failed");
    });
}
