//! End-to-end lookup tests against Zarr volumes written to a temp directory.

use std::path::Path;
use std::sync::Arc;

use point_query::testdata::{label_at, write_label_pyramid, write_volume};
use point_query::{
    GridCoordinate, MemoryStoreOpener, MemoryVolume, PointQueryConfig, PointQueryEngine,
    PointQueryError, QueryPoint, Region, StoreOpener, ZarrStoreOpener,
};
use volume_common::{
    DatasetDescriptor, DatasetRegistry, DescriptorProvider, ElementType, Service, StorageKind,
    StoreLocation,
};

use test_utils::fixtures::{registries, shapes};
use test_utils::{out_of_bounds_points, random_points, shuffled_indices, temp_data_root};

fn write_fixtures(root: &Path) {
    write_label_pyramid(
        &root.join("labels"),
        shapes::LABELS,
        shapes::LABELS_CHUNK,
        &[0, 1],
    )
    .expect("Failed to write label pyramid");
}

fn zarr_engine(root: &Path, workers: usize) -> (PointQueryEngine, Arc<DatasetRegistry>) {
    let registry = Arc::new(
        DatasetRegistry::from_yaml_str(registries::SEGMENTATION_AND_FIELD)
            .expect("Failed to parse registry"),
    );
    let config = PointQueryConfig {
        max_workers: workers,
        data_root: root.to_path_buf(),
        ..Default::default()
    };
    let engine = PointQueryEngine::new(
        config,
        registry.clone(),
        Arc::new(ZarrStoreOpener::new(root)),
    )
    .expect("Failed to build engine");
    (engine, registry)
}

fn to_points(raw: &[[f64; 3]]) -> Vec<QueryPoint> {
    raw.iter().map(|p| QueryPoint::from(*p)).collect()
}

#[test]
fn test_batched_lookup_matches_single_point_reads() {
    let dir = temp_data_root();
    write_fixtures(dir.path());
    let (engine, registry) = zarr_engine(dir.path(), 4);

    // Extent overshoots the volume so some points fall outside.
    let points = to_points(&random_points(400, [48.0, 40.0, 14.0], 42));
    let result = engine.lookup("labels", 0, &points).unwrap();
    let values = result.values::<u64>().unwrap();
    assert_eq!(values.len(), points.len());

    let descriptor = registry.describe("labels").unwrap();
    let opener = ZarrStoreOpener::new(dir.path());
    let mut store = opener.open(&descriptor, 0).unwrap();
    let domain = store.domain();

    for (point, value) in points.iter().zip(&values) {
        let coord = GridCoordinate::new(
            point.x.floor() as i64,
            point.y.floor() as i64,
            point.z.floor() as i64,
        );
        if domain.contains(&coord) {
            let data = store.read_region(&Region::new(coord.0, [1, 1, 1])).unwrap();
            let single: Vec<u64> = bytemuck::pod_collect_to_vec(&data.bytes);
            assert_eq!(*value, single[0], "mismatch at {:?}", point);
            assert_eq!(
                *value,
                label_at([coord.0[0] as u64, coord.0[1] as u64, coord.0[2] as u64])
            );
        } else {
            assert_eq!(*value, 0, "out-of-domain point {:?} not sentinel", point);
        }
    }
}

#[test]
fn test_lookup_at_downsampled_scale() {
    let dir = temp_data_root();
    write_fixtures(dir.path());
    let (engine, _) = zarr_engine(dir.path(), 2);

    let points = to_points(&[[10.0, 7.0, 3.0], [39.0, 35.0, 11.0], [40.0, 0.0, 0.0]]);
    let result = engine.lookup("labels", 1, &points).unwrap();

    // Scale 1 halves x and y; values carry a +1 scale offset.
    assert_eq!(
        result.values::<u64>().unwrap(),
        vec![label_at([5, 3, 3]) + 1, label_at([19, 17, 11]) + 1, 0]
    );
}

#[test]
fn test_out_of_domain_points_get_sentinel() {
    let dir = temp_data_root();
    write_fixtures(dir.path());
    let (engine, _) = zarr_engine(dir.path(), 2);

    let extent = [
        shapes::LABELS[0] as f64,
        shapes::LABELS[1] as f64,
        shapes::LABELS[2] as f64,
    ];
    let mut raw = out_of_bounds_points(extent);
    raw.insert(3, [1.0, 2.0, 3.0]);
    raw.push([39.5, 35.5, 11.5]);

    let result = engine.lookup("labels", 0, &to_points(&raw)).unwrap();
    let values = result.values::<u64>().unwrap();

    assert_eq!(values.len(), raw.len());
    assert_eq!(values[3], label_at([1, 2, 3]));
    assert_eq!(values[raw.len() - 1], label_at([39, 35, 11]));
    for (i, value) in values.iter().enumerate() {
        if i != 3 && i != raw.len() - 1 {
            assert_eq!(*value, 0, "slot {} should hold the sentinel", i);
        }
    }
}

#[test]
fn test_shuffled_input_gives_matching_permutation() {
    let dir = temp_data_root();
    write_fixtures(dir.path());
    let (engine, _) = zarr_engine(dir.path(), 3);

    let points = to_points(&random_points(300, [44.0, 38.0, 12.0], 9));
    let baseline = engine.lookup("labels", 0, &points).unwrap();
    let baseline = baseline.values::<u64>().unwrap();

    let order = shuffled_indices(points.len(), 1234);
    let shuffled: Vec<QueryPoint> = order.iter().map(|&i| points[i]).collect();
    let result = engine.lookup("labels", 0, &shuffled).unwrap();
    let values = result.values::<u64>().unwrap();

    for (slot, &original) in order.iter().enumerate() {
        assert_eq!(values[slot], baseline[original]);
    }
}

#[test]
fn test_repeated_query_is_identical() {
    let dir = temp_data_root();
    write_fixtures(dir.path());
    let (engine, _) = zarr_engine(dir.path(), 4);

    let points = to_points(&random_points(250, [42.0, 38.0, 13.0], 77));
    let first = engine.lookup("labels", 0, &points).unwrap();
    let second = engine.lookup("labels", 0, &points).unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(first, second);
}

fn memory_registry() -> Arc<DatasetRegistry> {
    Arc::new(DatasetRegistry::from_descriptors(vec![
        DatasetDescriptor::new(
            "big_chunks",
            StorageKind::ChunkedArray,
            ElementType::UInt8,
            1,
            [1.0, 1.0, 1.0],
            vec![0],
            vec![Service::Lookup],
            StoreLocation::file("big_chunks"),
        )
        .unwrap(),
        DatasetDescriptor::new(
            "intensity",
            StorageKind::ChunkedArray,
            ElementType::Float32,
            1,
            [1.0, 1.0, 1.0],
            vec![0],
            vec![Service::Lookup],
            StoreLocation::file("intensity"),
        )
        .unwrap(),
    ]))
}

fn memory_opener() -> Arc<MemoryStoreOpener> {
    Arc::new(
        MemoryStoreOpener::new()
            .with_volume(
                "big_chunks",
                0,
                MemoryVolume::from_fn([80, 16, 16], [64, 64, 64], 1, |[x, _, _], _| x as u8),
            )
            .with_volume(
                "intensity",
                0,
                MemoryVolume::from_fn([8, 8, 8], [4, 4, 4], 1, |[x, y, z], _| {
                    (x + y + z) as f32 * 0.5
                }),
            ),
    )
}

fn memory_engine(opener: Arc<MemoryStoreOpener>, chunk_multiplier: u64) -> PointQueryEngine {
    let config = PointQueryConfig {
        max_workers: 2,
        chunk_multiplier,
        ..Default::default()
    };
    PointQueryEngine::new(config, memory_registry(), opener).unwrap()
}

#[test]
fn test_chunk_multiplier_merges_reads() {
    let points = to_points(&[[10.0, 10.0, 10.0], [70.0, 10.0, 10.0]]);

    let opener = memory_opener();
    let engine = memory_engine(opener.clone(), 2);
    let result = engine.lookup("big_chunks", 0, &points).unwrap();
    assert_eq!(result.values::<u8>(), Some(vec![10, 70]));
    assert_eq!(opener.read_count(), 1);

    let opener = memory_opener();
    let engine = memory_engine(opener.clone(), 1);
    let result = engine.lookup("big_chunks", 0, &points).unwrap();
    assert_eq!(result.values::<u8>(), Some(vec![10, 70]));
    assert_eq!(opener.read_count(), 2);
}

#[test]
fn test_all_invalid_points_issue_no_reads() {
    let opener = memory_opener();
    opener.set_fail_reads(true);
    let engine = memory_engine(opener.clone(), 1);

    let points = to_points(&out_of_bounds_points([8.0, 8.0, 8.0]));
    let result = engine.lookup("intensity", 0, &points).unwrap();

    assert_eq!(result.len(), points.len());
    assert!(result.values::<f32>().unwrap().iter().all(|v| v.is_nan()));
    assert_eq!(opener.read_count(), 0);
}

#[test]
fn test_float_dataset_uses_nan_sentinel() {
    let engine = memory_engine(memory_opener(), 1);
    let points = to_points(&[[1.0, 2.0, 3.0], [9.0, 0.0, 0.0]]);
    let values = engine
        .lookup("intensity", 0, &points)
        .unwrap()
        .values::<f32>()
        .unwrap();
    assert_eq!(values[0], 3.0);
    assert!(values[1].is_nan());
}

#[test]
fn test_store_failure_fails_whole_query() {
    let opener = memory_opener();
    opener.set_fail_reads(true);
    let engine = memory_engine(opener.clone(), 1);

    let points = to_points(&[[1.0, 1.0, 1.0], [50.0, 1.0, 1.0], [500.0, 0.0, 0.0]]);
    let err = engine.lookup("big_chunks", 0, &points).unwrap_err();
    assert!(matches!(err, PointQueryError::StoreReadFailure { .. }));
    assert!(!err.is_client_error());
}

#[test]
fn test_too_many_points_rejected_before_store_access() {
    let opener = memory_opener();
    let config = PointQueryConfig {
        max_workers: 1,
        max_points: 3,
        ..Default::default()
    };
    let engine = PointQueryEngine::new(config, memory_registry(), opener.clone()).unwrap();

    let points = vec![QueryPoint::new(0.0, 0.0, 0.0); 4];
    let err = engine.lookup("big_chunks", 0, &points).unwrap_err();
    assert!(matches!(err, PointQueryError::TooManyPoints { count: 4, max: 3 }));
    assert_eq!(opener.open_count(), 0);
}

#[test]
fn test_uneven_chunks_written_with_zarrs() {
    let dir = temp_data_root();
    write_volume::<u16>(
        &dir.path().join("odd.zarr"),
        "/",
        [7, 5, 3],
        [3, 2, 2],
        1,
        |[x, y, z], _| (x * 100 + y * 10 + z) as u16,
    )
    .unwrap();

    let registry = DatasetRegistry::from_descriptors(vec![DatasetDescriptor::new(
        "odd",
        StorageKind::ChunkedArray,
        ElementType::UInt16,
        1,
        [1.0, 1.0, 1.0],
        vec![0],
        vec![Service::Lookup],
        StoreLocation::file("odd.zarr"),
    )
    .unwrap()]);
    let engine = PointQueryEngine::new(
        PointQueryConfig::default(),
        Arc::new(registry),
        Arc::new(ZarrStoreOpener::new(dir.path())),
    )
    .unwrap();

    let points = to_points(&[[6.0, 4.0, 2.0], [0.0, 0.0, 0.0], [3.0, 2.0, 1.0], [7.0, 0.0, 0.0]]);
    let values = engine
        .lookup("odd", 0, &points)
        .unwrap()
        .values::<u16>()
        .unwrap();
    assert_eq!(values, vec![642, 0, 321, 0]);
}

#[tokio::test]
async fn test_lookup_offloaded_from_async_context() {
    let dir = temp_data_root();
    write_fixtures(dir.path());
    let (engine, _) = zarr_engine(dir.path(), 2);
    let engine = Arc::new(engine);

    let points = to_points(&[[1.0, 1.0, 1.0], [20.0, 30.0, 4.0]]);
    let handle = {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || engine.lookup("labels", 0, &points))
    };
    let result = handle.await.unwrap().unwrap();

    assert_eq!(
        result.values::<u64>().unwrap(),
        vec![label_at([1, 1, 1]), label_at([20, 30, 4])]
    );
}

#[test]
fn test_sample_registry_loads() {
    let registry = DatasetRegistry::load_from_file(test_utils::sample_registry_path()).unwrap();
    let field = registry.get("flywire_v1").unwrap();
    assert!(field.supports(Service::Transform));
    assert_eq!(field.width, 2);
    assert!(registry.get("aedes_brain").unwrap().supports(Service::Lookup));
}
