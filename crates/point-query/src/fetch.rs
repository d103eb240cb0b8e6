//! Parallel chunk-group fetching.
//!
//! A fixed rayon pool is built once per engine. For each query every pool
//! thread runs one fetch job: it lazily opens its own store handle, then
//! claims groups from a shared cursor until none remain. A failed read or an
//! expired deadline raises an abort flag so the other workers stop claiming.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use rayon::{ThreadPool, ThreadPoolBuilder};
use volume_common::DatasetDescriptor;

use crate::error::{PointQueryError, Result};
use crate::store::{StoreOpener, VolumeStore};
use crate::types::{ChunkGroup, GroupValues};

/// Absolute deadline for one query.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// `Err(QueryTimeout)` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(PointQueryError::QueryTimeout {
                timeout: self.timeout,
            })
        } else {
            Ok(())
        }
    }
}

/// What to fetch and from where.
pub struct FetchRequest<'a> {
    pub opener: &'a dyn StoreOpener,
    pub descriptor: &'a DatasetDescriptor,
    pub scale: u32,
    pub deadline: Option<Deadline>,
}

/// Runs chunk-group reads on a fixed-size worker pool.
pub struct FetchCoordinator {
    pool: ThreadPool,
}

impl FetchCoordinator {
    /// Build the worker pool.
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("point-query-{}", i))
            .build()
            .map_err(|e| PointQueryError::ConfigError(format!("worker pool: {}", e)))?;

        tracing::debug!(workers = workers, "Started fetch worker pool");
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Read every group and extract the values of its members.
    ///
    /// Returns one [`GroupValues`] per group, in no particular order. Any
    /// failure fails the whole fetch.
    pub fn fetch(&self, groups: &[ChunkGroup], request: &FetchRequest<'_>) -> Result<Vec<GroupValues>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);

        let outcomes = self.pool.broadcast(|ctx| {
            let outcome = run_worker(groups, request, &cursor, &abort);
            if let Err(e) = &outcome {
                abort.store(true, Ordering::SeqCst);
                tracing::warn!(worker = ctx.index(), error = %e, "Fetch worker failed");
            }
            outcome
        });

        let mut values = Vec::with_capacity(groups.len());
        for outcome in outcomes {
            values.extend(outcome?);
        }

        if let Some(deadline) = &request.deadline {
            deadline.check()?;
        }

        if values.len() != groups.len() {
            return Err(PointQueryError::read_failed(format!(
                "fetched {} of {} chunk groups",
                values.len(),
                groups.len()
            )));
        }

        Ok(values)
    }
}

/// One worker's share of a fetch.
fn run_worker(
    groups: &[ChunkGroup],
    request: &FetchRequest<'_>,
    cursor: &AtomicUsize,
    abort: &AtomicBool,
) -> Result<Vec<GroupValues>> {
    let mut store: Option<Box<dyn VolumeStore>> = None;
    let mut values = Vec::new();

    loop {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        if let Some(deadline) = &request.deadline {
            deadline.check()?;
        }

        let next = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(group) = groups.get(next) else {
            break;
        };

        if store.is_none() {
            store = Some(request.opener.open(request.descriptor, request.scale)?);
        }
        let Some(handle) = store.as_mut() else {
            break;
        };

        values.push(read_group(handle.as_mut(), group)?);
    }

    Ok(values)
}

/// Read one group's bounding region and pick out its members' voxels.
fn read_group(store: &mut dyn VolumeStore, group: &ChunkGroup) -> Result<GroupValues> {
    let region = group
        .bounding_region()
        .ok_or_else(|| PointQueryError::read_failed("empty chunk group"))?;

    counter!("point_query_store_reads_total").increment(1);
    let data = store.read_region(&region).map_err(|e| {
        counter!("point_query_store_read_failures_total").increment(1);
        PointQueryError::StoreReadFailure {
            chunk: group.key.0,
            message: e.to_string(),
        }
    })?;

    let mut indices = Vec::with_capacity(group.len());
    let mut bytes = Vec::with_capacity(group.len() * data.width * data.element_type.size_bytes());
    for (index, coord) in &group.members {
        let voxel = data.voxel_bytes(coord).ok_or_else(|| {
            PointQueryError::invalid_metadata(format!(
                "voxel {:?} missing from region {:?}",
                coord, region
            ))
        })?;
        indices.push(*index);
        bytes.extend_from_slice(voxel);
    }

    tracing::debug!(
        chunk = ?group.key.0,
        points = group.len(),
        voxels = region.num_voxels(),
        "Read chunk group"
    );

    Ok(GroupValues { indices, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::ChunkBatcher;
    use crate::store::{MemoryStoreOpener, MemoryVolume};
    use crate::types::GridCoordinate;
    use std::sync::Arc;
    use volume_common::{ElementType, Service, StorageKind, StoreLocation};

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor::new(
            "mem",
            StorageKind::ChunkedArray,
            ElementType::UInt32,
            1,
            [1.0, 1.0, 1.0],
            vec![0],
            vec![Service::Lookup],
            StoreLocation::file("mem"),
        )
        .unwrap()
    }

    fn opener() -> MemoryStoreOpener {
        MemoryStoreOpener::new().with_volume(
            "mem",
            0,
            MemoryVolume::from_fn([16, 16, 16], [4, 4, 4], 1, |[x, y, z], _| {
                (x * 10_000 + y * 100 + z) as u32
            }),
        )
    }

    fn groups(coords: &[[i64; 3]]) -> Vec<ChunkGroup> {
        let coords: Vec<_> = coords
            .iter()
            .map(|c| Some(GridCoordinate(*c)))
            .collect();
        let validity = vec![true; coords.len()];
        ChunkBatcher::new([4, 4, 4], 1)
            .unwrap()
            .batch(&coords, &validity)
    }

    #[test]
    fn test_fetch_all_groups() {
        let opener = opener();
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(3).unwrap();
        let groups = groups(&[[1, 1, 1], [2, 3, 1], [9, 9, 9], [15, 0, 4]]);
        assert_eq!(groups.len(), 3);

        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: None,
        };
        let mut values = coordinator.fetch(&groups, &request).unwrap();
        values.sort_by_key(|v| v.indices[0]);

        assert_eq!(values.len(), 3);
        assert_eq!(values[0].indices, vec![0, 1]);
        let first: Vec<u32> = bytemuck::pod_collect_to_vec(&values[0].bytes);
        assert_eq!(first, vec![10_101, 20_301]);
        assert_eq!(opener.read_count(), 3);
        assert!(opener.open_count() <= 3);
    }

    #[test]
    fn test_no_groups_no_reads() {
        let opener = opener();
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(2).unwrap();
        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: None,
        };

        assert!(coordinator.fetch(&[], &request).unwrap().is_empty());
        assert_eq!(opener.open_count(), 0);
        assert_eq!(opener.read_count(), 0);
    }

    #[test]
    fn test_read_failure_is_fatal() {
        let opener = opener();
        opener.set_fail_reads(true);
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(2).unwrap();
        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: None,
        };

        let err = coordinator
            .fetch(&groups(&[[0, 0, 0], [8, 8, 8]]), &request)
            .unwrap_err();
        assert!(matches!(err, PointQueryError::StoreReadFailure { .. }));
    }

    #[test]
    fn test_expired_deadline() {
        let opener = opener();
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(2).unwrap();
        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: Some(Deadline::after(Duration::ZERO)),
        };

        let err = coordinator
            .fetch(&groups(&[[0, 0, 0]]), &request)
            .unwrap_err();
        assert!(matches!(err, PointQueryError::QueryTimeout { .. }));
    }

    /// Wraps the in-memory store with slow reads and failures for chosen region origins.
    struct SlowStoreOpener {
        inner: MemoryStoreOpener,
        delay: Duration,
        fails: fn([i64; 3]) -> bool,
        attempts: Arc<AtomicUsize>,
    }

    struct SlowStore {
        inner: Box<dyn VolumeStore>,
        delay: Duration,
        fails: fn([i64; 3]) -> bool,
        attempts: Arc<AtomicUsize>,
    }

    impl VolumeStore for SlowStore {
        fn domain(&self) -> crate::types::Domain {
            self.inner.domain()
        }

        fn chunk_shape(&self) -> [u64; 3] {
            self.inner.chunk_shape()
        }

        fn element_type(&self) -> ElementType {
            self.inner.element_type()
        }

        fn width(&self) -> usize {
            self.inner.width()
        }

        fn read_region(&mut self, region: &crate::types::Region) -> Result<crate::types::RegionData> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if (self.fails)(region.start) {
                return Err(PointQueryError::read_failed("connection reset"));
            }
            self.inner.read_region(region)
        }
    }

    impl StoreOpener for SlowStoreOpener {
        fn open(&self, descriptor: &DatasetDescriptor, scale: u32) -> Result<Box<dyn VolumeStore>> {
            Ok(Box::new(SlowStore {
                inner: self.inner.open(descriptor, scale)?,
                delay: self.delay,
                fails: self.fails,
                attempts: self.attempts.clone(),
            }))
        }
    }

    fn slow_opener(delay: Duration, fails: fn([i64; 3]) -> bool) -> SlowStoreOpener {
        SlowStoreOpener {
            inner: opener(),
            delay,
            fails,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// One point in each of the 64 chunks of the 16^3 volume.
    fn every_chunk() -> Vec<ChunkGroup> {
        let mut coords = Vec::new();
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    coords.push([x * 4, y * 4, z * 4]);
                }
            }
        }
        groups(&coords)
    }

    #[test]
    fn test_first_failure_stops_other_workers() {
        let opener = slow_opener(Duration::from_millis(5), |start| start == [0, 0, 0]);
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(2).unwrap();
        let groups = every_chunk();
        assert_eq!(groups.len(), 64);

        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: None,
        };
        let err = coordinator.fetch(&groups, &request).unwrap_err();
        assert!(matches!(err, PointQueryError::StoreReadFailure { .. }));

        let attempts = opener.attempts.load(Ordering::SeqCst);
        assert!(attempts < 16, "{} reads issued after the first failure", attempts);
    }

    #[test]
    fn test_late_failure_reports_its_chunk() {
        let opener = slow_opener(Duration::ZERO, |start| start[0] >= 12);
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(1).unwrap();
        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: None,
        };

        match coordinator.fetch(&every_chunk(), &request).unwrap_err() {
            PointQueryError::StoreReadFailure { chunk, .. } => assert_eq!(chunk, [3, 0, 0]),
            other => panic!("unexpected error: {other}"),
        }
        // Groups are claimed in key order; the first x = 3 chunk is the 49th.
        assert_eq!(opener.attempts.load(Ordering::SeqCst), 49);
    }

    #[test]
    fn test_deadline_expires_between_reads() {
        let opener = slow_opener(Duration::from_millis(20), |_| false);
        let descriptor = descriptor();
        let coordinator = FetchCoordinator::new(1).unwrap();
        let groups = every_chunk();
        let request = FetchRequest {
            opener: &opener,
            descriptor: &descriptor,
            scale: 0,
            deadline: Some(Deadline::after(Duration::from_millis(70))),
        };

        let err = coordinator.fetch(&groups, &request).unwrap_err();
        assert!(matches!(err, PointQueryError::QueryTimeout { .. }));

        let attempts = opener.attempts.load(Ordering::SeqCst);
        assert!(attempts >= 1, "deadline expired before the first read");
        assert!(attempts < groups.len(), "every group was read");
    }

    #[test]
    fn test_worker_threads_named() {
        let coordinator = FetchCoordinator::new(2).unwrap();
        assert_eq!(coordinator.workers(), 2);
        let names = coordinator
            .pool
            .broadcast(|_| std::thread::current().name().map(str::to_string));
        assert!(names
            .iter()
            .all(|n| n.as_deref().map_or(false, |n| n.starts_with("point-query-"))));
    }
}
