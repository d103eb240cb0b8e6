//! The point query engine.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use volume_common::{DatasetDescriptor, DescriptorProvider, QueryPoint, Service};

use crate::assemble::ResultBuffer;
use crate::batcher::ChunkBatcher;
use crate::bounds::BoundsValidator;
use crate::config::PointQueryConfig;
use crate::displacement::{decode_field, TransformResult};
use crate::error::{PointQueryError, Result};
use crate::fetch::{Deadline, FetchCoordinator, FetchRequest};
use crate::mapper::CoordinateMapper;
use crate::store::{check_store_matches, StoreOpener};

/// Answers lookup and transform queries against registered datasets.
///
/// The engine owns a fixed worker pool and is meant to be built once per
/// process and shared. Calls are synchronous and may run concurrently.
pub struct PointQueryEngine {
    config: PointQueryConfig,
    provider: Arc<dyn DescriptorProvider>,
    opener: Arc<dyn StoreOpener>,
    fetcher: FetchCoordinator,
}

impl PointQueryEngine {
    pub fn new(
        config: PointQueryConfig,
        provider: Arc<dyn DescriptorProvider>,
        opener: Arc<dyn StoreOpener>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = FetchCoordinator::new(config.max_workers)?;

        tracing::info!(
            max_workers = config.max_workers,
            chunk_multiplier = config.chunk_multiplier,
            max_points = config.max_points,
            datasets = provider.dataset_ids().len(),
            "Point query engine ready"
        );

        Ok(Self {
            config,
            provider,
            opener,
            fetcher,
        })
    }

    pub fn config(&self) -> &PointQueryConfig {
        &self.config
    }

    /// Resolve a dataset identifier.
    pub fn describe(&self, dataset: &str) -> Result<Arc<DatasetDescriptor>> {
        self.provider
            .describe(dataset)
            .ok_or_else(|| PointQueryError::UnknownDataset {
                dataset: dataset.to_string(),
                available: self.provider.dataset_ids().join(", "),
            })
    }

    /// Value of the dataset at every point, in input order.
    ///
    /// Points outside the volume at `scale` get the dataset's sentinel.
    pub fn lookup(&self, dataset: &str, scale: u32, points: &[QueryPoint]) -> Result<ResultBuffer> {
        self.observe(Service::Lookup, || {
            self.check_point_count(points)?;
            let descriptor = self.describe(dataset)?;
            self.run(&descriptor, scale, points, Service::Lookup)
        })
    }

    /// Apply the dataset's displacement field at every point.
    pub fn transform(
        &self,
        dataset: &str,
        scale: u32,
        points: &[QueryPoint],
    ) -> Result<TransformResult> {
        self.observe(Service::Transform, || {
            self.check_point_count(points)?;
            let descriptor = self.describe(dataset)?;
            if !descriptor.supports(Service::Transform) {
                return Err(PointQueryError::UnsupportedOperation {
                    dataset: descriptor.id.clone(),
                    operation: Service::Transform,
                });
            }

            let field = self.run(&descriptor, scale, points, Service::Transform)?;
            decode_field(points, &field)
        })
    }

    /// Count and time one query, whatever its outcome.
    fn observe<T>(&self, operation: Service, query: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = query();

        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        let operation_label = operation.to_string();
        counter!(
            "point_query_queries_total",
            "operation" => operation_label.clone(),
            "status" => status
        )
        .increment(1);
        histogram!(
            "point_query_duration_seconds",
            "operation" => operation_label,
            "status" => status
        )
        .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::warn!(operation = %operation, status = status, error = %e, "Point query failed");
        }
        result
    }

    fn check_point_count(&self, points: &[QueryPoint]) -> Result<()> {
        if points.len() as u64 > self.config.max_points {
            return Err(PointQueryError::TooManyPoints {
                count: points.len(),
                max: self.config.max_points,
            });
        }
        Ok(())
    }

    fn run(
        &self,
        descriptor: &DatasetDescriptor,
        scale: u32,
        points: &[QueryPoint],
        operation: Service,
    ) -> Result<ResultBuffer> {
        let start = Instant::now();
        let deadline = self.config.query_timeout().map(Deadline::after);
        let mapper = CoordinateMapper::for_scale(descriptor, scale)?;

        let mut result = ResultBuffer::filled(
            descriptor.element_type,
            descriptor.width,
            points.len(),
            descriptor.sentinel,
        );
        if points.is_empty() {
            return Ok(result);
        }

        // Metadata handle; never used for region reads.
        let metadata = self.opener.open(descriptor, scale)?;
        check_store_matches(metadata.as_ref(), descriptor)?;
        let validator = BoundsValidator::new(metadata.domain());
        let batcher = ChunkBatcher::new(metadata.chunk_shape(), self.config.chunk_multiplier)?;
        drop(metadata);

        let coords = mapper.map_points(points);
        let validity = validator.validate(&coords);
        let groups = batcher.batch(&coords, &validity);
        let valid = validity.iter().filter(|v| **v).count();

        if !groups.is_empty() {
            let request = FetchRequest {
                opener: self.opener.as_ref(),
                descriptor,
                scale,
                deadline,
            };
            for values in self.fetcher.fetch(&groups, &request)? {
                result.scatter(&values)?;
            }
        }

        let elapsed = start.elapsed();
        counter!("point_query_points_total").increment(points.len() as u64);
        counter!("point_query_invalid_points_total").increment((points.len() - valid) as u64);

        tracing::info!(
            dataset = %descriptor.id,
            scale = scale,
            operation = %operation,
            points = points.len(),
            valid = valid,
            groups = groups.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Point query complete"
        );

        Ok(result)
    }
}
