//! Static dataset registry loaded from YAML.
//!
//! The registry is read-only after loading and is shared between query
//! workers through `Arc`, so lookups need no synchronization.
//!
//! ```yaml
//! datasets:
//!   flywire_v1:
//!     description: FAFB to FlyWire displacement field
//!     type: chunked-pyramid
//!     scales: [2]
//!     voxel_size: [4, 4, 40]
//!     services: [transform]
//!     dtype: int16
//!     width: 2
//!     store:
//!       driver: file
//!       path: fields/flywire_v1
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::descriptor::{
    DatasetDescriptor, DatasetSummary, ElementType, SentinelPolicy, Service, StorageKind,
    StoreLocation,
};
use crate::error::{RegistryError, RegistryResult};

/// Source of dataset descriptors.
pub trait DescriptorProvider: Send + Sync {
    /// Look up a dataset by identifier. `None` when the identifier is unknown.
    fn describe(&self, dataset: &str) -> Option<Arc<DatasetDescriptor>>;

    /// All known dataset identifiers, sorted.
    fn dataset_ids(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    datasets: BTreeMap<String, DescriptorEntry>,
}

#[derive(Debug, Deserialize)]
struct DescriptorEntry {
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    kind: StorageKind,
    scales: Vec<u32>,
    voxel_size: [f64; 3],
    #[serde(default)]
    scale_voxel_sizes: BTreeMap<u32, [f64; 3]>,
    #[serde(default = "default_services")]
    services: Vec<Service>,
    dtype: String,
    #[serde(default = "default_width")]
    width: usize,
    store: StoreLocation,
}

fn default_services() -> Vec<Service> {
    vec![Service::Lookup]
}

fn default_width() -> usize {
    1
}

impl DescriptorEntry {
    fn into_descriptor(self, id: String) -> RegistryResult<DatasetDescriptor> {
        let element_type = ElementType::parse(&self.dtype)
            .map_err(|e| RegistryError::invalid(&id, e.to_string()))?;

        let descriptor = DatasetDescriptor {
            id,
            description: self.description,
            kind: self.kind,
            element_type,
            width: self.width,
            voxel_size: self.voxel_size,
            scale_voxel_sizes: self.scale_voxel_sizes,
            scales: self.scales,
            services: self.services,
            store: self.store,
            sentinel: SentinelPolicy::for_element_type(element_type),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// In-memory table of dataset descriptors.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, Arc<DatasetDescriptor>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already-validated descriptors.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = DatasetDescriptor>) -> Self {
        let datasets = descriptors
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        Self { datasets }
    }

    /// Parse a registry from a YAML document.
    pub fn from_yaml_str(content: &str) -> RegistryResult<Self> {
        let file: RegistryFile = serde_yaml::from_str(content)?;

        let mut datasets = BTreeMap::new();
        for (id, entry) in file.datasets {
            let descriptor = entry.into_descriptor(id.clone())?;
            datasets.insert(id, Arc::new(descriptor));
        }

        Ok(Self { datasets })
    }

    /// Load a registry from a YAML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let registry = Self::from_yaml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            datasets = registry.len(),
            "Loaded dataset registry"
        );
        Ok(registry)
    }

    pub fn get(&self, dataset: &str) -> Option<&Arc<DatasetDescriptor>> {
        self.datasets.get(dataset)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Scales, voxel size and description of every dataset.
    pub fn summaries(&self) -> BTreeMap<String, DatasetSummary> {
        self.datasets
            .iter()
            .map(|(id, d)| (id.clone(), d.summary()))
            .collect()
    }
}

impl DescriptorProvider for DatasetRegistry {
    fn describe(&self, dataset: &str) -> Option<Arc<DatasetDescriptor>> {
        self.datasets.get(dataset).cloned()
    }

    fn dataset_ids(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }
}
