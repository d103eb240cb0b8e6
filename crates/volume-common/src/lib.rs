//! Common types shared by the point query engine and its drivers.

pub mod descriptor;
pub mod error;
pub mod point;
pub mod registry;

pub use descriptor::{
    DatasetDescriptor, DatasetSummary, ElementType, SentinelPolicy, Service, StorageKind,
    StoreDriver, StoreLocation,
};
pub use error::{RegistryError, RegistryResult};
pub use point::QueryPoint;
pub use registry::{DatasetRegistry, DescriptorProvider};
