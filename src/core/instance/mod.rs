pub mod catalog;
pub mod manifest;
pub mod model;
pub mod reconcile;
pub mod store;

pub use catalog::Catalog;
pub use manifest::{HttpManifestFetcher, ManifestFetcher, ManifestInfo, PackageList, PROTOCOL_VERSION};
pub use model::Instance;
pub use reconcile::InstanceReconciler;
pub use store::{InstanceStore, JsonInstanceStore};
