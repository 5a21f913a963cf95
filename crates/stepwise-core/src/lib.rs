mod catalog;
mod ordering;
mod version;

pub use catalog::{
    CatalogError, MigrationStepDescriptor, VersionCatalog, BASE_CATALOG_FILE,
    OVERRIDE_CATALOG_FILE,
};
pub use ordering::{
    max_version, next_hop, next_version, plan_hops, prev_version, Direction, GraphError, Hop,
};
pub use version::{SchemaVersion, VersionError, SENTINEL_VERSION};
