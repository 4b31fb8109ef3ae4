//! Constants used throughout PrismDB

/// Default vector size for processing
pub const STANDARD_VECTOR_SIZE: usize = 2048;

/// Name of the default catalog schema
pub const DEFAULT_SCHEMA: &str = "main";

/// Maximum number of pivot value combinations (exclusive)
pub const DEFAULT_PIVOT_LIMIT: usize = 10_000;

/// Setting name controlling the pivot limit
pub const PIVOT_LIMIT_SETTING: &str = "pivot_limit";

/// Setting name controlling the number of scan workers
pub const THREADS_SETTING: &str = "threads";

/// Alias a pivot result is registered under when the user gives none
pub const UNNAMED_PIVOT_ALIAS: &str = "__unnamed_pivot";

pub const INTERNAL_PIVOT_GROUP_PREFIX: &str = "__internal_pivot_group";
pub const INTERNAL_PIVOT_REF_PREFIX: &str = "__internal_pivot_ref";
pub const INTERNAL_PIVOT_AGGREGATE_PREFIX: &str = "__internal_pivot_aggregate";
pub const INTERNAL_PIVOT_NAME_PREFIX: &str = "__internal_pivot_name";
pub const INTERNAL_PIVOT_MAP_PREFIX: &str = "__internal_pivot_map";
pub const INTERNAL_PIVOT_ALIAS_PREFIX: &str = "__internal_pivot_alias_";
