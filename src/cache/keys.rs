//! Type-safe cache key builders

use std::fmt;

pub const VERSION: &str = "v1";

pub mod refunds {
    use super::*;

    pub const NAMESPACE: &str = "refunds";

    /// Admin statistics over every refund request.
    #[derive(Debug, Clone, Default)]
    pub struct StatisticsKey;

    impl fmt::Display for StatisticsKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:stats:{}", NAMESPACE, VERSION)
        }
    }
}
