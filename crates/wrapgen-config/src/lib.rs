//! Configuration for the wrapgen interface model builder.
//!
//! Every section is optional; an empty file (or `ModelConfig::default()`)
//! gives the builder's standard behavior.
//!
//! # Example
//!
//! ```toml
//! # wrapgen.toml
//! [defaults]
//! strategy = "overload_set"
//!
//! [ownership]
//! unclassifiable = "warn"
//!
//! [ignore]
//! classes = ["MyClassA"]
//! methods = [{ class = "MyClassB", method = "myMethod" }]
//!
//! [types]
//! aliases = { real = "double" }
//! ```

mod config;
mod error;

pub use config::{
    DefaultArgStrategy, DefaultsConfig, IgnoreConfig, IgnoredMethod, ModelConfig,
    OwnershipConfig, TypesConfig, UnclassifiablePolicy,
};
pub use error::{ConfigError, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = ModelConfig::from_toml_str("").expect("Failed to parse config");
        assert_eq!(config, ModelConfig::default());
        assert_eq!(config.defaults.strategy, DefaultArgStrategy::OverloadSet);
        assert_eq!(config.ownership.unclassifiable, UnclassifiablePolicy::Warn);
    }
}
