//! Model builder configuration types (wrapgen.toml format).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Root model builder configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default-argument expansion.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Ownership annotation.
    #[serde(default)]
    pub ownership: OwnershipConfig,

    /// Declarations to leave out of the model.
    #[serde(default)]
    pub ignore: IgnoreConfig,

    /// Extra type knowledge.
    #[serde(default)]
    pub types: TypesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub strategy: DefaultArgStrategy,
}

/// How trailing default arguments are presented to generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultArgStrategy {
    /// One explicit call form per accepted arity.
    #[default]
    OverloadSet,
    /// A single call form whose trailing parameters are optional.
    OptionalParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipConfig {
    #[serde(default)]
    pub unclassifiable: UnclassifiablePolicy,
}

/// What to do with a pointer field no ownership heuristic matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiablePolicy {
    /// Abort the build.
    Error,
    /// Leave the field unannotated and report a warning.
    #[default]
    Warn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Class names (qualified or unqualified).
    #[serde(default)]
    pub classes: Vec<String>,

    #[serde(default)]
    pub methods: Vec<IgnoredMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredMethod {
    pub class: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypesConfig {
    /// Alias name to underlying type spelling, applied like typedefs.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl ModelConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: ModelConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        for (alias, target) in &self.types.aliases {
            if alias.trim().is_empty() {
                return Err(ConfigError::Validation("empty type alias name".to_string()));
            }
            if alias.trim() == target.trim() {
                return Err(ConfigError::Validation(format!(
                    "type alias `{}` refers to itself",
                    alias
                )));
            }
        }
        if self.ignore.classes.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "empty class name in ignore.classes".to_string(),
            ));
        }
        for entry in &self.ignore.methods {
            if entry.class.trim().is_empty() || entry.method.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "ignore.methods entries need both `class` and `method`".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether a class is excluded. Matches the qualified name or its last
    /// segment, so `MyClassA` also excludes `test::MyClassA`.
    pub fn is_class_ignored(&self, qualified: &str) -> bool {
        self.ignore
            .classes
            .iter()
            .any(|c| name_matches(c, qualified))
    }

    pub fn is_method_ignored(&self, class: &str, method: &str) -> bool {
        self.ignore
            .methods
            .iter()
            .any(|m| m.method == method && name_matches(&m.class, class))
    }

    /// Ignore a class.
    pub fn with_ignored_class(mut self, class: &str) -> Self {
        self.ignore.classes.push(class.to_string());
        self
    }

    /// Ignore one method of a class.
    pub fn with_ignored_method(mut self, class: &str, method: &str) -> Self {
        self.ignore.methods.push(IgnoredMethod {
            class: class.to_string(),
            method: method.to_string(),
        });
        self
    }
}

fn name_matches(pattern: &str, qualified: &str) -> bool {
    pattern == qualified || qualified.rsplit("::").next() == Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[defaults]
strategy = "optional_parameters"

[ownership]
unclassifiable = "error"

[ignore]
classes = ["MyClassA"]
methods = [{ class = "MyClassB", method = "myMethod" }]

[types]
aliases = { real = "double", Index = "unsigned int" }
        "#;

        let config = ModelConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.defaults.strategy, DefaultArgStrategy::OptionalParameters);
        assert_eq!(config.ownership.unclassifiable, UnclassifiablePolicy::Error);
        assert!(config.is_class_ignored("MyClassA"));
        assert!(config.is_class_ignored("test::MyClassA"));
        assert!(!config.is_class_ignored("MyClassAB"));
        assert!(config.is_method_ignored("MyClassB", "myMethod"));
        assert!(!config.is_method_ignored("MyClassB", "other"));
        assert_eq!(config.types.aliases.get("real").map(String::as_str), Some("double"));
    }

    #[test]
    fn test_self_alias_is_rejected() {
        let err = ModelConfig::from_toml_str("[types]\naliases = { real = \"real\" }").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_incomplete_ignored_method_is_rejected() {
        let toml = "[ignore]\nmethods = [{ class = \"\", method = \"m\" }]";
        let err = ModelConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("ignore.methods"));
    }

    #[test]
    fn test_unknown_strategy_is_a_parse_error() {
        let err = ModelConfig::from_toml_str("[defaults]\nstrategy = \"variadic\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ignore]\nclasses = [\"Quaternion\"]").unwrap();

        let config = ModelConfig::from_file(file.path()).unwrap();
        assert!(config.is_class_ignored("Rotations::Quaternion"));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
