//! Shared helpers for model integration tests.

use wrapgen_decl::DeclUnit;
use wrapgen_model::{BuildFailure, BuildOutput, ModelBuilder, ModelConfig};

/// Build with the default configuration, panicking with every error on failure.
pub fn build(unit: &DeclUnit) -> BuildOutput {
    build_with(unit, ModelConfig::default())
}

pub fn build_with(unit: &DeclUnit, config: ModelConfig) -> BuildOutput {
    match ModelBuilder::with_config(config).build(unit) {
        Ok(output) => output,
        Err(failure) => panic!("model build failed: {:#?}", failure.errors),
    }
}

/// Build expecting failure.
pub fn build_err(unit: &DeclUnit) -> BuildFailure {
    match ModelBuilder::new().build(unit) {
        Ok(output) => panic!("expected a failed build, got {:#?}", output.model),
        Err(failure) => failure,
    }
}
