// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading for the Potik pipeline.
//!
//! Layered TOML merge via Figment (system, XDG, local, env), strict
//! unknown-field rejection, and semantic validation of the extracted model.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PotikConfig;
pub use validation::validate_config;

/// Load from a TOML string and validate, joining validation errors into one
/// figment-compatible error message. Convenience for tests and tooling.
#[allow(clippy::result_large_err)]
pub fn load_and_validate_str(toml_content: &str) -> Result<PotikConfig, figment::Error> {
    let config = load_config_from_str(toml_content)?;
    validate_config(&config).map_err(|errors| figment::Error::from(errors.join("; ")))?;
    Ok(config)
}
