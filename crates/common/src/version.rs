use std::fmt;

use serde::Serialize;

/// Build metadata for a binary
///
/// The fields are populated by the binary crate's `build.rs`, so use
///  [`build_info!`](crate::build_info) from that crate rather than
///  constructing this by hand.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub package_version: &'static str,
    pub repo_version: &'static str,
    pub build_profile: &'static str,
    pub build_timestamp: &'static str,
    pub build_features: &'static str,
    pub rust_version: &'static str,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} build, features: {})\nbuilt {} with {}",
            self.package_version,
            self.repo_version,
            self.build_profile,
            self.build_features,
            self.build_timestamp,
            self.rust_version
        )
    }
}

/// Capture the [`BuildInfo`] of the crate the macro is expanded in
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            package_version: env!("CARGO_PKG_VERSION"),
            repo_version: option_env!("REPO_VERSION").unwrap_or("unknown"),
            build_profile: option_env!("BUILD_PROFILE").unwrap_or("unknown"),
            build_timestamp: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            build_features: option_env!("BUILD_FEATURES").unwrap_or("none"),
            rust_version: option_env!("RUST_VERSION").unwrap_or("unknown"),
        }
    };
}
