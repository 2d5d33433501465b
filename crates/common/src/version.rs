use std::fmt;

/// Build metadata baked in by the calling crate's `build.rs`.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub version: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
    pub build_target: Option<&'static str>,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version:   {}", self.version)?;
        writeln!(f, "profile:   {}", self.build_profile)?;
        writeln!(f, "features:  {}", self.build_features)?;
        writeln!(f, "built:     {}", self.build_timestamp)?;
        write!(f, "rustc:     {}", self.rust_version)?;
        if let Some(target) = self.build_target {
            write!(f, "\ntarget:    {}", target)?;
        }
        Ok(())
    }
}

/// Expands to a [`BuildInfo`] using the environment variables emitted by
/// the invoking crate's build script.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            build_profile: env!("BUILD_PROFILE"),
            build_features: env!("BUILD_FEATURES"),
            version: env!("REPO_VERSION"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rust_version: env!("RUST_VERSION"),
            build_target: option_env!("BUILD_TARGET"),
        }
    };
}
