use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::ValidationError;

const SYSTEM_PREFIXES: [&str; 9] = [
    "/etc",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/boot",
    "/sys",
    "/proc",
    "/dev",
];

/// Where and how messages are spooled.
///
/// ```ron
/// spool: (
///     path: "/var/spool/postern",
///     long_names: true,
///     audit: Some("/var/spool/postern-audit"),
/// )
/// ```
///
/// `long_names` selects `<id>.mail` over the short `<hex>.<letter>ml` form.
/// When `audit` is set, a copy of each committed message is written there as
/// `S_<filename>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolConfig {
    path: PathBuf,
    long_names: bool,
    audit: Option<PathBuf>,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/spool/postern"),
            long_names: true,
            audit: None,
        }
    }
}

impl<'de> Deserialize<'de> for SpoolConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct SpoolConfigHelper {
            path: PathBuf,
            #[serde(default = "long_names_default")]
            long_names: bool,
            #[serde(default)]
            audit: Option<PathBuf>,
        }

        const fn long_names_default() -> bool {
            true
        }

        let helper = SpoolConfigHelper::deserialize(deserializer)?;

        let mut builder = Self::builder()
            .path(helper.path)
            .long_names(helper.long_names);
        if let Some(audit) = helper.audit {
            builder = builder.audit(audit);
        }

        builder.build().map_err(serde::de::Error::custom)
    }
}

impl SpoolConfig {
    /// Create a new `SpoolConfig` builder
    #[must_use]
    pub fn builder() -> SpoolConfigBuilder {
        SpoolConfigBuilder::default()
    }

    /// Validate a spool path
    ///
    /// Rejects `..` components, relative paths, and paths inside system
    /// directories.
    pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ValidationError::ParentDirectory(path.to_path_buf()));
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.to_path_buf()));
        }

        if let Some(prefix) = SYSTEM_PREFIXES
            .into_iter()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(ValidationError::SystemDirectory {
                prefix,
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn long_names(&self) -> bool {
        self.long_names
    }

    #[must_use]
    pub fn audit(&self) -> Option<&Path> {
        self.audit.as_deref()
    }
}

/// Builder for `SpoolConfig`
#[derive(Debug)]
pub struct SpoolConfigBuilder {
    path: Option<PathBuf>,
    long_names: bool,
    audit: Option<PathBuf>,
}

impl Default for SpoolConfigBuilder {
    fn default() -> Self {
        Self {
            path: None,
            long_names: true,
            audit: None,
        }
    }
}

impl SpoolConfigBuilder {
    /// Set the spool directory path
    #[must_use]
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Choose between `<id>.mail` and `<hex>.<letter>ml` filenames
    #[must_use]
    pub const fn long_names(mut self, long_names: bool) -> Self {
        self.long_names = long_names;
        self
    }

    /// Keep a copy of every committed message in this directory
    #[must_use]
    pub fn audit(mut self, audit: PathBuf) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build the `SpoolConfig`, validating every path
    pub fn build(self) -> Result<SpoolConfig, ValidationError> {
        let path = self.path.ok_or(ValidationError::MissingField("path"))?;
        SpoolConfig::validate_path(&path)?;

        if let Some(audit) = &self.audit {
            SpoolConfig::validate_path(audit)?;
        }

        Ok(SpoolConfig {
            path,
            long_names: self.long_names,
            audit: self.audit,
        })
    }
}
