use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where diagnostic output goes.
///
/// ```ron
/// logging: (
///     level: Some("debug"),
///     file: Some("/var/log/postern.log"),
/// )
/// ```
///
/// With no `file`, output goes to stderr. With no `level`, the `LOG_LEVEL`
/// environment variable is consulted before falling back to the build default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}
