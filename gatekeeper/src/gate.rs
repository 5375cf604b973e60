use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// State of the gatekeeper's own configuration file, checked once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    ReadSuccessfully,
    /// File was missing and an empty one has been created
    NotFound,
    Empty,
    /// File was missing and could not be created
    CanNotCreate,
    /// File exists but could not be read
    Unreadable,
}

impl ConfigStatus {
    /// Whether the gatekeeper still has to be configured
    pub fn needs_setup(self) -> bool {
        matches!(self, ConfigStatus::NotFound | ConfigStatus::Empty)
    }

    /// Whether the process lacks access to its configuration file
    pub fn is_blocked(self) -> bool {
        matches!(self, ConfigStatus::CanNotCreate | ConfigStatus::Unreadable)
    }
}

#[derive(Debug, Clone)]
pub struct GateFile {
    path: PathBuf,
    status: ConfigStatus,
    address: Option<String>,
}

impl GateFile {
    /// Read the first line of `path`, creating an empty file if it is missing.
    ///
    /// Never fails: every problem is folded into the returned status.
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let (status, address) = match fs::read_to_string(&path) {
            Ok(contents) => {
                let first = contents.lines().next().unwrap_or("").trim();
                if first.is_empty() {
                    (ConfigStatus::Empty, None)
                } else {
                    (ConfigStatus::ReadSuccessfully, Some(first.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => match fs::write(&path, "") {
                Ok(()) => {
                    tracing::info!("Created empty configuration file {}", path.display());
                    (ConfigStatus::NotFound, None)
                }
                Err(e) => {
                    tracing::warn!("Cannot create configuration file {}: {}", path.display(), e);
                    (ConfigStatus::CanNotCreate, None)
                }
            },
            Err(e) => {
                tracing::warn!("Cannot read configuration file {}: {}", path.display(), e);
                (ConfigStatus::Unreadable, None)
            }
        };

        Self {
            path,
            status,
            address,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> ConfigStatus {
        self.status
    }

    /// Configured client network address, if any
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}
