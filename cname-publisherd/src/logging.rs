use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use anyhow::{Context, Result};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr or to `log_path`.
pub fn init(verbose: bool, log_path: Option<&Path>) -> Result<()> {
    let default_filter = if verbose {
        "cname_publisherd=debug,shared=debug"
    } else {
        "cname_publisherd=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_path {
        Some(path) => {
            let file = WatchedFile::open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let shown = file.path().display().to_string();
            builder.with_ansi(false).with_writer(file).init();
            tracing::debug!("Logging to {}", shown);
        }
        None => builder.with_writer(io::stderr).init(),
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    fn of(meta: &fs::Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }
}

struct OpenLog {
    file: File,
    id: FileId,
}

/// Append-only log file that follows external rotation.
///
/// Before every write the path is checked; if the file there is not the one
/// we hold open (moved away or deleted), the path is reopened.
pub struct WatchedFile {
    path: PathBuf,
    current: Mutex<OpenLog>,
}

impl WatchedFile {
    /// Open `path` for appending. Relative paths are resolved against the
    /// current directory now, so later reopens survive a `chdir`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = std::env::current_dir()?.join(path.as_ref());
        let current = open_append(&path)?;

        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let on_disk = fs::metadata(&self.path).map(|m| FileId::of(&m)).ok();
        if on_disk != Some(current.id) {
            *current = open_append(&self.path)?;
        }

        current.file.write_all(buf)
    }
}

fn open_append(path: &Path) -> io::Result<OpenLog> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let id = FileId::of(&file.metadata()?);
    Ok(OpenLog { file, id })
}

pub struct WatchedFileWriter<'a> {
    target: &'a WatchedFile,
}

impl Write for WatchedFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for WatchedFile {
    type Writer = WatchedFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        WatchedFileWriter { target: self }
    }
}
