// Size-based log file rotation

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only log file that rolls over once it reaches `max_bytes`.
///
/// On rotation `app.log` becomes `app.log.1`, `app.log.1` becomes
/// `app.log.2` and so on; at most `backup_count` backups are kept. With a
/// `backup_count` of zero the active file is truncated instead.
///
/// Shared as `Arc<RotatingFile>`, which `tracing-subscriber` accepts as a
/// `MakeWriter` because `&RotatingFile` implements [`Write`].
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    state: Mutex<ActiveFile>,
}

#[derive(Debug)]
struct ActiveFile {
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: impl AsRef<Path>, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes: max_bytes.max(1),
            backup_count,
            state: Mutex::new(ActiveFile { file, written }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the n-th backup (1 is the most recent)
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&self, active: &mut ActiveFile) -> io::Result<()> {
        active.file.flush()?;

        if self.backup_count == 0 {
            active.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            active.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }

        fs::rename(&self.path, self.backup_path(1))?;
        active.file = open_append(&self.path)?;
        active.written = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "log file lock poisoned")
}

impl Write for &RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut active = self.state.lock().map_err(|_| poisoned())?;

        if active.written > 0 && active.written + buf.len() as u64 > self.max_bytes {
            self.rotate(&mut active)?;
        }

        let written = active.file.write(buf)?;
        active.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut active = self.state.lock().map_err(|_| poisoned())?;
        active.file.flush()
    }
}
