//! Crash-safe single-file write and append primitives.
//!
//! Every file the store produces goes through [`AtomicWriter`]. Full
//! rewrites (caches, plan documents) use temp file + fsync + rename so a
//! reader only ever sees the old or the new content. Appends (event logs)
//! rely on append mode + fsync; a crash can leave at most a partial last
//! line, which the event log reader tolerates.

use crate::config::WriteConfig;
use crate::error::{Result, StoreError};
use std::fs::{self, File, OpenOptions};
use std::borrow::Cow;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::warn;

/// Maximum length of a sanitized error message.
const MAX_ERROR_LEN: usize = 200;

/// Writes and appends files with bounded retries.
#[derive(Debug, Clone, Default)]
pub struct AtomicWriter {
    config: WriteConfig,
}

impl AtomicWriter {
    /// Creates a writer with the given retry and permission policy.
    pub fn new(config: WriteConfig) -> Self {
        Self { config }
    }

    /// Returns the active write policy.
    pub fn config(&self) -> &WriteConfig {
        &self.config
    }

    /// Replaces `path` with `content` atomically.
    ///
    /// The temp file lives in the same directory as the target so the final
    /// rename never crosses a filesystem boundary. Parent directories are
    /// created as needed.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` with a sanitized message once all retries are
    /// exhausted. The temp file is removed after every failed attempt.
    pub fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.with_retry("write", path, || self.try_write(path, content))
    }

    /// Appends the `\n`-terminated record `content` to `path`, creating the
    /// file if missing, and returns the number of bytes added.
    ///
    /// Every attempt first checks for an unterminated last line (a crash, or
    /// an earlier attempt that failed mid-write) and starts the record on a
    /// fresh line, so a retry never merges with leftover bytes.
    ///
    /// Permissions are only applied when the file is newly created.
    pub fn append(&self, path: &Path, content: &[u8]) -> Result<u64> {
        self.with_retry("append", path, || self.try_append(path, content))
    }

    fn try_write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let parent = parent_dir(path);
        fs::create_dir_all(&parent)?;

        let tmp_path = temp_path_for(path);
        let result = (|| {
            {
                let mut file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&tmp_path)?;
                file.write_all(content)?;
                file.flush()?;
                file.sync_all()?;
            }
            set_mode(&tmp_path, self.config.file_mode)?;
            atomic_replace(&tmp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn try_append(&self, path: &Path, content: &[u8]) -> io::Result<u64> {
        fs::create_dir_all(parent_dir(path))?;

        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        if is_new {
            set_mode(path, self.config.file_mode)?;
        }

        let record: Cow<'_, [u8]> = if ends_with_partial_line(&mut file)? {
            warn!(path = %path.display(), "terminating partial last line before append");
            let mut buf = Vec::with_capacity(content.len() + 1);
            buf.push(b'\n');
            buf.extend_from_slice(content);
            Cow::Owned(buf)
        } else {
            Cow::Borrowed(content)
        };

        // one write call so concurrent O_APPEND writers never interleave
        file.write_all(&record)?;
        file.flush()?;
        file.sync_all()?;
        Ok(record.len() as u64)
    }

    fn with_retry<T>(
        &self,
        op: &str,
        path: &Path,
        mut attempt: impl FnMut() -> io::Result<T>,
    ) -> Result<T> {
        let mut retry = 0;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let reason = sanitize_error(&e, path);
                    if retry >= self.config.max_retries {
                        warn!(op, error = %reason, attempts = retry + 1, "giving up on file operation");
                        return Err(StoreError::WriteFailed(reason));
                    }
                    retry += 1;
                    let delay = self.config.backoff(retry);
                    warn!(
                        op,
                        error = %reason,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "file operation failed, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }
}

/// Renames `tmp` over `dst`, replacing any existing file.
///
/// POSIX `rename(2)` is atomic within a filesystem. On Windows the move uses
/// `MoveFileExW` with `MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH` so
/// the call does not return before the move is flushed.
#[cfg(not(windows))]
pub fn atomic_replace(tmp: &Path, dst: &Path) -> io::Result<()> {
    fs::rename(tmp, dst)?;

    // fsync parent directory so the rename itself survives a crash
    #[cfg(unix)]
    {
        if let Ok(dir_file) = File::open(parent_dir(dst)) {
            let _ = dir_file.sync_all();
        }
    }

    Ok(())
}

/// Renames `tmp` over `dst`, replacing any existing file.
#[cfg(windows)]
pub fn atomic_replace(tmp: &Path, dst: &Path) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{
        MoveFileExW, MOVEFILE_REPLACE_EXISTING, MOVEFILE_WRITE_THROUGH,
    };

    fn wide(path: &Path) -> Vec<u16> {
        path.as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }

    let from = wide(tmp);
    let to = wide(dst);
    let ok = unsafe {
        MoveFileExW(
            from.as_ptr(),
            to.as_ptr(),
            MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Reduces an I/O error to `"<kind>: <first line>"` without full paths.
pub fn sanitize_error(err: &io::Error, path: &Path) -> String {
    let message = err.to_string();
    let mut first = message.lines().next().unwrap_or_default().to_string();

    let full = path.display().to_string();
    if !full.is_empty() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        first = first.replace(&full, &name);
    }
    let parent = parent_dir(path).display().to_string();
    if parent.len() > 1 {
        first = first.replace(&parent, "<dir>");
    }

    let text = format!("{:?}: {}", err.kind(), first);
    match text.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

fn ends_with_partial_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    parent_dir(path).join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
