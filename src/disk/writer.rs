use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::error::DiskError;

/// Offset-addressed access to a single physical file.
///
/// Implementations own the open/close lifecycle of one file handle. All
/// offsets are relative to the start of that file. Writes must fully
/// complete or fail; reads may return short counts when the file ends
/// before the requested length.
#[async_trait]
pub trait DiskWriter: Send {
    /// Opens the file, truncating any existing content.
    async fn init_and_open_file(&mut self) -> Result<(), DiskError>;

    /// Opens the file, creating it if missing. Existing content is kept.
    async fn open_file(&mut self) -> Result<(), DiskError>;

    /// Opens the file, failing if it does not exist.
    async fn open_existing_file(&mut self) -> Result<(), DiskError>;

    /// Closes the file handle. Idempotent.
    async fn close_file(&mut self);

    /// Writes all of `data` at `offset`.
    async fn write_data(&mut self, data: &[u8], offset: u64) -> Result<(), DiskError>;

    /// Reads into `buf` from `offset`, returning the number of bytes read.
    /// A count shorter than `buf.len()` means the file ended.
    async fn read_data(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, DiskError>;

    /// Truncates (or extends, with zero fill) the file to `length` bytes.
    async fn truncate(&mut self, length: u64) -> Result<(), DiskError>;

    /// Reserves `length` bytes starting at `offset`. With `sparse` the
    /// reservation only extends the file size; otherwise backing blocks
    /// are requested from the filesystem where the platform supports it.
    async fn allocate(&mut self, offset: u64, length: u64, sparse: bool) -> Result<(), DiskError>;

    /// Current on-disk size.
    async fn size(&self) -> Result<u64, DiskError>;

    /// Hints the OS to drop cached pages for the given range. Best effort.
    async fn drop_cache(&mut self, length: u64, offset: u64);

    /// Flushes OS write buffers for this file.
    async fn flush_os_buffers(&mut self) -> Result<(), DiskError>;

    /// Whether the file is currently open.
    fn is_open(&self) -> bool;
}

/// [`DiskWriter`] backed by a lazily opened [`tokio::fs::File`].
pub struct DefaultDiskWriter {
    path: PathBuf,
    file: Option<File>,
    read_only: bool,
}

impl DefaultDiskWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            read_only: false,
        }
    }

    /// Opens future handles read-only. Writes will fail at the OS level.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> Result<&mut File, DiskError> {
        self.file
            .as_mut()
            .ok_or_else(|| DiskError::WriterNotOpened(self.path.display().to_string()))
    }

    async fn ensure_parent_dirs(path: &Path) -> Result<(), DiskError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn open_with(&mut self, create: bool, truncate: bool) -> Result<(), DiskError> {
        if create {
            Self::ensure_parent_dirs(&self.path).await?;
        }
        let file = OpenOptions::new()
            .create(create && !self.read_only)
            .read(true)
            .write(!self.read_only)
            .truncate(truncate && !self.read_only)
            .open(&self.path)
            .await?;
        self.file = Some(file);
        Ok(())
    }
}

#[async_trait]
impl DiskWriter for DefaultDiskWriter {
    async fn init_and_open_file(&mut self) -> Result<(), DiskError> {
        self.open_with(true, true).await
    }

    async fn open_file(&mut self) -> Result<(), DiskError> {
        self.open_with(true, false).await
    }

    async fn open_existing_file(&mut self) -> Result<(), DiskError> {
        self.open_with(false, false).await.map_err(|e| match e {
            DiskError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DiskError::FileNotFound(self.path.display().to_string())
            }
            other => other,
        })
    }

    async fn close_file(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_data().await;
        }
    }

    async fn write_data(&mut self, data: &[u8], offset: u64) -> Result<(), DiskError> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn read_data(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, DiskError> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut total = 0;
        while total < buf.len() {
            let n = file.read(&mut buf[total..]).await?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    async fn truncate(&mut self, length: u64) -> Result<(), DiskError> {
        let file = self.file_mut()?;
        file.set_len(length).await?;
        Ok(())
    }

    async fn allocate(&mut self, offset: u64, length: u64, sparse: bool) -> Result<(), DiskError> {
        if length == 0 {
            return Ok(());
        }
        let file = self.file_mut()?;
        if sparse {
            let end = offset + length;
            if file.metadata().await?.len() < end {
                file.set_len(end).await?;
            }
            return Ok(());
        }

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            let ret = unsafe {
                libc::posix_fallocate(
                    file.as_raw_fd(),
                    offset as libc::off_t,
                    length as libc::off_t,
                )
            };
            if ret != 0 {
                return Err(DiskError::Io(std::io::Error::from_raw_os_error(ret)));
            }
            Ok(())
        }

        #[cfg(not(target_os = "linux"))]
        {
            let end = offset + length;
            if file.metadata().await?.len() < end {
                file.set_len(end).await?;
            }
            Ok(())
        }
    }

    async fn size(&self) -> Result<u64, DiskError> {
        match &self.file {
            Some(file) => Ok(file.metadata().await?.len()),
            None => Ok(tokio::fs::metadata(&self.path).await?.len()),
        }
    }

    async fn drop_cache(&mut self, length: u64, offset: u64) {
        #[cfg(target_os = "linux")]
        if let Some(file) = &self.file {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::posix_fadvise(
                    file.as_raw_fd(),
                    offset as libc::off_t,
                    length as libc::off_t,
                    libc::POSIX_FADV_DONTNEED,
                );
            }
        }
        #[cfg(not(target_os = "linux"))]
        let _ = (length, offset);
    }

    async fn flush_os_buffers(&mut self) -> Result<(), DiskError> {
        if let Some(file) = &self.file {
            file.sync_data().await?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}
