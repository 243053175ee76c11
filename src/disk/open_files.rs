use std::sync::Arc;

use parking_lot::Mutex;

/// Default cap on concurrently open file handles across all adaptors.
pub const DEFAULT_MAX_OPEN_FILES: usize = 100;

/// Global budget of concurrently open file handles.
///
/// Shared (via `Arc`) between every adaptor of an engine. Before opening a
/// file an adaptor reserves a slot with [`ensure_max_open_file_limit`] and
/// closes some of its own open entries when the reservation pushes the
/// count over budget.
///
/// [`ensure_max_open_file_limit`]: OpenedFileCounter::ensure_max_open_file_limit
pub struct OpenedFileCounter {
    max_open_files: usize,
    num_open: Mutex<usize>,
}

impl OpenedFileCounter {
    pub fn new(max_open_files: usize) -> Arc<Self> {
        Arc::new(Self {
            max_open_files,
            num_open: Mutex::new(0),
        })
    }

    /// Reserves slots for `num_new_files` opens and returns how many
    /// currently open files must be closed first to stay within budget.
    pub fn ensure_max_open_file_limit(&self, num_new_files: usize) -> usize {
        let mut n = self.num_open.lock();
        *n += num_new_files;
        n.saturating_sub(self.max_open_files)
    }

    /// Records that `num_close_files` files were closed (or a reservation
    /// was abandoned).
    pub fn reduce_num_of_opened_file(&self, num_close_files: usize) {
        let mut n = self.num_open.lock();
        *n = n.saturating_sub(num_close_files);
    }

    pub fn num_open(&self) -> usize {
        *self.num_open.lock()
    }

    pub fn max_open_files(&self) -> usize {
        self.max_open_files
    }
}
