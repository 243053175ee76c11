use std::path::PathBuf;

use tempfile::TempDir;

use super::*;

fn entries3() -> Vec<FileEntry> {
    vec![
        FileEntry::new(PathBuf::from("file1"), 15, 0),
        FileEntry::new(PathBuf::from("file2"), 7, 15),
        FileEntry::new(PathBuf::from("file3"), 3, 22),
    ]
}

#[tokio::test]
async fn test_write_read_across_file_boundaries() {
    let dir = TempDir::new().unwrap();
    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.open_file().await.unwrap();

    let data = b"1234567890ABCDEFGHIJKLMNO";
    adaptor.write_data(data, 0).await.unwrap();
    adaptor.close_file().await;

    assert_eq!(
        std::fs::read(dir.path().join("file1")).unwrap(),
        b"1234567890ABCDE"
    );
    assert_eq!(std::fs::read(dir.path().join("file2")).unwrap(), b"FGHIJKL");
    assert_eq!(std::fs::read(dir.path().join("file3")).unwrap(), b"MNO");

    adaptor.open_existing_file().await.unwrap();
    let mut buf = [0u8; 25];
    let n = adaptor.read_data(&mut buf, 0).await.unwrap();
    assert_eq!(n, 25);
    assert_eq!(&buf, data);

    // A read crossing both boundaries.
    let mut buf = [0u8; 12];
    let n = adaptor.read_data(&mut buf, 12).await.unwrap();
    assert_eq!(n, 12);
    assert_eq!(&buf, b"CDEFGHIJKLMN");
    adaptor.close_file().await;
}

#[tokio::test]
async fn test_write_at_offset_spanning_boundary() {
    let dir = TempDir::new().unwrap();
    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.init_and_open_file().await.unwrap();

    adaptor.write_data(b"XXXXX", 13).await.unwrap();

    let mut buf = [0u8; 5];
    adaptor.read_data(&mut buf, 13).await.unwrap();
    assert_eq!(&buf, b"XXXXX");

    // Bytes before the write are zero fill from file creation growth.
    let mut head = [0u8; 13];
    let n = adaptor.read_data(&mut head, 0).await.unwrap();
    assert_eq!(n, 13);
    assert!(head.iter().all(|&b| b == 0));
    adaptor.close_file().await;
}

#[tokio::test]
async fn test_offset_past_end_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.open_file().await.unwrap();

    let err = adaptor.write_data(b"x", 25).await.unwrap_err();
    assert!(matches!(err, DiskError::OffsetOutOfRange { .. }));

    let mut buf = [0u8; 1];
    let err = adaptor.read_data(&mut buf, 25).await.unwrap_err();
    assert!(matches!(err, DiskError::OffsetOutOfRange { .. }));

    // Writes running past the last file also fail.
    let err = adaptor.write_data(b"12345", 23).await.unwrap_err();
    assert!(matches!(err, DiskError::OffsetOutOfRange { .. }));
    adaptor.close_file().await;
}

#[tokio::test]
async fn test_short_read_reports_partial_count() {
    let dir = TempDir::new().unwrap();
    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.open_file().await.unwrap();
    adaptor.write_data(b"1234567890ABCDEFGHIJKLMNO", 0).await.unwrap();

    let mut buf = [0u8; 10];
    let n = adaptor.read_data(&mut buf, 20).await.unwrap();
    assert_eq!(n, 5);
    assert_eq!(&buf[..n], b"KLMNO");
    adaptor.close_file().await;
}

#[tokio::test]
async fn test_read_range_returns_owned_bytes() {
    let dir = TempDir::new().unwrap();
    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.open_file().await.unwrap();
    adaptor.write_data(b"1234567890ABCDEFGHIJKLMNO", 0).await.unwrap();

    let bytes = adaptor.read_range(12, 6).await.unwrap();
    assert_eq!(&bytes[..], b"CDEFGH");

    // Clamped at the logical end.
    let bytes = adaptor.read_range(22, 10).await.unwrap();
    assert_eq!(&bytes[..], b"MNO");
    adaptor.close_file().await;
}

#[tokio::test]
async fn test_shared_piece_marks_neighbors() {
    let dir = TempDir::new().unwrap();
    let entries = vec![
        FileEntry::new(PathBuf::from("a"), 2000, 0).with_requested(false),
        FileEntry::new(PathBuf::from("b"), 3000, 2000),
        FileEntry::new(PathBuf::from("c"), 0, 5000).with_requested(false),
        FileEntry::new(PathBuf::from("d"), 10, 5000).with_requested(false),
        FileEntry::new(PathBuf::from("e"), 2000, 5010).with_requested(false),
        FileEntry::new(PathBuf::from("f"), 158, 7010),
        FileEntry::new(PathBuf::from("g"), 5000, 7168).with_requested(false),
    ];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 1024).unwrap();
    adaptor.open_existing_file().await.unwrap();

    let entries = adaptor.disk_writer_entries();

    // b's first piece starts at 1024 inside a; its last piece ends at 5120
    // and spills into c, d and e. f's first piece starts at 6144 inside e.
    let needs_allocation: Vec<bool> =
        entries.iter().map(|e| e.needs_file_allocation()).collect();
    assert_eq!(
        needs_allocation,
        [true, true, false, false, true, true, false]
    );

    let needs_writer: Vec<bool> = entries.iter().map(|e| e.needs_disk_writer()).collect();
    assert_eq!(
        needs_writer,
        [false, false, true, true, true, false, false]
    );

    let has_writer: Vec<bool> = entries.iter().map(|e| e.has_disk_writer()).collect();
    assert_eq!(has_writer, [true, true, true, true, true, true, false]);
}

#[tokio::test]
async fn test_zero_piece_length_disables_sharing() {
    let dir = TempDir::new().unwrap();
    let entries = vec![
        FileEntry::new(PathBuf::from("a"), 100, 0).with_requested(false),
        FileEntry::new(PathBuf::from("b"), 100, 100),
        FileEntry::new(PathBuf::from("c"), 100, 200).with_requested(false),
    ];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0).unwrap();
    adaptor.open_existing_file().await.unwrap();

    let entries = adaptor.disk_writer_entries();
    assert!(!entries[0].has_disk_writer());
    assert!(entries[1].has_disk_writer());
    assert!(entries[1].needs_file_allocation());
    assert!(!entries[2].has_disk_writer());
}

#[tokio::test]
async fn test_existing_file_gets_writer_even_when_unrequested() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a"), b"stale").unwrap();

    let entries = vec![
        FileEntry::new(PathBuf::from("a"), 100, 0).with_requested(false),
        FileEntry::new(PathBuf::from("b"), 100, 100),
    ];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0).unwrap();
    adaptor.open_existing_file().await.unwrap();

    assert!(adaptor.disk_writer_entries()[0].has_disk_writer());
}

#[tokio::test]
async fn test_open_file_budget_is_respected() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<FileEntry> = (0..5)
        .map(|i| FileEntry::new(PathBuf::from(format!("f{i}")), 10, i * 10))
        .collect();
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0)
        .unwrap()
        .with_max_open_files(2);
    adaptor.open_file().await.unwrap();
    assert!(adaptor.num_open() <= 2);

    let data = vec![7u8; 50];
    adaptor.write_data(&data, 0).await.unwrap();
    assert!(adaptor.num_open() <= 2);
    assert!(adaptor.open_file_counter().num_open() <= 2);

    let mut buf = vec![0u8; 50];
    let n = adaptor.read_data(&mut buf, 0).await.unwrap();
    assert_eq!(n, 50);
    assert_eq!(buf, data);

    adaptor.close_file().await;
    assert_eq!(adaptor.open_file_counter().num_open(), 0);

    // Idempotent.
    adaptor.close_file().await;
    assert_eq!(adaptor.open_file_counter().num_open(), 0);
}

#[tokio::test]
async fn test_missing_writer_in_span_is_an_error() {
    let dir = TempDir::new().unwrap();
    let entries = vec![
        FileEntry::new(PathBuf::from("a"), 5, 0),
        FileEntry::new(PathBuf::from("b"), 5, 5).with_requested(false),
        FileEntry::new(PathBuf::from("c"), 5, 10),
    ];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0).unwrap();
    adaptor.open_file().await.unwrap();

    let err = adaptor.write_data(&[0u8; 15], 0).await.unwrap_err();
    assert!(matches!(err, DiskError::NoDiskWriter(_)));
    adaptor.close_file().await;
}

#[tokio::test]
async fn test_cut_trailing_garbage() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("file1"), vec![9u8; 20]).unwrap();

    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.open_existing_file().await.unwrap();
    adaptor.cut_trailing_garbage().await.unwrap();
    adaptor.close_file().await;

    assert_eq!(
        std::fs::metadata(dir.path().join("file1")).unwrap().len(),
        15
    );
}

#[tokio::test]
async fn test_size_sums_on_disk_lengths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("file1"), vec![1u8; 15]).unwrap();
    std::fs::write(dir.path().join("file2"), vec![1u8; 4]).unwrap();

    let mut adaptor =
        MultiDiskAdaptor::new(dir.path().to_path_buf(), entries3(), 1024).unwrap();
    adaptor.open_existing_file().await.unwrap();
    assert_eq!(adaptor.size().await.unwrap(), 19);
}

#[tokio::test]
async fn test_allocation_iterator_fills_requested_files() {
    let dir = TempDir::new().unwrap();
    let entries = vec![
        FileEntry::new(PathBuf::from("q1"), 300_000, 0),
        FileEntry::new(PathBuf::from("q2"), 100, 300_000).with_requested(false),
        FileEntry::new(PathBuf::from("q3"), 200, 300_100),
    ];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0).unwrap();
    adaptor.open_file().await.unwrap();

    {
        let mut it = adaptor.file_allocation_iterator();
        while !it.finished() {
            it.allocate_chunk().await.unwrap();
        }
    }
    adaptor.close_file().await;

    assert_eq!(
        std::fs::metadata(dir.path().join("q1")).unwrap().len(),
        300_000
    );
    assert_eq!(std::fs::metadata(dir.path().join("q3")).unwrap().len(), 200);
    assert!(!dir.path().join("q2").exists());
}

#[tokio::test]
async fn test_allocation_iterator_is_resumable() {
    let dir = TempDir::new().unwrap();
    let entries = vec![FileEntry::new(PathBuf::from("big"), 600_000, 0)];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0).unwrap();
    adaptor.open_file().await.unwrap();

    {
        let mut it = adaptor.file_allocation_iterator();
        it.allocate_chunk().await.unwrap();
        assert!(!it.finished());
    }

    // Interrupted run; a fresh iterator picks up from the on-disk size.
    {
        let mut it = adaptor.file_allocation_iterator();
        while !it.finished() {
            it.allocate_chunk().await.unwrap();
        }
    }
    adaptor.close_file().await;

    assert_eq!(
        std::fs::metadata(dir.path().join("big")).unwrap().len(),
        600_000
    );
}

#[tokio::test]
async fn test_trunc_allocation_extends_sparse() {
    let dir = TempDir::new().unwrap();
    let entries = vec![FileEntry::new(PathBuf::from("sparse"), 100_000, 0)];
    let mut adaptor = MultiDiskAdaptor::new(dir.path().to_path_buf(), entries, 0)
        .unwrap()
        .with_allocation_method(AllocationMethod::Trunc);
    adaptor.open_file().await.unwrap();

    {
        let mut it = adaptor.file_allocation_iterator();
        while !it.finished() {
            it.allocate_chunk().await.unwrap();
        }
    }
    adaptor.close_file().await;

    assert_eq!(
        std::fs::metadata(dir.path().join("sparse")).unwrap().len(),
        100_000
    );
}

#[test]
fn test_rejects_parent_dir_components() {
    let entries = vec![FileEntry::new(PathBuf::from("../evil"), 10, 0)];
    let err = MultiDiskAdaptor::new(PathBuf::from("/tmp"), entries, 0)
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, DiskError::PathTraversal(_)));
}

#[test]
fn test_rejects_gapped_layout() {
    let entries = vec![
        FileEntry::new(PathBuf::from("a"), 10, 0),
        FileEntry::new(PathBuf::from("b"), 10, 15),
    ];
    let err = MultiDiskAdaptor::new(PathBuf::from("/tmp"), entries, 0)
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, DiskError::InvalidFileLayout { .. }));
}
