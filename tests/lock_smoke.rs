// Lock contention between table readers, writers, and foreign lock holders.
use std::fs::File;

use fs2::FileExt;
use tsvrec::api::{CodecOptions, ErrorKind, LineEnding, TsvFile, WriteMode};
use tsvrec::tsv_record;

#[derive(Debug, Default, PartialEq)]
struct Entry {
    id: u32,
    label: Option<String>,
}

tsv_record!(Entry { id, label });

fn table(path: &std::path::Path) -> TsvFile<Entry> {
    TsvFile::with_options(path, CodecOptions::new().with_line_ending(LineEnding::Lf))
        .expect("bind")
}

fn entries(n: u32) -> Vec<Entry> {
    (0..n)
        .map(|id| Entry {
            id,
            label: Some(format!("entry {id}")),
        })
        .collect()
}

#[test]
fn open_reader_blocks_writer_until_dropped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let table = table(&temp.path().join("entries.tsv"));
    table.write(entries(3), WriteMode::Overwrite).expect("write");

    let mut records = table.read().expect("read");
    assert_eq!(records.next().expect("first").expect("ok").id, 0);

    let err = table.write(entries(1), WriteMode::Append).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_eq!(err.path(), Some(table.path()));

    drop(records);
    table.write(entries(1), WriteMode::Append).expect("append after drop");
    assert_eq!(table.read().expect("read").count(), 4);
}

#[test]
fn foreign_exclusive_lock_blocks_reader_and_writer() {
    let temp = tempfile::tempdir().expect("tempdir");
    let table = table(&temp.path().join("entries.tsv"));
    table.write(entries(2), WriteMode::Overwrite).expect("write");

    let holder = File::open(table.path()).expect("open");
    FileExt::try_lock_exclusive(&holder).expect("lock");

    assert_eq!(table.read().unwrap_err().kind(), ErrorKind::Busy);
    assert_eq!(
        table.write(entries(1), WriteMode::Overwrite).unwrap_err().kind(),
        ErrorKind::Busy
    );

    FileExt::unlock(&holder).expect("unlock");
    let rows: Vec<Entry> = table
        .read()
        .expect("read")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(rows, entries(2));
}

#[test]
fn concurrent_readers_share_the_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let table = table(&temp.path().join("entries.tsv"));
    table.write(entries(5), WriteMode::Overwrite).expect("write");

    let first = table.read().expect("first reader");
    let second = table.read().expect("second reader");
    assert_eq!(first.zip(second).filter(|(a, b)| a.is_ok() && b.is_ok()).count(), 5);
}
