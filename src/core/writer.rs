// Streams records to a table file: optional header, then one escaped line per record.
use std::borrow::Borrow;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::core::error::{Error, ErrorKind, io_error};
use crate::core::escape;
use crate::core::options::{CodecOptions, WriteMode};
use crate::core::reader::read_header_line;
use crate::core::schema::{BoundColumn, Schema};
use crate::core::table::LockedFile;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteOutcome {
    /// Mode actually used; an append onto a missing or empty file becomes an overwrite.
    pub mode: WriteMode,
    pub header_written: bool,
    pub rows: u64,
}

pub(crate) fn write_records<T, I>(
    path: &Path,
    options: &CodecOptions,
    schema: &Schema<T>,
    columns: &[BoundColumn<T>],
    records: I,
    mode: WriteMode,
) -> Result<WriteOutcome, Error>
where
    T: 'static,
    I: IntoIterator,
    I::Item: Borrow<T>,
{
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|err| io_error(err, path, "failed to open table file for writing"))?;
    let locked = LockedFile::exclusive(file, path)?;

    let existing = locked
        .file()
        .metadata()
        .map_err(|err| io_error(err, path, "failed to stat table file"))?
        .len();
    let mode = match mode {
        WriteMode::Append if existing == 0 => {
            tracing::debug!(path = %path.display(), "append onto empty table, writing header");
            WriteMode::Overwrite
        }
        other => other,
    };

    let mut handle: &File = locked.file();
    match mode {
        WriteMode::Overwrite => {
            handle
                .set_len(0)
                .map_err(|err| io_error(err, path, "failed to truncate table file"))?;
            handle
                .seek(SeekFrom::Start(0))
                .map_err(|err| io_error(err, path, "failed to seek table file"))?;
        }
        WriteMode::Append => {
            if options.verify_append_header {
                verify_header(handle, path, schema)?;
            }
        }
    }

    let eol = options.line_ending.as_str();
    let unterminated = mode == WriteMode::Append && !ends_with_newline(handle, path)?;
    let mut out = BufWriter::new(handle);
    if unterminated {
        tracing::debug!(path = %path.display(), "terminating last line before append");
        out.write_all(eol.as_bytes())
            .map_err(|err| io_error(err, path, "failed to write record"))?;
    }
    let header_written = mode == WriteMode::Overwrite;
    if header_written {
        let header = format!(
            "{}{}{}",
            options.encoding.preamble(),
            schema.header_line(),
            eol
        );
        out.write_all(header.as_bytes())
            .map_err(|err| io_error(err, path, "failed to write header"))?;
    }

    let mut line = String::new();
    let mut rows = 0u64;
    for record in records {
        let record = record.borrow();
        line.clear();
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                line.push('\t');
            }
            let text = column.cell.write_text(record).map_err(|err| {
                err.with_column(column.name.clone())
                    .with_path(path)
                    .with_hint(format!("while writing record #{}", rows + 1))
            })?;
            line.push_str(&escape::encode(&text));
        }
        line.push_str(eol);
        out.write_all(line.as_bytes())
            .map_err(|err| io_error(err, path, "failed to write record"))?;
        rows += 1;
    }
    out.flush()
        .map_err(|err| io_error(err, path, "failed to flush table file"))?;

    tracing::debug!(
        path = %path.display(),
        mode = ?mode,
        rows,
        "wrote table records"
    );
    Ok(WriteOutcome {
        mode,
        header_written,
        rows,
    })
}

/// Whether the last byte of a non-empty file is `\n`; leaves the cursor at the end.
fn ends_with_newline(mut file: &File, path: &Path) -> Result<bool, Error> {
    let seek_error = |err: std::io::Error| io_error(err, path, "failed to seek table file");
    file.seek(SeekFrom::End(-1)).map_err(seek_error)?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)
        .map_err(|err| io_error(err, path, "failed to read table file"))?;
    file.seek(SeekFrom::End(0)).map_err(seek_error)?;
    Ok(last[0] == b'\n')
}

fn verify_header<T: 'static>(file: &File, path: &Path, schema: &Schema<T>) -> Result<(), Error> {
    let mut reader = BufReader::new(file);
    let header = read_header_line(&mut reader, path)?.unwrap_or_default();
    let found: Vec<&str> = header.split('\t').collect();
    let expected: Vec<&str> = schema.names().collect();
    if found == expected {
        return Ok(());
    }

    let mismatch = (0..found.len().max(expected.len()))
        .find(|&i| found.get(i) != expected.get(i))
        .unwrap_or(0);
    let column = found
        .get(mismatch)
        .or_else(|| expected.get(mismatch))
        .copied()
        .unwrap_or_default();
    Err(Error::new(ErrorKind::Format)
        .with_message(format!(
            "existing header does not match record schema at position {mismatch}"
        ))
        .with_column(column)
        .with_path(path)
        .with_line(1)
        .with_hint("overwrite the file or append to one written for this record type"))
}
