//! Purpose: Lazily decode table files back into records or raw cells.
//! Exports: `Records` (typed rows), `Rows` (decoded cells keyed by the header).
//! Role: Read side of `TsvFile`; also backs the CLI `header` and `dump` commands.
//! Invariants: A missing or zero-length file yields nothing and is never opened.
//! Invariants: The shared lock is held until the iterator ends, fails, or is dropped.
//! Invariants: After the first error the iterator is fused and the file released.
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind, io_error};
use crate::core::escape;
use crate::core::options::BOM;
use crate::core::schema::{BoundColumn, Schema};
use crate::core::table::{LockedFile, existing_len};

/// First line of `reader` with any byte-order mark and line terminator removed.
pub(crate) fn read_header_line<R: BufRead>(
    reader: &mut R,
    path: &Path,
) -> Result<Option<String>, Error> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|err| read_error(err, path, 1))?;
    if read == 0 {
        return Ok(None);
    }
    let header = line.strip_prefix(BOM).unwrap_or(&line);
    Ok(Some(strip_line_ending(header).to_string()))
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn read_error(err: io::Error, path: &Path, line: u64) -> Error {
    if err.kind() == io::ErrorKind::InvalidData {
        return Error::new(ErrorKind::Format)
            .with_message("line is not valid UTF-8")
            .with_path(path)
            .with_line(line)
            .with_source(err);
    }
    io_error(err, path, "failed to read table file").with_line(line)
}

struct LineReader {
    reader: BufReader<LockedFile>,
    path: PathBuf,
    buf: String,
    line_no: u64,
}

impl LineReader {
    /// Open and share-lock `path`, returning the reader and its header line.
    fn open(path: &Path) -> Result<Option<(Self, String)>, Error> {
        match existing_len(path)? {
            None | Some(0) => {
                tracing::debug!(path = %path.display(), "table missing or empty");
                return Ok(None);
            }
            Some(_) => {}
        }
        let file =
            File::open(path).map_err(|err| io_error(err, path, "failed to open table file"))?;
        let mut reader = BufReader::new(LockedFile::shared(file, path)?);
        let Some(header) = read_header_line(&mut reader, path)? else {
            return Ok(None);
        };
        let lines = Self {
            reader,
            path: path.to_path_buf(),
            buf: String::new(),
            line_no: 1,
        };
        Ok(Some((lines, header)))
    }

    /// Next data line without its terminator, with its 1-based line number.
    fn next_line(&mut self) -> Result<Option<(u64, &str)>, Error> {
        self.buf.clear();
        let line_no = self.line_no + 1;
        let read = self
            .reader
            .read_line(&mut self.buf)
            .map_err(|err| read_error(err, &self.path, line_no))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no = line_no;
        Ok(Some((line_no, strip_line_ending(&self.buf))))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

struct RecordStream<T> {
    lines: LineReader,
    /// Column bound to each header position, in header order.
    columns: Vec<BoundColumn<T>>,
}

/// Lazy sequence of records from one pass over a table file.
///
/// Not restartable: a second pass needs a fresh `TsvFile::read`.
pub struct Records<T> {
    stream: Option<RecordStream<T>>,
}

impl<T> Records<T> {
    pub fn empty() -> Self {
        Self { stream: None }
    }

    /// Header column names, in file order. Empty for a missing or empty file.
    pub fn header(&self) -> Vec<&str> {
        self.stream
            .as_ref()
            .map(|stream| stream.columns.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }
}

pub(crate) fn open_records<T: 'static>(
    path: &Path,
    schema: &Schema<T>,
    columns: &[BoundColumn<T>],
) -> Result<Records<T>, Error> {
    let Some((lines, header)) = LineReader::open(path)? else {
        return Ok(Records::empty());
    };

    let mut mapped = Vec::new();
    for name in header.split('\t') {
        let Some(column) = schema.column(name) else {
            return Err(Error::new(ErrorKind::Format)
                .with_message("header column has no matching record member")
                .with_column(name)
                .with_path(path)
                .with_line(1)
                .with_hint("rename or add the member, or read with a matching record type"));
        };
        mapped.push(columns[column.position()].clone());
    }
    tracing::debug!(path = %path.display(), columns = mapped.len(), "opened table for reading");

    Ok(Records {
        stream: Some(RecordStream {
            lines,
            columns: mapped,
        }),
    })
}

fn decode_record<T: Default>(text: &str, columns: &[BoundColumn<T>]) -> Result<T, Error> {
    let mut record = T::default();
    for (cell, column) in text.split('\t').zip(columns) {
        column
            .cell
            .read_text(&mut record, &escape::decode(cell))
            .map_err(|err| err.with_column(column.name.clone()))?;
    }
    Ok(record)
}

impl<T: Default> Iterator for Records<T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream.as_mut()?;
        let result = match stream.lines.next_line() {
            Ok(Some((line, text))) => {
                Some(decode_record(text, &stream.columns).map_err(|err| err.with_line(line)))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        };
        let result = result.map(|item| item.map_err(|err| err.or_path(stream.lines.path())));
        if !matches!(result, Some(Ok(_))) {
            self.stream = None;
        }
        result
    }
}

impl<T: Default> FusedIterator for Records<T> {}

impl<T> fmt::Debug for Records<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records")
            .field("path", &self.stream.as_ref().map(|s| s.lines.path()))
            .field("header", &self.header())
            .finish()
    }
}

/// Schema-free view of a table: header names plus escape-decoded cells.
pub struct Rows {
    header: Vec<String>,
    lines: Option<LineReader>,
}

impl Rows {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        Ok(match LineReader::open(path)? {
            Some((lines, header)) => Self {
                header: header.split('\t').map(str::to_string).collect(),
                lines: Some(lines),
            },
            None => Self {
                header: Vec::new(),
                lines: None,
            },
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl Iterator for Rows {
    type Item = Result<Vec<String>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        let result = match lines.next_line() {
            Ok(Some((_, text))) => Some(Ok(text
                .split('\t')
                .map(|cell| escape::decode(cell).into_owned())
                .collect())),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        };
        if !matches!(result, Some(Ok(_))) {
            self.lines = None;
        }
        result
    }
}

impl FusedIterator for Rows {}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("header", &self.header)
            .field("open", &self.lines.is_some())
            .finish()
    }
}
