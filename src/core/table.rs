// Table file binding: record type + path + options, and scoped file locks.
use std::borrow::Borrow;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;

use crate::core::convert::{ConverterRegistry, ValueConverter};
use crate::core::error::{Error, io_error, lock_error_kind};
use crate::core::options::{CodecOptions, WriteMode};
use crate::core::reader::{self, Records};
use crate::core::schema::{Record, Schema};
use crate::core::writer::{self, WriteOutcome};

/// A record type bound to one table file.
///
/// The schema and converter registry live as long as the binding; the file
/// itself is only opened (and locked) for the duration of a `write` call or
/// while a `read` iterator is alive.
pub struct TsvFile<T: Record> {
    path: PathBuf,
    options: CodecOptions,
    schema: Arc<Schema<T>>,
    registry: ConverterRegistry,
}

impl<T: Record> TsvFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Self::with_options(path, CodecOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: CodecOptions) -> Result<Self, Error> {
        let schema = Schema::<T>::derive()?;
        Ok(Self {
            path: path.into(),
            options,
            schema,
            registry: ConverterRegistry::with_defaults(),
        })
    }

    /// Register a converter for `V`, replacing any default or earlier one.
    pub fn register_converter<V: 'static>(
        &mut self,
        converter: impl ValueConverter<V> + 'static,
    ) -> &mut Self {
        self.registry.register::<V>(converter);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn schema(&self) -> &Schema<T> {
        &self.schema
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Filesystem metadata for the bound path, `None` when it does not exist.
    pub fn metadata(&self) -> Result<Option<Metadata>, Error> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(err, &self.path, "failed to stat table file")),
        }
    }

    /// Write `records` in order; see [`WriteMode`] for header handling.
    pub fn write<I>(&self, records: I, mode: WriteMode) -> Result<WriteOutcome, Error>
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let columns = self.schema.bind(&self.registry)?;
        writer::write_records(
            &self.path,
            &self.options,
            &self.schema,
            &columns,
            records,
            mode,
        )
    }

    /// Lazily read records back. Each call reopens the file from the start.
    pub fn read(&self) -> Result<Records<T>, Error> {
        let columns = self.schema.bind(&self.registry)?;
        reader::open_records(&self.path, &self.schema, &columns)
    }
}

impl<T: Record> std::fmt::Debug for TsvFile<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsvFile")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("schema", &self.schema)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Length of the file at `path`, `None` when it does not exist.
pub(crate) fn existing_len(path: &Path) -> Result<Option<u64>, Error> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(err, path, "failed to stat table file")),
    }
}

/// An open file holding an advisory lock until dropped.
#[derive(Debug)]
pub(crate) struct LockedFile {
    file: File,
}

impl LockedFile {
    /// Exclusive access for writers; fails with `Busy` instead of waiting.
    pub(crate) fn exclusive(file: File, path: &Path) -> Result<Self, Error> {
        FileExt::try_lock_exclusive(&file).map_err(|err| lock_error(err, path))?;
        Ok(Self { file })
    }

    /// Shared access for readers; fails with `Busy` while a writer holds the file.
    pub(crate) fn shared(file: File, path: &Path) -> Result<Self, Error> {
        FileExt::try_lock_shared(&file).map_err(|err| lock_error(err, path))?;
        Ok(Self { file })
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_error(err: io::Error, path: &Path) -> Error {
    Error::new(lock_error_kind(&err))
        .with_message("table file is locked by another reader or writer")
        .with_path(path)
        .with_source(err)
}
