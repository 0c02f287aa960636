//! Purpose: Define the stable public Rust API boundary for tsvrec.
//! Exports: Record schemas, value converters, codec options, table reader/writer.
//! Role: Public, additive-only surface; hides internal codec modules.
//! Invariants: This module is the only public path to codec primitives.
//! Invariants: Internal modules remain private and are not directly exposed.

pub use crate::core::convert::{
    ConverterRegistry, ParseConverter, QuotedStringConverter, Rfc3339Converter, ValueConverter,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::escape;
pub use crate::core::options::{CodecOptions, LineEnding, TextEncoding, WriteMode};
pub use crate::core::reader::{Records, Rows};
pub use crate::core::schema::{
    ColumnDescriptor, MemberOptions, Record, Schema, SchemaBuilder,
};
pub use crate::core::table::TsvFile;
pub use crate::core::writer::WriteOutcome;
