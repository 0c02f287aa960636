// Codec internals: errors, escaping, converters, schemas, and table I/O.
pub mod convert;
pub mod error;
pub mod escape;
pub mod options;
pub mod reader;
pub mod schema;
pub mod table;
pub mod writer;
