// Per-type text converters and the registry that resolves them for columns.
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::error::{Error, ErrorKind};

/// Bidirectional text mapping for one value type.
pub trait ValueConverter<V>: Send + Sync {
    fn to_text(&self, value: &V) -> Result<String, Error>;
    fn from_text(&self, text: &str) -> Result<V, Error>;
}

pub(crate) type SharedConverter<V> = Arc<dyn ValueConverter<V>>;

/// Converter built on a type's own `Display`/`FromStr` pair.
pub struct ParseConverter<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> ParseConverter<V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for ParseConverter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ValueConverter<V> for ParseConverter<V>
where
    V: FromStr + Display,
    V::Err: Display,
{
    fn to_text(&self, value: &V) -> Result<String, Error> {
        Ok(value.to_string())
    }

    fn from_text(&self, text: &str) -> Result<V, Error> {
        text.parse::<V>().map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message(format!("invalid value {text:?}: {err}"))
                .with_value_type(type_name::<V>())
        })
    }
}

/// Quote-wrapped string form: `None` is the empty cell, `Some(s)` is `"s"`.
///
/// Keeps an absent string distinguishable from an empty one on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuotedStringConverter;

impl QuotedStringConverter {
    fn wrap(value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        out.push_str(value);
        out.push('"');
        out
    }

    fn unwrap(text: &str) -> Result<String, Error> {
        text.strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new(ErrorKind::Parse)
                    .with_message(format!("string cell is not quote-wrapped: {text:?}"))
                    .with_value_type(type_name::<String>())
            })
    }
}

impl ValueConverter<Option<String>> for QuotedStringConverter {
    fn to_text(&self, value: &Option<String>) -> Result<String, Error> {
        Ok(value.as_deref().map(Self::wrap).unwrap_or_default())
    }

    fn from_text(&self, text: &str) -> Result<Option<String>, Error> {
        if text.is_empty() {
            return Ok(None);
        }
        Self::unwrap(text).map(Some)
    }
}

impl ValueConverter<String> for QuotedStringConverter {
    fn to_text(&self, value: &String) -> Result<String, Error> {
        Ok(Self::wrap(value))
    }

    fn from_text(&self, text: &str) -> Result<String, Error> {
        if text.is_empty() {
            return Ok(String::new());
        }
        Self::unwrap(text)
    }
}

/// RFC 3339 timestamps with their UTC offset preserved.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rfc3339Converter;

impl ValueConverter<OffsetDateTime> for Rfc3339Converter {
    fn to_text(&self, value: &OffsetDateTime) -> Result<String, Error> {
        value.format(&Rfc3339).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message("timestamp is not representable as RFC 3339")
                .with_value_type(type_name::<OffsetDateTime>())
                .with_source(err)
        })
    }

    fn from_text(&self, text: &str) -> Result<OffsetDateTime, Error> {
        OffsetDateTime::parse(text, &Rfc3339).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message(format!("invalid RFC 3339 timestamp {text:?}"))
                .with_value_type(type_name::<OffsetDateTime>())
                .with_source(err)
        })
    }
}

impl ValueConverter<Option<OffsetDateTime>> for Rfc3339Converter {
    fn to_text(&self, value: &Option<OffsetDateTime>) -> Result<String, Error> {
        match value {
            Some(value) => ValueConverter::<OffsetDateTime>::to_text(self, value),
            None => Ok(String::new()),
        }
    }

    fn from_text(&self, text: &str) -> Result<Option<OffsetDateTime>, Error> {
        if text.is_empty() {
            return Ok(None);
        }
        ValueConverter::<OffsetDateTime>::from_text(self, text).map(Some)
    }
}

macro_rules! seed_parsed {
    ($registry:ident, $($ty:ty),+ $(,)?) => {
        $( $registry.register::<$ty>(ParseConverter::<$ty>::new()); )+
    };
}

/// Converters keyed by value type; at most one per type.
pub struct ConverterRegistry {
    converters: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ConverterRegistry {
    /// An empty registry with no seeded converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Registry seeded with the string, primitive, and timestamp defaults.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register::<String>(QuotedStringConverter)
            .register::<Option<String>>(QuotedStringConverter)
            .register::<OffsetDateTime>(Rfc3339Converter)
            .register::<Option<OffsetDateTime>>(Rfc3339Converter);
        seed_parsed!(
            registry, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128,
            usize, f32, f64
        );
        registry
    }

    /// Register `converter` for `V`, replacing any previous one.
    pub fn register<V: 'static>(
        &mut self,
        converter: impl ValueConverter<V> + 'static,
    ) -> &mut Self {
        let shared: SharedConverter<V> = Arc::new(converter);
        self.converters.insert(TypeId::of::<V>(), Box::new(shared));
        self
    }

    pub fn contains<V: 'static>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<V>())
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub(crate) fn get<V: 'static>(&self) -> Option<SharedConverter<V>> {
        self.converters
            .get(&TypeId::of::<V>())
            .and_then(|entry| entry.downcast_ref::<SharedConverter<V>>())
            .cloned()
    }

    /// Registered converter for `V`, else `fallback`, else `Unsupported`.
    pub(crate) fn resolve<V: 'static>(
        &self,
        fallback: Option<&SharedConverter<V>>,
    ) -> Result<SharedConverter<V>, Error> {
        if let Some(converter) = self.get::<V>() {
            return Ok(converter);
        }
        fallback.cloned().ok_or_else(|| {
            Error::new(ErrorKind::Unsupported)
                .with_message("no text converter registered for value type")
                .with_value_type(type_name::<V>())
                .with_hint("register a converter for this type before reading or writing")
        })
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}
