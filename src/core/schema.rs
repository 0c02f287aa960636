// Column schema derived from an explicit per-type member description.
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::core::convert::{ConverterRegistry, ParseConverter, SharedConverter};
use crate::core::error::{Error, ErrorKind};

/// A type that can be stored as one row of a table.
///
/// `Default` is the construction path used when reading; `describe` lists the
/// members in declaration order, which becomes the on-disk column order.
pub trait Record: Default + 'static {
    fn describe(schema: &mut SchemaBuilder<Self>);
}

/// Per-member naming override, set through [`MemberOptions`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ColumnOverride {
    name: Option<String>,
    ignore: bool,
}

pub(crate) trait Accessor<T>: Send + Sync {
    fn value_type(&self) -> &'static str;
    fn bind(&self, registry: &ConverterRegistry) -> Result<Arc<dyn Cell<T>>, Error>;
}

/// A member accessor paired with its resolved converter.
pub(crate) trait Cell<T>: Send + Sync {
    fn write_text(&self, record: &T) -> Result<String, Error>;
    fn read_text(&self, record: &mut T, text: &str) -> Result<(), Error>;
}

type Getter<T, V> = Arc<dyn Fn(&T) -> &V + Send + Sync>;
type Setter<T, V> = Arc<dyn Fn(&mut T, V) + Send + Sync>;

struct FieldAccessor<T, V> {
    get: Getter<T, V>,
    set: Setter<T, V>,
    fallback: Option<SharedConverter<V>>,
}

impl<T: 'static, V: 'static> Accessor<T> for FieldAccessor<T, V> {
    fn value_type(&self) -> &'static str {
        type_name::<V>()
    }

    fn bind(&self, registry: &ConverterRegistry) -> Result<Arc<dyn Cell<T>>, Error> {
        let converter = registry.resolve::<V>(self.fallback.as_ref())?;
        Ok(Arc::new(BoundField {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
            converter,
        }))
    }
}

struct BoundField<T, V> {
    get: Getter<T, V>,
    set: Setter<T, V>,
    converter: SharedConverter<V>,
}

impl<T, V> Cell<T> for BoundField<T, V> {
    fn write_text(&self, record: &T) -> Result<String, Error> {
        self.converter.to_text((self.get)(record))
    }

    fn read_text(&self, record: &mut T, text: &str) -> Result<(), Error> {
        let value = self.converter.from_text(text)?;
        (self.set)(record, value);
        Ok(())
    }
}

enum Access<T> {
    ReadWrite(Arc<dyn Accessor<T>>),
    ReadOnly,
    WriteOnly,
}

struct Member<T> {
    member: String,
    options: ColumnOverride,
    access: Access<T>,
}

/// Collects members in declaration order for [`Record::describe`].
pub struct SchemaBuilder<T> {
    members: Vec<Member<T>>,
}

/// Override handle returned for each read/write member.
pub struct MemberOptions<'a> {
    options: &'a mut ColumnOverride,
}

impl MemberOptions<'_> {
    /// Store the member under `name` instead of its own name.
    pub fn rename(self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Leave the member out of the schema entirely.
    pub fn ignore(self) -> Self {
        self.options.ignore = true;
        self
    }
}

impl<T: 'static> SchemaBuilder<T> {
    fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// A read/write member whose value type is served by the converter registry.
    pub fn field<V, G, S>(&mut self, member: &str, get: G, set: S) -> MemberOptions<'_>
    where
        V: 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_field(member, Arc::new(get), Arc::new(set), None)
    }

    /// A read/write member that falls back to the value type's own
    /// `Display`/`FromStr` when no converter is registered for it.
    pub fn parsed_field<V, G, S>(&mut self, member: &str, get: G, set: S) -> MemberOptions<'_>
    where
        V: FromStr + Display + 'static,
        V::Err: Display,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let fallback: SharedConverter<V> = Arc::new(ParseConverter::<V>::new());
        self.push_field(member, Arc::new(get), Arc::new(set), Some(fallback))
    }

    /// A member that can be read but not assigned; never becomes a column.
    pub fn read_only(&mut self, member: &str) {
        self.push(member, Access::ReadOnly);
    }

    /// A member that can be assigned but not read; never becomes a column.
    pub fn write_only(&mut self, member: &str) {
        self.push(member, Access::WriteOnly);
    }

    fn push_field<V: 'static>(
        &mut self,
        member: &str,
        get: Getter<T, V>,
        set: Setter<T, V>,
        fallback: Option<SharedConverter<V>>,
    ) -> MemberOptions<'_> {
        let accessor: Arc<dyn Accessor<T>> = Arc::new(FieldAccessor { get, set, fallback });
        self.push(member, Access::ReadWrite(accessor))
    }

    fn push(&mut self, member: &str, access: Access<T>) -> MemberOptions<'_> {
        self.members.push(Member {
            member: member.to_string(),
            options: ColumnOverride::default(),
            access,
        });
        let last = self.members.len() - 1;
        MemberOptions {
            options: &mut self.members[last].options,
        }
    }

    fn finish(self) -> Result<Schema<T>, Error> {
        let mut columns: Vec<ColumnDescriptor<T>> = Vec::new();
        let mut index = HashMap::new();
        for Member {
            member,
            options,
            access,
        } in self.members
        {
            if options.ignore {
                continue;
            }
            let accessor = match access {
                Access::ReadWrite(accessor) => accessor,
                Access::ReadOnly | Access::WriteOnly => {
                    tracing::trace!(member = %member, "skipping member without read/write access");
                    continue;
                }
            };
            let name = options.name.unwrap_or_else(|| member.clone());
            validate_name(&name, &member)?;
            if index.contains_key(&name) {
                return Err(Error::new(ErrorKind::Schema)
                    .with_message(format!("duplicate column name (member {member})"))
                    .with_column(name)
                    .with_hint("rename or ignore one of the members"));
            }
            let position = columns.len();
            index.insert(name.clone(), position);
            columns.push(ColumnDescriptor {
                name,
                member,
                position,
                accessor,
            });
        }
        if columns.is_empty() {
            return Err(Error::new(ErrorKind::Schema)
                .with_message("record type describes no read/write columns"));
        }
        Ok(Schema { columns, index })
    }
}

fn validate_name(name: &str, member: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains(['\t', '\r', '\n']) {
        return Err(Error::new(ErrorKind::Schema)
            .with_message(format!(
                "column name for member {member} must be non-empty and free of tabs and line breaks"
            ))
            .with_column(name));
    }
    Ok(())
}

/// One column: on-disk name, originating member, and schema position.
pub struct ColumnDescriptor<T> {
    name: String,
    member: String,
    position: usize,
    accessor: Arc<dyn Accessor<T>>,
}

impl<T> ColumnDescriptor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn value_type(&self) -> &'static str {
        self.accessor.value_type()
    }
}

impl<T> fmt::Debug for ColumnDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("member", &self.member)
            .field("position", &self.position)
            .field("value_type", &self.value_type())
            .finish()
    }
}

/// A column whose converter has been resolved against a registry.
pub(crate) struct BoundColumn<T> {
    pub(crate) name: String,
    pub(crate) cell: Arc<dyn Cell<T>>,
}

impl<T> Clone for BoundColumn<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Ordered column set for one record type.
pub struct Schema<T> {
    columns: Vec<ColumnDescriptor<T>>,
    index: HashMap<String, usize>,
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

fn schema_cache() -> &'static SchemaCache {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

impl<T: Record> Schema<T> {
    /// Derive the schema for `T`, reusing the cached one after the first success.
    pub fn derive() -> Result<Arc<Self>, Error> {
        let key = TypeId::of::<T>();
        let cached = schema_cache()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(entry) = cached {
            return downcast_schema(entry);
        }

        let mut builder = SchemaBuilder::new();
        T::describe(&mut builder);
        let schema = builder.finish().map_err(|err| err.with_value_type(type_name::<T>()))?;
        tracing::debug!(
            record = type_name::<T>(),
            columns = schema.len(),
            "derived record schema"
        );

        let fresh: Arc<dyn Any + Send + Sync> = Arc::new(schema);
        let entry = schema_cache()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(fresh)
            .clone();
        downcast_schema(entry)
    }
}

fn downcast_schema<T: 'static>(entry: Arc<dyn Any + Send + Sync>) -> Result<Arc<Schema<T>>, Error> {
    entry.downcast::<Schema<T>>().map_err(|_| {
        Error::new(ErrorKind::Internal)
            .with_message("schema cache entry has unexpected type")
            .with_value_type(type_name::<T>())
    })
}

impl<T: 'static> Schema<T> {
    pub fn columns(&self) -> &[ColumnDescriptor<T>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor<T>> {
        self.index.get(name).map(|&position| &self.columns[position])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in schema order, tab-joined, without escaping.
    pub fn header_line(&self) -> String {
        self.names().collect::<Vec<_>>().join("\t")
    }

    /// Resolve every column's converter; fails on the first unsupported type.
    pub(crate) fn bind(&self, registry: &ConverterRegistry) -> Result<Vec<BoundColumn<T>>, Error> {
        self.columns
            .iter()
            .map(|column| {
                let cell = column
                    .accessor
                    .bind(registry)
                    .map_err(|err| err.with_column(column.name.clone()))?;
                Ok(BoundColumn {
                    name: column.name.clone(),
                    cell,
                })
            })
            .collect()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.columns.iter()).finish()
    }
}
