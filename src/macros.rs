// Declarative `Record` implementations for plain structs.

/// Implement `Record` for a struct by listing its members in column order.
///
/// Each member is a read/write field served by the converter registry.
/// Attributes adjust one member:
/// `#[rename = "Name"]` stores it under another column name,
/// `#[skip]` leaves it out, and `#[parsed]` falls back to the field type's
/// `Display`/`FromStr` when no converter is registered.
///
/// ```
/// use tsvrec::tsv_record;
///
/// #[derive(Default)]
/// struct Tweet {
///     id: i64,
///     user: Option<String>,
///     cached: bool,
/// }
///
/// tsv_record!(Tweet {
///     #[rename = "Id"] id,
///     user,
///     #[skip] cached,
/// });
///
/// let schema = tsvrec::api::Schema::<Tweet>::derive().unwrap();
/// assert_eq!(schema.header_line(), "Id\tuser");
/// ```
#[macro_export]
macro_rules! tsv_record {
    (@member $schema:ident, $ty:ty, [$method:ident] [$($opt:tt)*]) => {};

    (@member $schema:ident, $ty:ty, [$method:ident] [$($opt:tt)*]
        #[parsed] $($rest:tt)*) => {
        $crate::tsv_record!(@member $schema, $ty, [parsed_field] [$($opt)*] $($rest)*);
    };

    (@member $schema:ident, $ty:ty, [$method:ident] [$($opt:tt)*]
        #[rename = $name:literal] $($rest:tt)*) => {
        $crate::tsv_record!(@member $schema, $ty, [$method] [$($opt)* .rename($name)] $($rest)*);
    };

    (@member $schema:ident, $ty:ty, [$method:ident] [$($opt:tt)*]
        #[skip] $($rest:tt)*) => {
        $crate::tsv_record!(@member $schema, $ty, [$method] [$($opt)* .ignore()] $($rest)*);
    };

    (@member $schema:ident, $ty:ty, [$method:ident] [$($opt:tt)*]
        $field:ident $(, $($rest:tt)*)?) => {
        let _ = $schema.$method(
            stringify!($field),
            |record: &$ty| &record.$field,
            |record: &mut $ty, value| record.$field = value,
        ) $($opt)*;
        $crate::tsv_record!(@member $schema, $ty, [field] [] $($($rest)*)?);
    };

    ($ty:ty { $($members:tt)* }) => {
        impl $crate::api::Record for $ty {
            fn describe(schema: &mut $crate::api::SchemaBuilder<Self>) {
                $crate::tsv_record!(@member schema, $ty, [field] [] $($members)*);
            }
        }
    };
}
