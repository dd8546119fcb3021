//! Registration macros.
//!
//! These generate what a module author would otherwise write by hand:
//! the BSATN codec and type registration for row and argument types,
//! the per-table handle with its typed accessors, and the `__preinit__`
//! exports through which every table and reducer announces itself
//! before the host's first describe call.

/// Implements [`Serialize`](crate::Serialize),
/// [`Deserialize`](crate::Deserialize), and
/// [`SpacetimeType`](crate::SpacetimeType)
/// for an already-declared struct with named fields.
///
/// The struct is registered in the typespace under its own name;
/// its fields encode in declaration order with product framing.
///
/// # Example
///
/// ```ignore
/// pub struct Person {
///     id: u32,
///     name: String,
///     age: u8,
/// }
/// spacetimedb::impl_st_struct!(Person { id: u32, name: String, age: u8 });
/// ```
#[macro_export]
macro_rules! impl_st_struct {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        impl $crate::Serialize for $name {
            fn serialize(&self, writer: &mut impl $crate::sats::buffer::BufWriter) {
                $($crate::Serialize::serialize(&self.$field, writer);)*
            }
        }

        impl $crate::Deserialize for $name {
            fn deserialize<'de, R: $crate::sats::buffer::BufReader<'de>>(
                de: &mut $crate::sats::bsatn::Deserializer<'_, R>,
            ) -> ::core::result::Result<Self, $crate::sats::DecodeError> {
                $(let $field = $crate::Deserialize::deserialize(de)?;)*
                ::core::result::Result::Ok(Self { $($field),* })
            }
        }

        impl $crate::SpacetimeType for $name {
            fn make_type<S: $crate::sats::TypespaceBuilder>(ts: &mut S) -> $crate::sats::AlgebraicType {
                $crate::sats::TypespaceBuilder::add(
                    ts,
                    ::core::any::TypeId::of::<Self>(),
                    ::core::option::Option::Some(stringify!($name)),
                    |ts| {
                        let elements: ::std::vec::Vec<$crate::sats::ProductTypeElement> = ::std::vec![
                            $($crate::sats::ProductTypeElement::new_named(
                                <$ty as $crate::SpacetimeType>::make_type(ts),
                                stringify!($field),
                            )),*
                        ];
                        $crate::sats::AlgebraicType::Product(elements.into_iter().collect())
                    },
                )
            }
        }
    };
}

/// Implements [`Serialize`](crate::Serialize),
/// [`Deserialize`](crate::Deserialize), and
/// [`SpacetimeType`](crate::SpacetimeType)
/// for an already-declared C-style enum.
///
/// The enum becomes a sum of payload-less variants. Values encode as the
/// one-byte variant tag plus a unit payload, keeping the sum framing even
/// though no variant carries data.
///
/// # Example
///
/// ```ignore
/// pub enum Color { Red, Green, Blue }
/// spacetimedb::impl_st_enum!(Color { Red = 0, Green = 1, Blue = 2 });
/// ```
#[macro_export]
macro_rules! impl_st_enum {
    ($name:ident { $($variant:ident = $tag:literal),+ $(,)? }) => {
        impl $crate::Serialize for $name {
            fn serialize(&self, writer: &mut impl $crate::sats::buffer::BufWriter) {
                $crate::sats::buffer::BufWriter::put_u8(writer, match self {
                    $($name::$variant => $tag),+
                });
            }
        }

        impl $crate::Deserialize for $name {
            fn deserialize<'de, R: $crate::sats::buffer::BufReader<'de>>(
                de: &mut $crate::sats::bsatn::Deserializer<'_, R>,
            ) -> ::core::result::Result<Self, $crate::sats::DecodeError> {
                const NUM_VARIANTS: u8 = (0 $(+ { stringify!($variant); 1 })+) as u8;
                match de.sum_tag(stringify!($name), NUM_VARIANTS)? {
                    $($tag => ::core::result::Result::Ok($name::$variant),)+
                    _ => ::core::unreachable!("tag already validated against the variant count"),
                }
            }
        }

        impl $crate::SpacetimeType for $name {
            fn make_type<S: $crate::sats::TypespaceBuilder>(ts: &mut S) -> $crate::sats::AlgebraicType {
                $crate::sats::TypespaceBuilder::add(
                    ts,
                    ::core::any::TypeId::of::<Self>(),
                    ::core::option::Option::Some(stringify!($name)),
                    |_| $crate::sats::AlgebraicType::simple_enum([$(stringify!($variant)),+].into_iter()),
                )
            }
        }
    };
}

/// Declares a table handle and registers the table with the module.
///
/// Declares the unit struct `$handle` implementing
/// [`Table`](crate::Table) with rows of type `$row`,
/// an accessor trait so `ctx.db.{name}()` returns the handle,
/// typed accessors for every declared unique column and index,
/// and the `__preinit__` export that announces the table
/// before the first describe call.
///
/// The row type must have gone through [`impl_st_struct!`]
/// (or hand-written equivalents). Column numbers are the 0-based
/// positions of fields in the row struct.
///
/// # Example
///
/// ```ignore
/// spacetimedb::register_table!(
///     name = person, handle = PersonTable, row = Person,
///     access = Public,
///     primary_key = 0,
///     auto_inc = [0 => id],
///     unique = [0 => id(PersonIdColumn): u32],
///     index = [by_age(PersonAgeIndex) btree(2): (u8,)],
/// );
/// ```
#[macro_export]
macro_rules! register_table {
    (
        name = $tname:ident, handle = $handle:ident, row = $row:ty
        $(, access = $access:ident)?
        $(, primary_key = $pk:literal)?
        $(, auto_inc = [$($acol:literal => $afield:ident),+ $(,)?])?
        $(, unique = [$($ucol:literal => $ufield:ident($umarker:ident): $uty:ty),+ $(,)?])?
        $(, index = [$($ifn:ident($imarker:ident) btree($($icol:literal),+): $ity:ty),+ $(,)?])?
        $(, scheduled = ($sreducer:ident, $scol:literal))?
        $(,)?
    ) => {
        #[doc = concat!("A handle on the `", stringify!($tname), "` table.")]
        #[allow(non_camel_case_types)]
        pub struct $handle;

        impl $crate::table::TableInternal for $handle {
            const TABLE_NAME: &'static str = stringify!($tname);
            $(const TABLE_ACCESS: $crate::TableAccess = $crate::TableAccess::$access;)?
            $(const PRIMARY_KEY: ::core::option::Option<u16> = ::core::option::Option::Some($pk);)?
            $(const SEQUENCES: &'static [u16] = &[$($acol),+];)?
            $(
                const UNIQUE_COLUMNS: &'static [u16] = &[$($ucol),+];
                const UNIQUE_COLUMN_NAMES: &'static [&'static str] = &[$(stringify!($ufield)),+];
            )?
            const INDEXES: &'static [$crate::table::IndexDesc<'static>] = &[
                $($($crate::table::IndexDesc {
                    accessor_name: stringify!($ufield),
                    algo: $crate::table::IndexAlgo::BTree { columns: &[$ucol] },
                },)+)?
                $($($crate::table::IndexDesc {
                    accessor_name: stringify!($ifn),
                    algo: $crate::table::IndexAlgo::BTree { columns: &[$($icol),+] },
                },)+)?
            ];
            $(const SCHEDULE: ::core::option::Option<$crate::table::ScheduleDesc<'static>> =
                ::core::option::Option::Some($crate::table::ScheduleDesc {
                    reducer_name: stringify!($sreducer),
                    scheduled_at_column: $scol,
                });)?

            fn table_id() -> $crate::TableId {
                static ID: ::std::sync::OnceLock<$crate::TableId> = ::std::sync::OnceLock::new();
                *ID.get_or_init(|| $crate::table_id_from_name(stringify!($tname)))
            }
        }

        impl $crate::Table for $handle {
            type Row = $row;

            type UniqueConstraintViolation = $crate::register_table!(@maybe_unique $($($ucol)+)?);
            type AutoIncOverflow = $crate::register_table!(@maybe_auto_inc $($($acol)+)?);

            fn integrate_generated_columns(row: &mut Self::Row, mut generated_cols: &[u8]) {
                let _gen_cols = &mut generated_cols;
                $($($crate::table::SequenceTrigger::maybe_decode_into(&mut row.$afield, _gen_cols);)+)?
            }
        }

        #[doc = concat!("Accessor for the `", stringify!($tname), "` table: `ctx.db.", stringify!($tname), "()`.")]
        #[allow(non_camel_case_types)]
        pub trait $tname {
            fn $tname(&self) -> $handle;
        }

        impl $tname for $crate::Local {
            fn $tname(&self) -> $handle {
                $handle
            }
        }

        $($(
            #[doc = concat!("The unique `", stringify!($ufield), "` column of `", stringify!($tname), "`.")]
            #[allow(non_camel_case_types)]
            pub struct $umarker;

            impl $crate::table::Column for $umarker {
                type Row = $row;
                type ColType = $uty;
                const COLUMN_NAME: &'static str = stringify!($ufield);
                fn get_field(row: &Self::Row) -> &Self::ColType {
                    &row.$ufield
                }
            }

            impl $crate::table::Index for $umarker {
                fn index_id() -> $crate::table::IndexId {
                    static ID: ::std::sync::OnceLock<$crate::table::IndexId> = ::std::sync::OnceLock::new();
                    *ID.get_or_init(|| {
                        let name = concat!(stringify!($tname), "_", stringify!($ufield), "_idx_btree");
                        $crate::sys::index_id_from_name(name)
                            .unwrap_or_else(|_| ::core::panic!("Failed to get index with name: {}", name))
                    })
                }
            }

            impl $handle {
                pub fn $ufield(&self) -> $crate::UniqueColumn<$handle, $uty, $umarker> {
                    $crate::UniqueColumn::__NEW
                }
            }
        )+)?

        $($(
            #[doc = concat!("The `", stringify!($ifn), "` btree index of `", stringify!($tname), "`.")]
            #[allow(non_camel_case_types)]
            pub struct $imarker;

            impl $crate::table::Index for $imarker {
                fn index_id() -> $crate::table::IndexId {
                    static ID: ::std::sync::OnceLock<$crate::table::IndexId> = ::std::sync::OnceLock::new();
                    *ID.get_or_init(|| {
                        let name = concat!(stringify!($tname), "_", stringify!($ifn), "_idx_btree");
                        $crate::sys::index_id_from_name(name)
                            .unwrap_or_else(|_| ::core::panic!("Failed to get index with name: {}", name))
                    })
                }
            }

            impl $handle {
                pub fn $ifn(&self) -> $crate::RangedIndex<$handle, $ity, $imarker> {
                    $crate::RangedIndex::__NEW
                }
            }
        )+)?

        const _: () = {
            #[export_name = concat!("__preinit__20_register_table_", stringify!($tname))]
            extern "C" fn __register_table() {
                $crate::rt::register_table::<$handle>()
            }
        };
    };

    (@maybe_unique) => { ::core::convert::Infallible };
    (@maybe_unique $($t:tt)+) => { $crate::UniqueConstraintViolation };
    (@maybe_auto_inc) => { ::core::convert::Infallible };
    (@maybe_auto_inc $($t:tt)+) => { $crate::AutoIncOverflow };
}

/// Registers a function as a reducer.
///
/// The function's first parameter must be `&ReducerContext`; the
/// parameters listed here are the client-visible arguments, decoded
/// from BSATN in declaration order. The function may return `()` or
/// `Result<(), impl Display>`; an `Err` (or a panic) aborts the
/// invocation's transaction and surfaces the message.
///
/// Lifecycle reducers take no arguments and are declared with a
/// role prefix:
///
/// ```ignore
/// spacetimedb::register_reducer!(add_person(name: String, age: u8));
/// spacetimedb::register_reducer!(init seed_tables());
/// spacetimedb::register_reducer!(client_connected on_connect());
/// spacetimedb::register_reducer!(client_disconnected on_disconnect());
/// ```
#[macro_export]
macro_rules! register_reducer {
    (init $f:ident()) => {
        $crate::register_reducer!(@impl $f, ::core::option::Option::Some($crate::Lifecycle::Init), ());
    };
    (client_connected $f:ident()) => {
        $crate::register_reducer!(@impl $f, ::core::option::Option::Some($crate::Lifecycle::OnConnect), ());
    };
    (client_disconnected $f:ident()) => {
        $crate::register_reducer!(@impl $f, ::core::option::Option::Some($crate::Lifecycle::OnDisconnect), ());
    };
    ($f:ident($($arg:ident: $ty:ty),* $(,)?)) => {
        $crate::register_reducer!(@impl $f, ::core::option::Option::None, ($($arg: $ty),*));
    };
    (@impl $f:ident, $lifecycle:expr, ($($arg:ident: $ty:ty),*)) => {
        const _: () = {
            fn __invoke(ctx: $crate::ReducerContext, args: &[u8]) -> $crate::ReducerResult {
                $crate::rt::invoke_reducer::<($($ty,)*), _>($f, ctx, args)
            }

            #[export_name = concat!("__preinit__20_register_reducer_", stringify!($f))]
            extern "C" fn __register_reducer() {
                $crate::rt::register_reducer::<($($ty,)*)>(
                    stringify!($f),
                    &[$(::core::option::Option::Some(stringify!($arg))),*],
                    $lifecycle,
                    __invoke,
                )
            }
        };
    };
}

/// Registers a type in the module's typespace
/// even when no table or reducer mentions it.
#[macro_export]
macro_rules! register_type {
    ($ty:ident) => {
        const _: () = {
            #[export_name = concat!("__preinit__20_register_describer_", stringify!($ty))]
            extern "C" fn __register_describer() {
                $crate::rt::register_reftype::<$ty>()
            }
        };
    };
}

/// Registers a row-level security rule.
///
/// Applied to a `const` of type [`Filter`](crate::Filter); the rule's
/// SQL lands in the module descriptor and filters what client queries
/// can see. Multiple rules for the same table are unioned.
#[macro_export]
macro_rules! register_client_visibility_filter {
    ($filter:ident) => {
        const _: () = {
            #[export_name = concat!("__preinit__20_register_row_level_security_", stringify!($filter))]
            extern "C" fn __register_row_level_security() {
                $crate::rt::register_row_level_security($filter.sql_text())
            }
        };
    };
}
