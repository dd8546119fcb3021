#![deny(unsafe_op_in_unsafe_fn)]

use std::panic;
use std::sync::{Mutex, OnceLock};

use spacetimedb_lib::bsatn;
use spacetimedb_lib::db::raw_def::v9::{Lifecycle, RawModuleDef, RawModuleDefV9Builder, TableType};
use spacetimedb_lib::sats::buffer::DecodeError;
use spacetimedb_lib::sats::typespace::TypespaceBuilder;
use spacetimedb_lib::sats::{Deserialize, ProductType, ProductTypeElement, SpacetimeType};
use spacetimedb_lib::{ConnectionId, Identity, Timestamp};
use spacetimedb_primitives::{ColId, ColList};

use crate::table::{IndexAlgo, Table};
use crate::{sys, IterBuf, Local, ReducerContext, ReducerResult};
use sys::raw::{BytesSink, BytesSource};

scoped_tls::scoped_thread_local!(
    /// The timestamp of the reducer invocation currently running.
    pub(crate) static CURRENT_TIMESTAMP: Timestamp
);

/// A trait of types representing the arguments of a reducer.
///
/// This does not include the context first argument,
/// only the client-provided args.
pub trait Args: Sized {
    /// How many arguments does the reducer accept?
    const LEN: usize;

    /// Decodes the arguments from `args`, each in declaration order.
    ///
    /// Leftover bytes after the last argument are an error.
    fn decode(args: &[u8]) -> Result<Self, DecodeError>;

    /// Returns the parameter product type of the reducer,
    /// pairing each argument's type with its name from `arg_names`.
    fn schema(
        typespace: &mut impl TypespaceBuilder,
        arg_names: &'static [Option<&'static str>],
    ) -> ProductType;
}

/// A trait for types representing the *execution logic* of a reducer.
pub trait Reducer<A: Args> {
    fn invoke(&self, ctx: &ReducerContext, args: A) -> ReducerResult;
}

/// A trait of types representing the result of executing a reducer.
pub trait IntoReducerResult {
    /// Convert the result into a form where there is no value
    /// and the error message is a string.
    fn into_result(self) -> ReducerResult;
}

impl IntoReducerResult for () {
    #[inline]
    fn into_result(self) -> ReducerResult {
        Ok(self)
    }
}

impl<E: core::fmt::Display> IntoReducerResult for Result<(), E> {
    #[inline]
    fn into_result(self) -> ReducerResult {
        self.map_err(|e| e.to_string().into())
    }
}

macro_rules! impl_reducer {
    ($($T1:ident $(, $T:ident)*)?) => {
        impl_reducer!(@impl $($T1 $(, $T)*)?);
        $(impl_reducer!($($T),*);)?
    };
    (@impl $($T:ident),*) => {
        // Implement `Args` for the tuple type `($($T,)*)`.
        impl<$($T: SpacetimeType + Deserialize),*> Args for ($($T,)*) {
            const LEN: usize = impl_reducer!(@count $($T)*);

            fn decode(args: &[u8]) -> Result<Self, DecodeError> {
                bsatn::from_slice(args)
            }

            #[allow(unused)]
            fn schema(
                typespace: &mut impl TypespaceBuilder,
                arg_names: &'static [Option<&'static str>],
            ) -> ProductType {
                let mut names = arg_names.iter().copied();
                let elements: Vec<ProductTypeElement> = vec![$(ProductTypeElement {
                    name: names.next().flatten().map(Into::into),
                    algebraic_type: <$T>::make_type(typespace),
                }),*];
                elements.into_iter().collect()
            }
        }

        // Implement `Reducer` over `($($T,)*)` for compatible functions.
        impl<Func, Ret, $($T: SpacetimeType + Deserialize),*> Reducer<($($T,)*)> for Func
        where
            Func: Fn(&ReducerContext, $($T),*) -> Ret,
            Ret: IntoReducerResult,
        {
            #[allow(non_snake_case)]
            fn invoke(&self, ctx: &ReducerContext, args: ($($T,)*)) -> ReducerResult {
                let ($($T,)*) = args;
                self(ctx, $($T),*).into_result()
            }
        }
    };
    // Counts the number of elements in the tuple.
    (@count $($T:ident)*) => {
        0 $(+ impl_reducer!(@drop $T 1))*
    };
    (@drop $a:tt $b:tt) => { $b };
}

impl_reducer!(A, B, C, D, E, F);

/// Invokes `reducer` on the `args` decoded per its `Args` type,
/// in the context `ctx`.
pub fn invoke_reducer<A: Args, R: Reducer<A>>(reducer: R, ctx: ReducerContext, args: &[u8]) -> ReducerResult {
    let args = A::decode(args).map_err(|err| format!("failed to decode reducer arguments: {err}").into_boxed_str())?;
    reducer.invoke(&ctx, args)
}

/// A function which will be registered by [`register_describer`] into
/// [`DESCRIBERS`], which will be called by [`__describe_module__`]
/// to construct a module definition.
///
/// May be a closure over static data. The type system permits a mutable
/// closure since [`DESCRIBERS`] is in a [`Mutex`] anyways, but a
/// non-idempotent function here will misbehave.
trait DescriberFn: FnMut(&mut ModuleBuilder) + Send + 'static {}
impl<F: FnMut(&mut ModuleBuilder) + Send + 'static> DescriberFn for F {}

/// Registers into `DESCRIBERS` a function `f` to modify the module builder.
fn register_describer(f: impl DescriberFn) {
    DESCRIBERS.lock().unwrap().push(Box::new(f))
}

/// Registers a describer for the `SpacetimeType` `T`,
/// so the type lands in the typespace even when no table uses it.
pub fn register_reftype<T: SpacetimeType>() {
    register_describer(|module| {
        T::make_type(&mut module.inner);
    })
}

/// Registers a describer for the table type `T`.
pub fn register_table<T: Table>() {
    register_describer(|module| {
        let product_type_ref = T::Row::make_type(&mut module.inner)
            .as_ref()
            .expect("table row type must be a registered named product type");

        let mut table = module
            .inner
            .build_table(T::TABLE_NAME, product_type_ref)
            .with_type(TableType::User)
            .with_access(T::TABLE_ACCESS);

        for &col in T::UNIQUE_COLUMNS {
            table = table.with_unique_constraint(ColId(col));
        }
        for &index in T::INDEXES {
            table = table.with_index(index.algo.into(), index.accessor_name);
        }
        if let Some(primary_key) = T::PRIMARY_KEY {
            table = table.with_primary_key(ColList::from_col(ColId(primary_key)));
        }
        for &col in T::SEQUENCES {
            table = table.with_column_sequence(ColId(col));
        }
        if let Some(schedule) = T::SCHEDULE {
            table = table.with_schedule(schedule.reducer_name, ColId(schedule.scheduled_at_column));
        }

        table.finish();
    })
}

/// A reducer function takes in `(ReducerContext, Args)`
/// and returns a result with a possible error message.
pub type ReducerFn = fn(ReducerContext, &[u8]) -> ReducerResult;

/// Registers a describer for a reducer with arguments `A`,
/// dispatched through `invoke`.
pub fn register_reducer<A: Args>(
    name: &'static str,
    arg_names: &'static [Option<&'static str>],
    lifecycle: Option<Lifecycle>,
    invoke: ReducerFn,
) {
    register_describer(move |module| {
        let params = A::schema(&mut module.inner, arg_names);
        module.inner.add_reducer(name, params, lifecycle);
        module.reducers.push(invoke);
    })
}

/// Registers a row-level security policy.
pub fn register_row_level_security(sql: &'static str) {
    register_describer(move |module| {
        module.inner.add_row_level_security(sql);
    })
}

/// A builder for a module.
#[derive(Default)]
struct ModuleBuilder {
    /// The module definition.
    inner: RawModuleDefV9Builder,
    /// The reducers of the module, ordered as in the definition.
    reducers: Vec<ReducerFn>,
}

// Not actually a mutex; because WASM is single-threaded this basically just turns into a refcell.
static DESCRIBERS: Mutex<Vec<Box<dyn DescriberFn>>> = Mutex::new(Vec::new());

/// The reducer dispatch table, written once by `__describe_module__`.
static REDUCERS: OnceLock<Vec<ReducerFn>> = OnceLock::new();

/// Called by the host when the module is initialized
/// to describe the module into a serialized form that is returned.
///
/// This is also the module's opportunity to ready `__call_reducer__`
/// (by writing the set of `REDUCERS`).
///
/// The `description` sink receives the BSATN-encoded `RawModuleDef`,
/// which is how the module defines and, on re-publish, alters its
/// tables, constraints, indexes, and reducers. After initialization,
/// the module cannot alter the schema.
#[no_mangle]
extern "C" fn __describe_module__(description: BytesSink) {
    // Collect the `module`.
    let mut module = ModuleBuilder::default();
    for describer in &mut *DESCRIBERS.lock().unwrap() {
        describer(&mut module)
    }

    // Assemble and serialize the definition.
    // Registration mistakes (duplicate names, out-of-range columns,
    // lifecycle arity) become hard errors here.
    let module_def = module
        .inner
        .finish()
        .unwrap_or_else(|err| panic!("invalid module definition: {err}"));
    let bytes = bsatn::to_vec(&RawModuleDef::V9(module_def));

    // Write the set of reducers.
    REDUCERS.set(module.reducers).ok().expect("describe already ran");

    // Write the bsatn data into the sink.
    write_to_sink(description, &bytes);
}

/// Called by the host to execute a reducer
/// when the `sender` calls the reducer identified by `id`
/// at `timestamp` with `args`.
///
/// The `sender_{0-3}` are the pieces of a `[u8; 32]` (`u256`)
/// representing the sender's `Identity`, in little-endian order:
/// `sender_0` holds bytes `[0..8]`, and so on upward.
///
/// The `conn_id_{0-1}` are the pieces of a `[u8; 16]` (`u128`)
/// representing the caller's `ConnectionId`, in the same order.
/// The all-zeros connection id means the module called itself.
///
/// The `args` is a `BytesSource` over the BSATN-encoded reducer
/// arguments, or `0` (invalid) for an empty argument stream.
///
/// The `error` is a `BytesSink`. On failure the reducer writes a short
/// UTF-8 message into it and returns non-zero, which the host takes as
/// the signal to roll the transaction back; returning `0` commits.
#[no_mangle]
extern "C" fn __call_reducer__(
    id: u32,
    sender_0: u64,
    sender_1: u64,
    sender_2: u64,
    sender_3: u64,
    conn_id_0: u64,
    conn_id_1: u64,
    timestamp: u64,
    args: BytesSource,
    error: BytesSink,
) -> i16 {
    // Piece together `sender_i` into an `Identity`.
    let sender = [sender_0, sender_1, sender_2, sender_3];
    let sender: [u8; 32] = bytemuck::must_cast(sender);
    let sender = Identity::from_byte_array(sender); // The LITTLE-ENDIAN constructor.

    // Piece together `conn_id_i` into a `ConnectionId`.
    // The all-zeros `ConnectionId` is interpreted as `None`.
    let conn_id = [conn_id_0, conn_id_1];
    let conn_id: [u8; 16] = bytemuck::must_cast(conn_id);
    let conn_id = ConnectionId::from_le_byte_array(conn_id).none_if_zero();

    // Assemble the `ReducerContext`.
    let timestamp = Timestamp::from_micros_since_unix_epoch(timestamp as i64);
    let ctx = ReducerContext::new(Local {}, sender, conn_id, timestamp);

    // Fetch the reducer function; an id we never handed out is an error.
    let reducers = REDUCERS.get().expect("describe must run before call");
    let Some(reducer) = reducers.get(id as usize) else {
        write_to_sink(error, b"No such reducer");
        return -(sys::Errno::NO_SUCH_REDUCER.code() as i16);
    };

    // Dispatch with the arguments read, converting a panic into an
    // error message rather than letting it unwind into the host.
    let res = CURRENT_TIMESTAMP.set(&timestamp, || {
        with_read_args(args, |args| {
            panic::catch_unwind(panic::AssertUnwindSafe(|| reducer(ctx, args)))
                .unwrap_or_else(|payload| Err(panic_message(&payload)))
        })
    });

    // Convert any error message to an error code, writing to the `error` sink.
    match res {
        Ok(()) => 0,
        Err(msg) => {
            write_to_sink(error, msg.as_bytes());
            sys::Errno::HOST_CALL_FAILURE.code() as i16
        }
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: &(dyn core::any::Any + Send)) -> Box<str> {
    // Try to look into some string types we know (`&'static str` and `String`).
    match payload.downcast_ref::<&'static str>() {
        Some(s) => (*s).into(),
        None => match payload.downcast_ref::<String>() {
            Some(s) => s.as_str().into(),
            None => "reducer panicked".into(),
        },
    }
}

/// Run `logic` with `args` read from the host into a `&[u8]`.
fn with_read_args<R>(args: BytesSource, logic: impl FnOnce(&[u8]) -> R) -> R {
    if args == BytesSource::INVALID {
        return logic(&[]);
    }

    // Steal an iteration row buffer.
    // These were not meant for this purpose,
    // but it's likely we have one sitting around being unused at this point,
    // so use it to avoid allocating a temporary buffer if possible.
    // And if we do allocate a temporary buffer now, it will likely be reused later.
    let mut buf = IterBuf::take();

    // Read `args` and run `logic`.
    read_bytes_source_into(args, &mut buf);
    logic(&buf)
}

const NO_SPACE: u16 = sys::Errno::NO_SPACE.code();
const NO_SUCH_BYTES: u16 = sys::Errno::NO_SUCH_BYTES.code();

/// Read `source` from the host fully into `buf`.
fn read_bytes_source_into(source: BytesSource, buf: &mut Vec<u8>) {
    const INVALID: i16 = NO_SUCH_BYTES as i16;

    loop {
        // Write into the spare capacity of the buffer.
        let buf_ptr = buf.spare_capacity_mut();
        let spare_len = buf_ptr.len();
        let mut buf_len = buf_ptr.len();
        let buf_ptr = buf_ptr.as_mut_ptr().cast();
        let ret = unsafe { sys::raw::bytes_source_read(source, buf_ptr, &mut buf_len) };
        if ret <= 0 {
            // SAFETY: `bytes_source_read` just appended `buf_len` bytes to `buf`.
            unsafe { buf.set_len(buf.len() + buf_len) };
        }
        match ret {
            // Host side source exhausted, we're done.
            -1 => break,
            // Wrote the entire spare capacity.
            // Need to reserve more space in the buffer.
            0 if spare_len == buf_len => buf.reserve(1024),
            // Host didn't write as much as possible.
            // Try to read some more.
            // The host will likely not trigger this branch (current host doesn't),
            // but a module should be prepared for it.
            0 => {}
            INVALID => panic!("invalid source passed"),
            _ => unreachable!(),
        }
    }
}

/// Write `buf` to `sink`, looping until the host accepts the whole range.
fn write_to_sink(sink: BytesSink, mut buf: &[u8]) {
    loop {
        let len = &mut buf.len();
        match unsafe { sys::raw::bytes_sink_write(sink, buf.as_ptr(), len) } {
            0 => {
                // Set `buf` to remainder and bail if it's empty.
                (_, buf) = buf.split_at(*len);
                if buf.is_empty() {
                    break;
                }
            }
            NO_SUCH_BYTES => panic!("invalid sink passed"),
            NO_SPACE => panic!("no space left at sink"),
            _ => unreachable!(),
        }
    }
}

impl From<IndexAlgo<'_>> for spacetimedb_lib::db::raw_def::v9::RawIndexAlgorithm {
    fn from(algo: IndexAlgo<'_>) -> Self {
        match algo {
            IndexAlgo::BTree { columns } => Self::BTree {
                columns: columns.iter().map(|&c| ColId(c)).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_decode_in_declaration_order() {
        let bytes = bsatn::to_vec(&("Alice", 30u8));
        let (name, age) = <(String, u8)>::decode(&bytes).unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(age, 30);
    }

    #[test]
    fn args_reject_trailing_bytes() {
        let mut bytes = bsatn::to_vec(&("Alice", 30u8));
        bytes.push(0xff);
        assert!(matches!(
            <(String, u8)>::decode(&bytes),
            Err(DecodeError::TrailingBytes { num_bytes: 1 })
        ));
    }

    #[test]
    fn empty_args_decode_from_empty_stream() {
        <()>::decode(&[]).unwrap();
        assert!(<()>::decode(&[1]).is_err());
    }

    #[test]
    fn invoke_reducer_decodes_then_runs_the_handler() {
        let args = bsatn::to_vec(&("Alice", 30u8));
        let ran = std::cell::Cell::new(false);
        let res = invoke_reducer::<(String, u8), _>(
            |_: &ReducerContext, name: String, age: u8| {
                assert_eq!(name, "Alice");
                assert_eq!(age, 30);
                ran.set(true);
            },
            ReducerContext::__dummy(),
            &args,
        );
        assert_eq!(res, Ok(()));
        assert!(ran.get());
    }

    #[test]
    fn invoke_reducer_reports_decode_failures() {
        let err = invoke_reducer::<(String, u8), _>(
            |_: &ReducerContext, _: String, _: u8| {},
            ReducerContext::__dummy(),
            &[0xff],
        )
        .unwrap_err();
        assert!(err.contains("failed to decode reducer arguments"), "{err}");
    }

    #[test]
    fn handler_errors_become_rollback_messages() {
        let res = invoke_reducer::<(), _>(
            |_: &ReducerContext| Err("out of seats".to_string()),
            ReducerContext::__dummy(),
            &[],
        );
        assert_eq!(res, Err("out of seats".into()));
    }

    #[test]
    fn args_schema_carries_names_and_types() {
        let mut ts = RawModuleDefV9Builder::new();
        let params = <(String, u8)>::schema(&mut ts, &[Some("name"), Some("age")]);
        assert_eq!(params.arity(), 2);
        assert_eq!(params.elements[0].name(), Some("name"));
        assert_eq!(params.elements[0].algebraic_type, spacetimedb_lib::AlgebraicType::String);
        assert_eq!(params.elements[1].name(), Some("age"));
        assert_eq!(params.elements[1].algebraic_type, spacetimedb_lib::AlgebraicType::U8);
    }
}
