//! The SpacetimeDB Rust module bindings.
//!
//! A module declares tables and reducers, and the host drives it through
//! two exported functions: `__describe_module__`, which emits the module
//! descriptor, and `__call_reducer__`, which dispatches one reducer
//! invocation inside its own transaction.
//!
//! Declare a row type with [`impl_st_struct!`], surface it as a table with
//! [`register_table!`], and wire transactional procedures up with
//! [`register_reducer!`]. Descriptor assembly, argument decoding,
//! row codecs, and the host calls underneath are all handled here.

mod client_visibility_filter;
pub mod io;
mod logger;
mod macros;
#[cfg(feature = "rand")]
mod rng;
#[doc(hidden)]
pub mod rt;
pub mod table;

use core::cell::RefCell;

use spacetimedb_lib::bsatn;

pub use log;
#[cfg(feature = "rand")]
pub use rand08 as rand;

pub use client_visibility_filter::Filter;
#[cfg(feature = "rand")]
pub use rng::StdbRng;
pub use spacetimedb_bindings_sys as sys;
pub use spacetimedb_lib;
pub use spacetimedb_lib::db::raw_def::v9::{Lifecycle, TableAccess};
pub use spacetimedb_lib::sats;
pub use spacetimedb_lib::sats::{Deserialize, Serialize, SpacetimeType};
pub use spacetimedb_lib::ConnectionId;
pub use spacetimedb_lib::Identity;
pub use spacetimedb_lib::ScheduleAt;
pub use spacetimedb_lib::TimeDuration;
pub use spacetimedb_lib::Timestamp;
pub use spacetimedb_primitives::TableId;
pub use sys::Errno;
pub use table::{AutoIncOverflow, RangedIndex, Table, TryInsertError, UniqueColumn, UniqueConstraintViolation};

/// The outcome of a reducer invocation, before it reaches the host:
/// `Ok(())` commits, `Err(message)` rolls back and surfaces the message.
pub type ReducerResult = core::result::Result<(), Box<str>>;

/// The context that any reducer is provided with.
///
/// This must be the first argument of every reducer. Carries information
/// about the caller and the time of invocation, as well as a view onto
/// the module's database.
#[non_exhaustive]
pub struct ReducerContext {
    /// The `Identity` of the caller that invoked the reducer.
    pub sender: Identity,

    /// The time at which the reducer was started.
    pub timestamp: Timestamp,

    /// The `ConnectionId` of the caller, or `None` if the reducer was
    /// invoked by the module itself (e.g. for a scheduled reducer),
    /// in which case the host passes the all-zeros id.
    pub connection_id: Option<ConnectionId>,

    /// A view onto the module's database.
    ///
    /// This type appears to have no methods; the table registration
    /// macros use the trait system to hang per-table accessors off it,
    /// so that `ctx.db.{table}()` returns a handle to table *table*.
    pub db: Local,

    #[cfg(feature = "rand")]
    rng: core::cell::OnceCell<StdbRng>,
}

impl ReducerContext {
    pub(crate) fn new(db: Local, sender: Identity, connection_id: Option<ConnectionId>, timestamp: Timestamp) -> Self {
        Self {
            db,
            sender,
            timestamp,
            connection_id,
            #[cfg(feature = "rand")]
            rng: core::cell::OnceCell::new(),
        }
    }

    #[doc(hidden)]
    pub fn __dummy() -> Self {
        Self::new(Local {}, Identity::__dummy(), None, Timestamp::UNIX_EPOCH)
    }

    /// Reads the current module's own [`Identity`].
    ///
    /// This is a single host call; the module identity is not stored
    /// in any table the module could read instead.
    pub fn identity(&self) -> Identity {
        Identity::from_byte_array(sys::identity())
    }
}

/// A handle on a database with a particular table schema.
pub trait DbContext {
    /// A view into the tables of a database,
    /// specialized on the database's particular schema.
    type DbView;

    /// Returns a view into the tables.
    ///
    /// Provided for code that wants to be generic over the context type;
    /// concretely-typed code reads the `.db` field instead.
    fn db(&self) -> &Self::DbView;
}

impl DbContext for ReducerContext {
    type DbView = Local;

    fn db(&self) -> &Self::DbView {
        &self.db
    }
}

/// A view onto the local database attached to the module.
///
/// The [`register_table!`] macro implements per-table accessor traits
/// on this type; it is otherwise opaque.
#[non_exhaustive]
pub struct Local {}

/// Returns the timestamp of the reducer invocation currently running.
///
/// Panics outside of a reducer call. Prefer reading
/// [`ReducerContext::timestamp`] where a context is in reach.
pub fn current_timestamp() -> Timestamp {
    assert!(
        rt::CURRENT_TIMESTAMP.is_set(),
        "there is no current time in this context"
    );
    rt::CURRENT_TIMESTAMP.with(|ts| *ts)
}

/// Queries and caches nothing: returns the `table_id` for `table_name`,
/// panicking if the host does not know the table.
#[doc(hidden)]
pub fn table_id_from_name(table_name: &str) -> TableId {
    sys::table_id_from_name(table_name).unwrap_or_else(|_| {
        panic!("Failed to get table with name: {}", table_name);
    })
}

// This should guarantee in most cases that we don't have to reallocate an
// iterator buffer, unless there's a single row that serializes to >8 KiB.
const DEFAULT_BUFFER_CAPACITY: usize = spacetimedb_primitives::ROW_ITER_CHUNK_SIZE;

thread_local! {
    /// A global pool of buffers used for iteration.
    // This gets optimized away to a normal global since wasm32 doesn't have threads by default.
    static ITER_BUFS: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
}

/// A borrowed buffer from the iteration pool,
/// returned to the pool on drop.
pub(crate) struct IterBuf {
    buf: Vec<u8>,
}

impl IterBuf {
    /// Takes a buffer from the pool of buffers for row iterators,
    /// if one exists. Otherwise, allocates a new one.
    pub(crate) fn take() -> Self {
        let buf = ITER_BUFS
            .with_borrow_mut(|bufs| bufs.pop())
            .unwrap_or_else(|| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY));
        Self { buf }
    }

    /// Takes a pooled buffer holding the BSATN encoding of `val`.
    pub(crate) fn serialize<T: Serialize + ?Sized>(val: &T) -> Self {
        let mut buf = IterBuf::take();
        buf.serialize_into(val);
        buf
    }

    /// Appends the BSATN encoding of `val` to the buffer.
    #[inline]
    pub(crate) fn serialize_into<T: Serialize + ?Sized>(&mut self, val: &T) {
        bsatn::to_writer(&mut self.buf, val);
    }
}

impl Drop for IterBuf {
    fn drop(&mut self) {
        self.buf.clear();
        let buf = core::mem::take(&mut self.buf);
        ITER_BUFS.with_borrow_mut(|bufs| bufs.push(buf));
    }
}

impl AsRef<[u8]> for IterBuf {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl core::ops::Deref for IterBuf {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl core::ops::DerefMut for IterBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}
