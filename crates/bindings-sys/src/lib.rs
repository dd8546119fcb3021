//! Defines sys calls to interact with SpacetimeDB.
//! This forms an ABI of sorts that modules written in Rust can use.

#[macro_use]
mod errno;

use core::fmt;
use core::mem::MaybeUninit;
use core::num::NonZeroU16;
use std::ptr;

use spacetimedb_primitives::{ColId, IndexId, TableId, ROW_ITER_CHUNK_SIZE};

/// Provides the raw set of sys calls which abstractions are built atop of.
pub mod raw {
    use spacetimedb_primitives::{ColId, IndexId, TableId};

    // This module identifier determines the ABI version that modules built
    // with this crate depend on. Non-breaking additions go into a new
    // `extern {}` block with the minor version bumped by one; breaking
    // changes move every function into a new `spacetime_X.0` block.
    #[cfg(target_arch = "wasm32")]
    #[link(wasm_import_module = "spacetime_10.0")]
    extern "C" {
        /// Queries the `table_id` associated with the given (table) `name`
        /// where `name` points to a UTF-8 slice in WASM memory of `name_len` bytes.
        ///
        /// The table id is written into the `out` pointer.
        ///
        /// Returns an error if
        /// - a table with the provided `name` doesn't exist
        /// - the slice `(name, name_len)` is not valid UTF-8
        pub fn table_id_from_name(name: *const u8, name_len: usize, out: *mut TableId) -> u16;

        /// Queries the `index_id` associated with the given (index) `name`
        /// where `name` points to a UTF-8 slice in WASM memory of `name_len` bytes.
        ///
        /// The index id is written into the `out` pointer.
        ///
        /// Returns an error if
        /// - an index with the provided `name` doesn't exist
        /// - the slice `(name, name_len)` is not valid UTF-8
        pub fn index_id_from_name(name: *const u8, name_len: usize, out: *mut IndexId) -> u16;

        /// Writes the number of rows currently in the table identified by
        /// `table_id` to the `out` pointer.
        ///
        /// Returns an error if
        /// - a table with the provided `table_id` doesn't exist
        /// - called outside a transaction
        pub fn datastore_table_row_count(table_id: TableId, out: *mut u64) -> u16;

        /// Starts iteration on each row, as BSATN-encoded bytes,
        /// of the table identified by `table_id`.
        ///
        /// An iterator handle is registered host-side
        /// and written to the `out` pointer.
        /// The iterator handle must eventually be consumed to exhaustion
        /// through [`row_iter_bsatn_advance`]
        /// or released through [`row_iter_bsatn_close`].
        ///
        /// Returns an error if
        /// - a table with the provided `table_id` doesn't exist
        /// - called outside a transaction
        pub fn datastore_table_scan_bsatn(table_id: TableId, out: *mut RowIter) -> u16;

        /// Inserts a row into the table identified by `table_id`,
        /// where the row is read from the byte slice `row`
        /// of length `*row_len` in WASM memory.
        ///
        /// The slice must be a BSATN-encoded product value
        /// matching the table's row schema.
        ///
        /// On success, the host writes back, into the same `row` buffer,
        /// the BSATN-encoded values of any host-assigned columns
        /// (auto-increment columns the row left at zero),
        /// in column order, and updates `*row_len` to their total length.
        ///
        /// Returns an error if
        /// - a table with the provided `table_id` doesn't exist
        /// - a unique constraint was violated
        /// - `row` doesn't decode to a row of the table's row type
        /// - called outside a transaction
        pub fn datastore_insert_bsatn(table_id: TableId, row: *mut u8, row_len: *mut usize) -> u16;

        /// Deletes all rows equal to any of the rows
        /// in the BSATN-encoded `Vec<ProductValue>`
        /// at the slice `(rel, rel_len)` in WASM memory.
        ///
        /// The number of rows deleted is written to the `out` pointer.
        ///
        /// Returns an error if
        /// - a table with the provided `table_id` doesn't exist
        /// - `(rel, rel_len)` doesn't decode to rows of the table's row type
        /// - called outside a transaction
        pub fn datastore_delete_all_by_eq_bsatn(table_id: TableId, rel: *const u8, rel_len: usize, out: *mut u32)
            -> u16;

        /// Starts iteration over the rows matched by the index identified
        /// by `index_id`, restricted to the half-open region described by
        /// `prefix`, `rstart`, and `rend`.
        ///
        /// `prefix` is the BSATN-encoded values of the first `prefix_elems`
        /// indexed columns, all matched exactly. `rstart` and `rend` are
        /// each a BSATN-encoded bound over the next indexed column:
        /// one byte of kind (0 = inclusive, 1 = exclusive, 2 = unbounded)
        /// followed by the encoded value when the kind is not unbounded.
        ///
        /// An iterator handle is registered host-side
        /// and written to the `out` pointer.
        ///
        /// Returns a (negated) error if
        /// - an index with the provided `index_id` doesn't exist
        /// - the prefix or bounds don't decode at the indexed column types
        /// - called outside a transaction
        pub fn datastore_btree_scan_bsatn(
            index_id: IndexId,
            prefix: *const u8,
            prefix_len: usize,
            prefix_elems: ColId,
            rstart: *const u8,
            rstart_len: usize,
            rend: *const u8,
            rend_len: usize,
            out: *mut RowIter,
        ) -> i16;

        /// Deletes all rows the index scan
        /// `(index_id, prefix…, rstart…, rend…)` would have yielded;
        /// the arguments are as for [`datastore_btree_scan_bsatn`].
        ///
        /// The number of rows deleted is written to the `out` pointer.
        ///
        /// Returns a (negated) error under the same conditions
        /// as [`datastore_btree_scan_bsatn`].
        pub fn datastore_delete_by_btree_scan_bsatn(
            index_id: IndexId,
            prefix: *const u8,
            prefix_len: usize,
            prefix_elems: ColId,
            rstart: *const u8,
            rstart_len: usize,
            rend: *const u8,
            rend_len: usize,
            out: *mut u32,
        ) -> i16;

        /// Advances the row iterator `iter`,
        /// filling the buffer `(buffer, *buffer_len)` in WASM memory
        /// with a chunk of zero or more whole BSATN-encoded rows.
        ///
        /// Returns, and writes through `buffer_len`:
        /// - positive `n`: `n` bytes of rows were written;
        ///   `*buffer_len` is set to `n`.
        /// - `0`: no data was ready this call; advance again.
        /// - `-1`: the iterator is exhausted and has been released host-side;
        ///   nothing was written.
        /// - other negative values: the negated error code.
        ///   For `-BUFFER_TOO_SMALL`, the size required for the next row
        ///   is written to `*buffer_len`; grow the buffer and retry.
        pub fn row_iter_bsatn_advance(iter: RowIter, buffer: *mut u8, buffer_len: *mut usize) -> i16;

        /// Releases the row iterator `iter` without draining it.
        ///
        /// Returns an error if `iter` doesn't identify a registered iterator,
        /// including one already consumed to exhaustion.
        pub fn row_iter_bsatn_close(iter: RowIter) -> u16;

        /// Reads up to `*buffer_len` bytes from the bytes source `source`
        /// into the buffer at `buffer` in WASM memory,
        /// writing the number of bytes read back through `buffer_len`.
        ///
        /// Returns
        /// - `0`: some bytes were read, possibly zero; read again.
        /// - `-1`: the source is exhausted; nothing further will arrive.
        /// - `NO_SUCH_BYTES` (positive): `source` is not a valid handle.
        pub fn bytes_source_read(source: BytesSource, buffer: *mut u8, buffer_len: *mut usize) -> i16;

        /// Writes up to `*buffer_len` bytes from the buffer at `buffer`
        /// in WASM memory to the bytes sink `sink`,
        /// writing the number of bytes accepted back through `buffer_len`.
        ///
        /// The sink may accept fewer bytes than offered;
        /// loop until the whole range is consumed.
        ///
        /// Returns an error if
        /// - `sink` is not a valid handle (`NO_SUCH_BYTES`)
        /// - the sink has no space left (`NO_SPACE`)
        pub fn bytes_sink_write(sink: BytesSink, buffer: *const u8, buffer_len: *mut usize) -> u16;

        /// Logs at `level` a `message` occurring in `filename:line_number`
        /// with [`target`] being the module path at the log invocation site.
        ///
        /// The various pointers are interpreted lossily as UTF-8 strings
        /// with a corresponding `_len`.
        ///
        /// The `target` and `filename` pointers are ignored by passing `NULL`.
        /// The line number is ignored if `line_number == u32::MAX`.
        ///
        /// [`target`]: https://docs.rs/log/latest/log/struct.Record.html#method.target
        pub fn console_log(
            level: u8,
            target: *const u8,
            target_len: usize,
            filename: *const u8,
            filename_len: usize,
            line_number: u32,
            message: *const u8,
            message_len: usize,
        );

        /// Writes the module's own 32-byte identity,
        /// in little-endian byte order, to `out`.
        pub fn identity(out: *mut u8);
    }

    // On non-WASM targets the imports don't exist;
    // these stubs keep the crate linking so the workspace
    // can be built and unit-tested natively.
    #[cfg(not(target_arch = "wasm32"))]
    mod stubs {
        #![allow(clippy::missing_safety_doc)]

        use super::{BytesSink, BytesSource, RowIter};
        use spacetimedb_primitives::{ColId, IndexId, TableId};

        fn host_only() -> ! {
            unimplemented!("host imports are only callable inside a SpacetimeDB WASM instance")
        }

        pub unsafe fn table_id_from_name(_: *const u8, _: usize, _: *mut TableId) -> u16 {
            host_only()
        }
        pub unsafe fn index_id_from_name(_: *const u8, _: usize, _: *mut IndexId) -> u16 {
            host_only()
        }
        pub unsafe fn datastore_table_row_count(_: TableId, _: *mut u64) -> u16 {
            host_only()
        }
        pub unsafe fn datastore_table_scan_bsatn(_: TableId, _: *mut RowIter) -> u16 {
            host_only()
        }
        pub unsafe fn datastore_insert_bsatn(_: TableId, _: *mut u8, _: *mut usize) -> u16 {
            host_only()
        }
        pub unsafe fn datastore_delete_all_by_eq_bsatn(_: TableId, _: *const u8, _: usize, _: *mut u32) -> u16 {
            host_only()
        }
        #[allow(clippy::too_many_arguments)]
        pub unsafe fn datastore_btree_scan_bsatn(
            _: IndexId,
            _: *const u8,
            _: usize,
            _: ColId,
            _: *const u8,
            _: usize,
            _: *const u8,
            _: usize,
            _: *mut RowIter,
        ) -> i16 {
            host_only()
        }
        #[allow(clippy::too_many_arguments)]
        pub unsafe fn datastore_delete_by_btree_scan_bsatn(
            _: IndexId,
            _: *const u8,
            _: usize,
            _: ColId,
            _: *const u8,
            _: usize,
            _: *const u8,
            _: usize,
            _: *mut u32,
        ) -> i16 {
            host_only()
        }
        pub unsafe fn row_iter_bsatn_advance(_: RowIter, _: *mut u8, _: *mut usize) -> i16 {
            host_only()
        }
        pub unsafe fn row_iter_bsatn_close(_: RowIter) -> u16 {
            host_only()
        }
        pub unsafe fn bytes_source_read(_: BytesSource, _: *mut u8, _: *mut usize) -> i16 {
            host_only()
        }
        pub unsafe fn bytes_sink_write(_: BytesSink, _: *const u8, _: *mut usize) -> u16 {
            host_only()
        }
        #[allow(clippy::too_many_arguments)]
        pub unsafe fn console_log(_: u8, _: *const u8, _: usize, _: *const u8, _: usize, _: u32, _: *const u8, _: usize) {
            host_only()
        }
        pub unsafe fn identity(_: *mut u8) {
            host_only()
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    pub use stubs::*;

    /// The error log level. See [`console_log`].
    pub const LOG_LEVEL_ERROR: u8 = 0;
    /// The warn log level. See [`console_log`].
    pub const LOG_LEVEL_WARN: u8 = 1;
    /// The info log level. See [`console_log`].
    pub const LOG_LEVEL_INFO: u8 = 2;
    /// The debug log level. See [`console_log`].
    pub const LOG_LEVEL_DEBUG: u8 = 3;
    /// The trace log level. See [`console_log`].
    pub const LOG_LEVEL_TRACE: u8 = 4;
    /// The panic log level. See [`console_log`].
    ///
    /// A panic level is emitted just before a fatal error
    /// causes the WASM module to trap.
    pub const LOG_LEVEL_PANIC: u8 = 101;

    /// A handle into a byte stream the host feeds to the module,
    /// e.g. the reducer argument stream.
    ///
    /// Handles are plain keys into a host-side slab;
    /// the host releases a source when it signals exhaustion.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    #[repr(transparent)]
    pub struct BytesSource(pub u32);

    impl BytesSource {
        /// An invalid handle, used by the host to spell "no bytes",
        /// e.g. an empty argument stream.
        pub const INVALID: Self = Self(0);
    }

    /// A handle into a byte stream the module feeds to the host,
    /// e.g. the descriptor sink or the error sink.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    #[repr(transparent)]
    pub struct BytesSink(pub u32);

    /// A handle onto a host-side row iterator.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    #[repr(transparent)]
    pub struct RowIter(pub u32);

    impl RowIter {
        /// An invalid handle, representing an iterator already consumed.
        pub const INVALID: Self = Self(0);
    }
}

/// Error values used in the safe bindings API.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Errno(NonZeroU16);

impl std::error::Error for Errno {}

macro_rules! def_errno {
    ($($name:ident => $desc:literal,)*) => {
        impl Errno {
            // SAFETY: `errnos!` contains no `0` values.
            $(#[doc = $desc] pub const $name: Errno = Errno(unsafe { NonZeroU16::new_unchecked(errno::$name) });)*
        }

        /// Returns a string representation of the error.
        const fn strerror(err: Errno) -> Option<&'static str> {
            match err {
                $(Errno::$name => Some($desc),)*
                _ => None,
            }
        }
    };
}
errnos!(def_errno);

impl Errno {
    /// Returns a description of the errno value, if any.
    pub const fn message(self) -> Option<&'static str> {
        strerror(self)
    }

    /// Converts the given `code` to an error number in `Errno`'s representation.
    #[inline]
    pub const fn from_code(code: u16) -> Option<Self> {
        match NonZeroU16::new(code) {
            Some(code) => Some(Errno(code)),
            None => None,
        }
    }

    /// Converts this `errno` into a primitive error code.
    #[inline]
    pub const fn code(self) -> u16 {
        self.0.get()
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fmt = f.debug_struct("Errno");
        fmt.field("code", &self.code());
        if let Some(msg) = self.message() {
            fmt.field("message", &msg);
        }
        fmt.finish()
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message().unwrap_or("Unknown error");
        write!(f, "{message} (error {})", self.code())
    }
}

/// Convert the status value `x` into a result.
/// When `x = 0`, we have a success status.
fn cvt(x: u16) -> Result<(), Errno> {
    match Errno::from_code(x) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

/// Convert the signed status value `x` into a result,
/// for the host calls that negate their error codes.
fn cvt_neg(x: i16) -> Result<(), Errno> {
    if x >= 0 {
        Ok(())
    } else {
        cvt((-x) as u16)
    }
}

/// Runs the given function `f` provided with an uninitialized `out` pointer.
///
/// Assuming the call to `f` succeeds (`Ok(_)`), the `out` pointer's value is returned.
///
/// # Safety
///
/// This function is safe to call, if and only if,
/// - The function `f` writes a safe and valid `T` to the `out` pointer.
///   It's not required to write to `out` when `f(out)` returns an error code.
/// - The function `f` never reads a safe and valid `T` from the `out` pointer
///   before writing a safe and valid `T` to it.
#[inline]
unsafe fn call<T>(f: impl FnOnce(*mut T) -> u16) -> Result<T, Errno> {
    let mut out = MaybeUninit::uninit();
    cvt(f(out.as_mut_ptr()))?;
    Ok(out.assume_init())
}

/// Queries and returns the `table_id` associated with the given (table) `name`.
///
/// Returns an error if the table does not exist.
#[inline]
pub fn table_id_from_name(name: &str) -> Result<TableId, Errno> {
    unsafe { call(|out| raw::table_id_from_name(name.as_ptr(), name.len(), out)) }
}

/// Queries and returns the `index_id` associated with the given (index) `name`.
///
/// Returns an error if the index does not exist.
#[inline]
pub fn index_id_from_name(name: &str) -> Result<IndexId, Errno> {
    unsafe { call(|out| raw::index_id_from_name(name.as_ptr(), name.len(), out)) }
}

/// Returns the number of rows currently in the table identified by `table_id`.
#[inline]
pub fn datastore_table_row_count(table_id: TableId) -> Result<u64, Errno> {
    unsafe { call(|out| raw::datastore_table_row_count(table_id, out)) }
}

/// Starts iteration on each row, as bytes, of the table
/// identified by `table_id`, returning the iterator handle.
#[inline]
pub fn datastore_table_scan_bsatn(table_id: TableId) -> Result<RowIter, Errno> {
    let raw = unsafe { call(|out| raw::datastore_table_scan_bsatn(table_id, out)) }?;
    Ok(RowIter { raw })
}

/// Inserts the BSATN-encoded `row` into the table identified by `table_id`.
///
/// On success, returns the slice of `row` the host rewrote with the values
/// of any host-assigned columns, in column order.
#[inline]
pub fn datastore_insert_bsatn(table_id: TableId, row: &mut Vec<u8>) -> Result<&[u8], Errno> {
    let row_ptr = row.as_mut_ptr();
    let mut row_len = row.len();
    cvt(unsafe { raw::datastore_insert_bsatn(table_id, row_ptr, &mut row_len) })?;
    Ok(&row[..row_len])
}

/// Deletes all rows equal to any row in the BSATN-encoded
/// `Vec<ProductValue>` in `relation`.
///
/// Returns the number of rows deleted.
#[inline]
pub fn datastore_delete_all_by_eq_bsatn(table_id: TableId, relation: &[u8]) -> Result<u32, Errno> {
    unsafe { call(|out| raw::datastore_delete_all_by_eq_bsatn(table_id, relation.as_ptr(), relation.len(), out)) }
}

/// Starts an index scan on `index_id`
/// over the region `(prefix, prefix_elems, rstart, rend)`,
/// returning the iterator handle.
///
/// The region arguments are encoded as documented on
/// [`raw::datastore_btree_scan_bsatn`].
#[inline]
pub fn datastore_btree_scan_bsatn(
    index_id: IndexId,
    prefix: &[u8],
    prefix_elems: ColId,
    rstart: &[u8],
    rend: &[u8],
) -> Result<RowIter, Errno> {
    let mut out = MaybeUninit::uninit();
    cvt_neg(unsafe {
        raw::datastore_btree_scan_bsatn(
            index_id,
            prefix.as_ptr(),
            prefix.len(),
            prefix_elems,
            rstart.as_ptr(),
            rstart.len(),
            rend.as_ptr(),
            rend.len(),
            out.as_mut_ptr(),
        )
    })?;
    Ok(RowIter {
        raw: unsafe { out.assume_init() },
    })
}

/// Deletes all rows the index scan
/// `(index_id, prefix, prefix_elems, rstart, rend)` would have yielded.
///
/// Returns the number of rows deleted.
#[inline]
pub fn datastore_delete_by_btree_scan_bsatn(
    index_id: IndexId,
    prefix: &[u8],
    prefix_elems: ColId,
    rstart: &[u8],
    rend: &[u8],
) -> Result<u32, Errno> {
    let mut out = MaybeUninit::uninit();
    cvt_neg(unsafe {
        raw::datastore_delete_by_btree_scan_bsatn(
            index_id,
            prefix.as_ptr(),
            prefix.len(),
            prefix_elems,
            rstart.as_ptr(),
            rstart.len(),
            rend.as_ptr(),
            rend.len(),
            out.as_mut_ptr(),
        )
    })?;
    Ok(unsafe { out.assume_init() })
}

/// A log level that can be used in `console_log`.
/// The variants are convertible into a raw `u8` log level.
#[repr(u8)]
pub enum LogLevel {
    /// The error log level. See [`console_log`].
    Error = raw::LOG_LEVEL_ERROR,
    /// The warn log level. See [`console_log`].
    Warn = raw::LOG_LEVEL_WARN,
    /// The info log level. See [`console_log`].
    Info = raw::LOG_LEVEL_INFO,
    /// The debug log level. See [`console_log`].
    Debug = raw::LOG_LEVEL_DEBUG,
    /// The trace log level. See [`console_log`].
    Trace = raw::LOG_LEVEL_TRACE,
    /// The panic log level. See [`console_log`].
    ///
    /// A panic level is emitted just before a fatal error
    /// causes the WASM module to trap.
    Panic = raw::LOG_LEVEL_PANIC,
}

/// Log at `level` a `text` message occurring in `filename:line_number`
/// with [`target`] being the module path at the `log!` invocation site.
///
/// [`target`]: https://docs.rs/log/latest/log/struct.Record.html#method.target
#[inline]
pub fn console_log(
    level: LogLevel,
    target: Option<&str>,
    filename: Option<&str>,
    line_number: Option<u32>,
    text: &str,
) {
    let opt_ptr = |b: Option<&str>| b.map_or(ptr::null(), |b| b.as_ptr());
    let opt_len = |b: Option<&str>| b.map_or(0, |b| b.len());
    unsafe {
        raw::console_log(
            level as u8,
            opt_ptr(target),
            opt_len(target),
            opt_ptr(filename),
            opt_len(filename),
            line_number.unwrap_or(u32::MAX),
            text.as_ptr(),
            text.len(),
        )
    }
}

/// Returns the module's own 32-byte identity, in little-endian byte order.
#[inline]
pub fn identity() -> [u8; 32] {
    let mut out = [0u8; 32];
    unsafe { raw::identity(out.as_mut_ptr()) };
    out
}

pub use raw::{BytesSink, BytesSource};

/// A scoped handle onto a host-side row iterator.
///
/// Rows arrive in chunks of zero or more whole BSATN-encoded rows
/// per call to [`RowIter::read`]. The handle is released on every exit
/// path: by the host once the iterator reports exhaustion,
/// or by `Drop` on early termination.
pub struct RowIter {
    raw: raw::RowIter,
}

impl RowIter {
    /// Fills `buf` with the next chunk of BSATN-encoded rows,
    /// growing it when the host reports a row larger than its capacity.
    ///
    /// Returns the number of bytes appended.
    /// A return of zero means the iterator is exhausted.
    pub fn read(&mut self, buf: &mut Vec<u8>) -> usize {
        const EXHAUSTED: i16 = -1;

        while !self.is_exhausted() {
            if buf.spare_capacity_mut().is_empty() {
                buf.reserve(ROW_ITER_CHUNK_SIZE);
            }
            let spare = buf.spare_capacity_mut();
            let mut buf_len = spare.len();
            let buf_ptr = spare.as_mut_ptr().cast();

            let ret = unsafe { raw::row_iter_bsatn_advance(self.raw, buf_ptr, &mut buf_len) };
            match ret {
                EXHAUSTED => {
                    // The host has released the iterator.
                    self.raw = raw::RowIter::INVALID;
                }
                0 => continue,
                written if written > 0 => {
                    // SAFETY: the host just wrote `written` bytes
                    // into the spare capacity.
                    unsafe { buf.set_len(buf.len() + written as usize) };
                    return written as usize;
                }
                err => {
                    let err = Errno::from_code((-err) as u16);
                    if err == Some(Errno::BUFFER_TOO_SMALL) {
                        // The required size was written through `buf_len`.
                        buf.reserve(buf_len);
                    } else {
                        panic!("row_iter_bsatn_advance failed: {err:?}");
                    }
                }
            }
        }
        0
    }

    /// Returns whether the iterator has reported exhaustion.
    pub fn is_exhausted(&self) -> bool {
        self.raw == raw::RowIter::INVALID
    }
}

impl Drop for RowIter {
    fn drop(&mut self) {
        if !self.is_exhausted() {
            cvt(unsafe { raw::row_iter_bsatn_close(self.raw) }).expect("failed to close row iterator");
        }
    }
}
