use core::marker::PhantomData;
use core::ops::{self, Bound};
use std::fmt;

use spacetimedb_lib::bsatn;
use spacetimedb_lib::sats::buffer::{BufReader, Cursor};
use spacetimedb_lib::sats::{i256, u256, Deserialize, Serialize, SpacetimeType};
use spacetimedb_lib::{ConnectionId, Identity};

pub use spacetimedb_lib::db::raw_def::v9::TableAccess;
pub use spacetimedb_primitives::{ColId, IndexId, TableId};

use crate::{sys, IterBuf};

/// A handle on a database table.
///
/// Implemented by the per-table handle types the [`crate::register_table!`]
/// macro declares; one handle stands for the whole set of rows of that
/// table within the current transaction.
pub trait Table: TableInternal {
    /// The type of rows stored in this table.
    type Row: SpacetimeType + Serialize + Deserialize + Sized + 'static;

    /// Returns the number of rows of this table in the transaction state.
    fn count(&self) -> u64 {
        sys::datastore_table_row_count(Self::table_id()).expect("datastore_table_row_count() call failed")
    }

    /// Iterates over all rows in the transaction state.
    ///
    /// The scan is streaming: rows arrive in chunks as the iterator is
    /// driven, and the host-side handle is released on every exit path.
    #[inline]
    fn iter(&self) -> impl Iterator<Item = Self::Row> {
        let table_id = Self::table_id();
        let iter = sys::datastore_table_scan_bsatn(table_id).expect("datastore_table_scan_bsatn() call failed");
        TableIter::new(iter)
    }

    /// Inserts `row` into the table.
    ///
    /// The return value is the inserted row, with any auto-incrementing
    /// columns replaced with computed values. `insert` always returns the
    /// row, even when the table has no auto-incrementing columns.
    ///
    /// Panics if inserting the row violates a constraint;
    /// callers intending to handle that use [`Self::try_insert`].
    #[track_caller]
    fn insert(&self, row: Self::Row) -> Self::Row {
        self.try_insert(row).unwrap_or_else(|e| panic!("{e}"))
    }

    /// The error type of this table for unique constraint violations:
    /// [`UniqueConstraintViolation`] if the table has a unique constraint,
    /// [`core::convert::Infallible`] otherwise.
    type UniqueConstraintViolation: MaybeError<UniqueConstraintViolation>;
    /// The error type of this table for auto-increment overflows:
    /// [`AutoIncOverflow`] if the table has an auto-increment column,
    /// [`core::convert::Infallible`] otherwise.
    type AutoIncOverflow: MaybeError<AutoIncOverflow>;

    /// Counterpart to [`Self::insert`] which allows handling failed insertions.
    #[track_caller]
    fn try_insert(&self, row: Self::Row) -> Result<Self::Row, TryInsertError<Self>> {
        insert::<Self>(row, IterBuf::take())
    }

    /// Deletes a row equal to `row` from the table.
    ///
    /// Returns `true` if the row was present and has been deleted,
    /// or `false` if it was not present and the table is unchanged.
    fn delete(&self, row: Self::Row) -> bool {
        let relation = core::slice::from_ref(&row);
        let buf = IterBuf::serialize(relation);
        let count = sys::datastore_delete_all_by_eq_bsatn(Self::table_id(), &buf)
            .expect("datastore_delete_all_by_eq_bsatn() call failed");
        count > 0
    }

    /// Re-integrates the BSATN of the `generated_cols` into `row`.
    #[doc(hidden)]
    fn integrate_generated_columns(row: &mut Self::Row, generated_cols: &[u8]);
}

/// The compile-time description of a table,
/// filled in by the [`crate::register_table!`] macro.
#[doc(hidden)]
pub trait TableInternal: Sized {
    const TABLE_NAME: &'static str;
    const TABLE_ACCESS: TableAccess = TableAccess::Private;
    /// Columns carrying a unique constraint, one entry per constraint.
    const UNIQUE_COLUMNS: &'static [u16] = &[];
    /// Field names of the unique columns, in the same order.
    const UNIQUE_COLUMN_NAMES: &'static [&'static str] = &[];
    /// Every index of the table, including those backing unique columns.
    const INDEXES: &'static [IndexDesc<'static>] = &[];
    const PRIMARY_KEY: Option<u16> = None;
    /// Columns fed by an auto-increment sequence.
    const SEQUENCES: &'static [u16] = &[];
    const SCHEDULE: Option<ScheduleDesc<'static>> = None;

    /// Returns the ID of this table, looked up by name through the host
    /// on first use and cached for the life of the instance.
    fn table_id() -> TableId;
}

/// Describes a named index over a set of columns.
#[derive(Clone, Copy)]
pub struct IndexDesc<'a> {
    /// The module-side accessor name;
    /// the descriptor index name is derived from it.
    pub accessor_name: &'a str,
    pub algo: IndexAlgo<'a>,
}

/// The algorithm and columns of an index.
#[derive(Clone, Copy)]
pub enum IndexAlgo<'a> {
    BTree { columns: &'a [u16] },
}

/// Describes the scheduling of a scheduled table.
#[derive(Clone, Copy)]
pub struct ScheduleDesc<'a> {
    /// The reducer fired for each row of the table.
    pub reducer_name: &'a str,
    /// The column holding the row's `ScheduleAt`.
    pub scheduled_at_column: u16,
}

/// A UNIQUE constraint violation on a table was attempted.
#[derive(Debug)]
#[non_exhaustive]
pub struct UniqueConstraintViolation {
    /// The table the insertion was attempted on.
    pub table: &'static str,
    /// The name of a unique column of that table.
    ///
    /// The host does not report which constraint failed;
    /// tables with several unique columns name the first.
    pub column: &'static str,
}

impl fmt::Display for UniqueConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate value in unique column `{}` of table `{}`",
            self.column, self.table
        )
    }
}

impl std::error::Error for UniqueConstraintViolation {}

/// An auto-inc column overflowed its data type.
#[derive(Debug)]
#[non_exhaustive]
pub struct AutoIncOverflow {
    /// The table the insertion was attempted on.
    pub table: &'static str,
}

impl fmt::Display for AutoIncOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "auto-inc sequence of table `{}` overflowed its column type", self.table)
    }
}

impl std::error::Error for AutoIncOverflow {}

/// The error type returned from [`Table::try_insert()`],
/// signalling a constraint violation.
pub enum TryInsertError<Tbl: Table> {
    /// An insertion had the same value in a unique column
    /// as an already-present row.
    UniqueConstraintViolation(Tbl::UniqueConstraintViolation),

    /// An insertion advanced an auto-inc sequence
    /// past the bounds of the column type.
    AutoIncOverflow(Tbl::AutoIncOverflow),
}

impl<Tbl: Table> fmt::Debug for TryInsertError<Tbl> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TryInsertError::<{}>::", Tbl::TABLE_NAME)?;
        match self {
            Self::UniqueConstraintViolation(e) => fmt::Debug::fmt(e, f),
            Self::AutoIncOverflow(e) => fmt::Debug::fmt(e, f),
        }
    }
}

impl<Tbl: Table> fmt::Display for TryInsertError<Tbl> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insertion error on table `{}`: ", Tbl::TABLE_NAME)?;
        match self {
            Self::UniqueConstraintViolation(e) => fmt::Display::fmt(e, f),
            Self::AutoIncOverflow(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<Tbl: Table> std::error::Error for TryInsertError<Tbl> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(match self {
            Self::UniqueConstraintViolation(e) => e,
            Self::AutoIncOverflow(e) => e,
        })
    }
}

impl<Tbl: Table> From<TryInsertError<Tbl>> for String {
    fn from(err: TryInsertError<Tbl>) -> Self {
        err.to_string()
    }
}

/// Either a concrete error type, or [`core::convert::Infallible`]
/// for tables where the error cannot arise.
#[doc(hidden)]
pub trait MaybeError<E = Self>: std::error::Error + Send + Sync + Sized + 'static {
    fn get<Tbl: TableInternal>() -> Option<Self>;
}

impl<E> MaybeError<E> for core::convert::Infallible {
    fn get<Tbl: TableInternal>() -> Option<Self> {
        None
    }
}

impl MaybeError for UniqueConstraintViolation {
    fn get<Tbl: TableInternal>() -> Option<Self> {
        Some(UniqueConstraintViolation {
            table: Tbl::TABLE_NAME,
            column: Tbl::UNIQUE_COLUMN_NAMES.first().copied().unwrap_or("?"),
        })
    }
}

impl MaybeError for AutoIncOverflow {
    fn get<Tbl: TableInternal>() -> Option<Self> {
        Some(AutoIncOverflow { table: Tbl::TABLE_NAME })
    }
}

/// A column of a table, described at the type level.
pub trait Column {
    type Row;
    type ColType;
    const COLUMN_NAME: &'static str;
    fn get_field(row: &Self::Row) -> &Self::ColType;
}

/// An index of a table, resolvable to its host-assigned id.
pub trait Index {
    /// Returns the ID of this index, looked up by name through the host
    /// on first use and cached for the life of the instance.
    fn index_id() -> IndexId;
}

/// A handle on the unique index backing a `unique` column.
///
/// Offers point lookup, point deletion, and row replacement keyed on the
/// column's value.
pub struct UniqueColumn<Tbl: Table, ColType, Col>
where
    ColType: SpacetimeType + Serialize + Deserialize,
    Col: Index + Column<Row = Tbl::Row, ColType = ColType>,
{
    _marker: PhantomData<(Tbl, Col)>,
}

impl<Tbl: Table, ColType, Col> UniqueColumn<Tbl, ColType, Col>
where
    ColType: SpacetimeType + Serialize + Deserialize,
    Col: Index + Column<Row = Tbl::Row, ColType = ColType>,
{
    #[doc(hidden)]
    pub const __NEW: Self = Self { _marker: PhantomData };

    #[inline]
    fn point_scan_args(&self, col_val: &ColType) -> IndexScanArgs {
        IndexScanArgs {
            data: IterBuf::serialize(&Bound::Included(col_val)),
            prefix_elems: 0,
            rstart_idx: 0,
            rend_idx: None,
        }
    }

    /// Finds and returns the row where the value in the unique column
    /// matches the supplied `col_val`, or `None` if no such row exists.
    #[inline]
    pub fn find(&self, col_val: &ColType) -> Option<Tbl::Row> {
        let index_id = Col::index_id();
        let args = self.point_scan_args(col_val);
        let (prefix, prefix_elems, rstart, rend) = args.args_for_syscall();

        let iter = sys::datastore_btree_scan_bsatn(index_id, prefix, prefix_elems, rstart, rend)
            .unwrap_or_else(|e| panic!("unique: unexpected error from datastore_btree_scan_bsatn: {e}"));
        let mut iter = TableIter::new_with_buf(iter, args.data);

        // The unique constraint means this scan sees 0 or 1 rows.
        let row = iter.next();
        assert!(
            iter.is_exhausted(),
            "datastore_btree_scan_bsatn on unique field cannot return >1 rows"
        );
        row
    }

    /// Deletes the row where the value in the unique column matches the
    /// supplied `col_val`, if any such row is present.
    ///
    /// Returns `true` if a matching row was present and has been deleted.
    #[inline]
    pub fn delete(&self, col_val: &ColType) -> bool {
        self._delete(col_val).0
    }

    fn _delete(&self, col_val: &ColType) -> (bool, IterBuf) {
        let index_id = Col::index_id();
        let args = self.point_scan_args(col_val);
        let (prefix, prefix_elems, rstart, rend) = args.args_for_syscall();

        let n_del = sys::datastore_delete_by_btree_scan_bsatn(index_id, prefix, prefix_elems, rstart, rend)
            .unwrap_or_else(|e| panic!("unique: unexpected error from datastore_delete_by_btree_scan_bsatn: {e}"));

        (n_del > 0, args.data)
    }

    /// Deletes the row whose unique column matches that of `new_row`,
    /// then inserts `new_row`.
    ///
    /// Returns the row as actually inserted, with any auto-inc
    /// placeholders substituted for computed values.
    ///
    /// # Panics
    /// Panics if no row was previously present with the matching value,
    /// or if either the deletion or the insertion violates a constraint.
    #[track_caller]
    pub fn update(&self, new_row: Tbl::Row) -> Tbl::Row {
        let (deleted, buf) = self._delete(Col::get_field(&new_row));
        if !deleted {
            update_row_didnt_exist(Tbl::TABLE_NAME, Col::COLUMN_NAME)
        }
        insert::<Tbl>(new_row, buf).unwrap_or_else(|e| panic!("{e}"))
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn update_row_didnt_exist(table_name: &str, unique_column: &str) -> ! {
    panic!("UniqueColumn::update: row in table `{table_name}` being updated by unique column `{unique_column}` did not already exist")
}

/// A handle on a btree index, offering filtered iteration and deletion
/// over ranges of the indexed column(s).
pub struct RangedIndex<Tbl: Table, IndexType, Idx: Index> {
    _marker: PhantomData<(Tbl, IndexType, Idx)>,
}

impl<Tbl: Table, IndexType, Idx: Index> RangedIndex<Tbl, IndexType, Idx> {
    #[doc(hidden)]
    pub const __NEW: Self = Self { _marker: PhantomData };

    /// Returns an iterator over all rows where the indexed column(s)
    /// match the bounds `b`, in index order.
    ///
    /// `b` may be:
    /// - A value or a range for the first indexed column.
    /// - A tuple of values for a prefix of the indexed columns,
    ///   terminated by a value or range for the next one.
    pub fn filter<B, K>(&self, b: B) -> impl Iterator<Item = Tbl::Row>
    where
        B: RangeScan<IndexType, K>,
    {
        let index_id = Idx::index_id();
        let args = b.scan_args();
        let (prefix, prefix_elems, rstart, rend) = args.args_for_syscall();
        let iter = sys::datastore_btree_scan_bsatn(index_id, prefix, prefix_elems, rstart, rend)
            .unwrap_or_else(|e| panic!("unexpected error from datastore_btree_scan_bsatn: {e}"));
        TableIter::new_with_buf(iter, args.data)
    }

    /// Deletes all rows where the indexed column(s) match the bounds `b`,
    /// returning how many were deleted.
    ///
    /// `b` is interpreted as in [`Self::filter`].
    pub fn delete<B, K>(&self, b: B) -> u64
    where
        B: RangeScan<IndexType, K>,
    {
        let index_id = Idx::index_id();
        let args = b.scan_args();
        let (prefix, prefix_elems, rstart, rend) = args.args_for_syscall();
        sys::datastore_delete_by_btree_scan_bsatn(index_id, prefix, prefix_elems, rstart, rend)
            .unwrap_or_else(|e| panic!("unexpected error from datastore_delete_by_btree_scan_bsatn: {e}"))
            .into()
    }
}

/// Types which can appear as an argument to an index filtering operation
/// for a column of type `Column`.
///
/// Only implemented where equality and ordering are portable across every
/// SDK language: integers, bools, strings, and the special id types.
pub trait FilterableValue: Serialize {
    type Column;
}

macro_rules! impl_filterable_value {
    (@one $arg:ty => $col:ty) => {
        impl FilterableValue for $arg {
            type Column = $col;
        }
    };
    (@one $arg:ty: Copy) => {
        impl_filterable_value!(@one $arg => $arg);
        impl_filterable_value!(@one &$arg => $arg);
    };
    (@one $arg:ty) => {
        impl_filterable_value!(@one &$arg => $arg);
    };
    ($($arg:ty $(: $copy:ident)? $(=> $col:ty)?),* $(,)?) => {
        $(impl_filterable_value!(@one $arg $(: $copy)? $(=> $col)?);)*
    };
}

impl_filterable_value! {
    u8: Copy,
    u16: Copy,
    u32: Copy,
    u64: Copy,
    u128: Copy,
    u256: Copy,
    i8: Copy,
    i16: Copy,
    i32: Copy,
    i64: Copy,
    i128: Copy,
    i256: Copy,
    bool: Copy,
    String,
    &str => String,
    Identity: Copy,
    ConnectionId: Copy,
}

/// Arguments to one of the btree-scan host calls.
///
/// All slices passed to the syscall are packed into the single pooled
/// buffer `data`, sliced at the recorded offsets, to save allocations.
#[doc(hidden)]
pub struct IndexScanArgs {
    data: IterBuf,
    prefix_elems: usize,
    rstart_idx: usize,
    // None when rstart and rend are the same point bound.
    rend_idx: Option<usize>,
}

impl IndexScanArgs {
    fn args_for_syscall(&self) -> (&[u8], ColId, &[u8], &[u8]) {
        let prefix = &self.data[..self.rstart_idx];
        let (rstart, rend) = match self.rend_idx {
            Some(rend_idx) => (&self.data[self.rstart_idx..rend_idx], &self.data[rend_idx..]),
            None => {
                let elem = &self.data[self.rstart_idx..];
                (elem, elem)
            }
        };
        (prefix, ColId::from(self.prefix_elems), rstart, rend)
    }
}

/// A terminating bound over the last queried column of an index scan:
/// either a point or a range.
pub enum TermBound<T> {
    Single(Bound<T>),
    Range(Bound<T>, Bound<T>),
}

impl<B: Serialize> TermBound<&B> {
    /// Serializes the bound(s) into `buf`.
    ///
    /// For [`TermBound::Range`], returns the offset in `buf` of the first
    /// byte of the end bound.
    #[inline]
    fn serialize_into(&self, buf: &mut Vec<u8>) -> Option<usize> {
        let (start, end) = match self {
            TermBound::Single(elem) => (elem, None),
            TermBound::Range(start, end) => (start, Some(end)),
        };
        bsatn::to_writer(buf, start);
        end.map(|end| {
            let rend_idx = buf.len();
            bsatn::to_writer(buf, end);
            rend_idx
        })
    }
}

/// Types usable as the terminating argument of an index scan:
/// a bare value, or any of the standard range forms over one.
pub trait RangeScanTerminator {
    type Arg;
    fn bounds(&self) -> TermBound<&Self::Arg>;
}

impl<Col, Arg: FilterableValue<Column = Col>> RangeScanTerminator for Arg {
    type Arg = Arg;
    fn bounds(&self) -> TermBound<&Arg> {
        TermBound::Single(Bound::Included(self))
    }
}

macro_rules! impl_terminator {
    ($($range:ty),* $(,)?) => {
        $(impl<T: FilterableValue> RangeScanTerminator for $range {
            type Arg = T;
            fn bounds(&self) -> TermBound<&T> {
                TermBound::Range(
                    ops::RangeBounds::start_bound(self),
                    ops::RangeBounds::end_bound(self),
                )
            }
        })*
    };
}

impl_terminator!(
    ops::Range<T>,
    ops::RangeFrom<T>,
    ops::RangeInclusive<T>,
    ops::RangeTo<T>,
    ops::RangeToInclusive<T>,
    (Bound<T>, Bound<T>),
);

/// Marker distinguishing the bare-value impls of [`RangeScan`]
/// from the tuple impls.
pub struct SingleBound;

/// Types which can describe the queried region of an index scan over
/// columns `IndexType`: a prefix of exact values followed by one
/// terminating value or range.
pub trait RangeScan<IndexType, K = ()> {
    #[doc(hidden)]
    fn scan_args(&self) -> IndexScanArgs;
}

// Implements `RangeScan` for each splitting of an index's columns into
// (queried prefix; terminator; ignored suffix). The terminator may be a
// range; prefix columns must be given as exact values.
macro_rules! impl_range_scan {
    ($(($($P:ident $AP:ident),*) rest ($($U:ident),*);)*) => { $(
        impl<Term, TermArg, TermCol, $($P, $AP,)* $($U,)*> RangeScan<($($P,)* TermCol, $($U,)*)>
            for ($($AP,)* Term,)
        where
            Term: RangeScanTerminator<Arg = TermArg>,
            TermArg: FilterableValue<Column = TermCol>,
            $($AP: FilterableValue<Column = $P>,)*
        {
            #[allow(non_snake_case)]
            fn scan_args(&self) -> IndexScanArgs {
                let mut data = IterBuf::take();
                let prefix_elems = impl_range_scan!(@count $($P)*);
                let ($($AP,)* term,) = self;
                $(data.serialize_into($AP);)*
                let rstart_idx = data.len();
                let rend_idx = term.bounds().serialize_into(&mut data);
                IndexScanArgs { data, prefix_elems, rstart_idx, rend_idx }
            }
        }
    )* };
    (@count $($T:ident)*) => { 0 $(+ impl_range_scan!(@drop $T 1))* };
    (@drop $a:tt $b:tt) => { $b };
}

impl_range_scan! {
    () rest ();
    () rest (U1);
    () rest (U1, U2);
    () rest (U1, U2, U3);
    (P1 A1) rest ();
    (P1 A1) rest (U1);
    (P1 A1) rest (U1, U2);
    (P1 A1, P2 A2) rest ();
    (P1 A1, P2 A2) rest (U1);
    (P1 A1, P2 A2, P3 A3) rest ();
}

// Bare values and ranges (not wrapped in a tuple) scan the first column.
macro_rules! impl_range_scan_single {
    ($(rest ($($U:ident),*);)*) => { $(
        impl<Term, TermArg, TermCol, $($U,)*> RangeScan<(TermCol, $($U,)*), SingleBound> for Term
        where
            Term: RangeScanTerminator<Arg = TermArg>,
            TermArg: FilterableValue<Column = TermCol>,
        {
            fn scan_args(&self) -> IndexScanArgs {
                let mut data = IterBuf::take();
                let rend_idx = self.bounds().serialize_into(&mut data);
                IndexScanArgs { data, prefix_elems: 0, rstart_idx: 0, rend_idx }
            }
        }
    )* };
}

impl_range_scan_single! {
    rest ();
    rest (U1);
    rest (U1, U2);
    rest (U1, U2, U3);
}

/// A trait for types that can have a sequence based on them.
/// This is used for auto-inc columns to determine if an insertion of a row
/// will require the column to be updated in the row.
pub trait SequenceTrigger: Sized + Deserialize {
    /// Is this value one that will trigger a sequence, if any,
    /// when used as a column value.
    fn is_sequence_trigger(&self) -> bool;

    /// Reads a generated column from `gen_cols`,
    /// if this value was a sequence trigger.
    #[inline(always)]
    fn maybe_decode_into(&mut self, gen_cols: &mut &[u8]) {
        if self.is_sequence_trigger() {
            *self = bsatn::from_reader(gen_cols).unwrap_or_else(|_| sequence_decode_error())
        }
    }
}

#[cold]
#[inline(never)]
fn sequence_decode_error() -> ! {
    unreachable!("a row was a sequence trigger but there was no generated column for it.")
}

macro_rules! impl_seq_trigger {
    ($($t:ty),* $(,)?) => {
        $(impl SequenceTrigger for $t {
            #[inline(always)]
            fn is_sequence_trigger(&self) -> bool {
                *self == 0
            }
        })*
    };
}

impl_seq_trigger!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128);

impl SequenceTrigger for u256 {
    #[inline(always)]
    fn is_sequence_trigger(&self) -> bool {
        *self == Self::ZERO
    }
}

impl SequenceTrigger for i256 {
    #[inline(always)]
    fn is_sequence_trigger(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Insert a row of type `T` into the table identified by `table_id`.
#[track_caller]
fn insert<T: Table>(mut row: T::Row, mut buf: IterBuf) -> Result<T::Row, TryInsertError<T>> {
    let table_id = T::table_id();
    // Encode the row as bsatn into the buffer `buf`.
    buf.clear();
    buf.serialize_into(&row);

    // Insert row into table.
    // When the table has auto-incrementing columns,
    // the host writes the computed values back into `buf`.
    let res = sys::datastore_insert_bsatn(table_id, &mut buf).map(|gen_cols| {
        T::integrate_generated_columns(&mut row, gen_cols);
    });
    match res {
        Ok(()) => Ok(row),
        Err(e) => {
            let err = match e {
                sys::Errno::UNIQUE_ALREADY_EXISTS => {
                    T::UniqueConstraintViolation::get::<T>().map(TryInsertError::UniqueConstraintViolation)
                }
                _ => None,
            };
            Err(err.unwrap_or_else(|| panic!("unexpected insertion error: {e}")))
        }
    }
}

/// A table iterator which yields decoded rows of type `T`.
struct TableIter<T: Deserialize> {
    /// The underlying host-side iterator.
    inner: sys::RowIter,

    /// The current chunk of rows, decoded from the front.
    reader: Cursor<IterBuf>,

    _marker: PhantomData<T>,
}

impl<T: Deserialize> TableIter<T> {
    #[inline]
    fn new(iter: sys::RowIter) -> Self {
        TableIter::new_with_buf(iter, IterBuf::take())
    }

    #[inline]
    fn new_with_buf(iter: sys::RowIter, mut buf: IterBuf) -> Self {
        buf.clear();
        TableIter {
            inner: iter,
            reader: Cursor::new(buf),
            _marker: PhantomData,
        }
    }

    fn is_exhausted(&self) -> bool {
        (&self.reader).remaining() == 0 && self.inner.is_exhausted()
    }
}

impl<T: Deserialize> Iterator for TableIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // If we currently have some bytes in the buffer to still decode, do that.
            if (&self.reader).remaining() > 0 {
                let mut reader = &self.reader;
                let row = bsatn::from_reader(&mut reader).expect("Failed to decode row!");
                return Some(row);
            }

            // Don't fetch the next chunk if there is none.
            if self.inner.is_exhausted() {
                return None;
            }

            // Otherwise, fetch the next chunk while reusing the buffer.
            self.reader.buf.clear();
            self.reader.pos.set(0);
            self.inner.read(&mut self.reader.buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_slices(args: &IndexScanArgs) -> (Vec<u8>, usize, Vec<u8>, Vec<u8>) {
        let (prefix, prefix_elems, rstart, rend) = args.args_for_syscall();
        (prefix.to_vec(), prefix_elems.idx(), rstart.to_vec(), rend.to_vec())
    }

    #[test]
    fn point_value_scans_as_equal_bounds() {
        let args = RangeScan::<(u32,), SingleBound>::scan_args(&5u32);
        let (prefix, prefix_elems, rstart, rend) = scan_slices(&args);
        assert!(prefix.is_empty());
        assert_eq!(prefix_elems, 0);
        // Included(5u32): kind tag 0, then the LE value.
        assert_eq!(rstart, [0, 5, 0, 0, 0]);
        assert_eq!(rend, rstart);
    }

    #[test]
    fn range_scan_encodes_kind_tags() {
        let args = RangeScan::<(u32,), SingleBound>::scan_args(&(2u32..8));
        let (_, _, rstart, rend) = scan_slices(&args);
        assert_eq!(rstart, [0, 2, 0, 0, 0]); // inclusive 2
        assert_eq!(rend, [1, 8, 0, 0, 0]); // exclusive 8
    }

    #[test]
    fn unbounded_scan_is_one_tag_byte() {
        let args = RangeScan::<(u32,), SingleBound>::scan_args(&(4u32..));
        let (_, _, rstart, rend) = scan_slices(&args);
        assert_eq!(rstart, [0, 4, 0, 0, 0]);
        assert_eq!(rend, [2]); // unbounded
    }

    #[test]
    fn explicit_bound_pair_scans_as_given() {
        let bounds = (Bound::Included(2u32), Bound::Excluded(8u32));
        let args = RangeScan::<(u32,), SingleBound>::scan_args(&bounds);
        let (_, _, rstart, rend) = scan_slices(&args);
        assert_eq!(rstart, [0, 2, 0, 0, 0]);
        assert_eq!(rend, [1, 8, 0, 0, 0]);
    }

    #[test]
    fn prefix_columns_precede_the_terminator() {
        let args = RangeScan::<(u32, String), ()>::scan_args(&(7u32, "a".."b"));
        let (prefix, prefix_elems, rstart, rend) = scan_slices(&args);
        assert_eq!(prefix, [7, 0, 0, 0]);
        assert_eq!(prefix_elems, 1);
        assert_eq!(rstart, [0, 1, 0, 0, 0, b'a']);
        assert_eq!(rend, [1, 1, 0, 0, 0, b'b']);
    }
}
