//! The V9 raw module definition.
//!
//! This is the shape of the module descriptor: the value a module's
//! describe export BSATN-encodes into the host-provided sink.
//! "Raw" means unvalidated-by-the-host; the builder in this module
//! still enforces the guest-side invariants at emission time
//! (unique names, column indexes in range, lifecycle arity).

use std::any::TypeId;
use std::collections::HashMap;

use spacetimedb_primitives::{ColId, ColList, ReducerId};
use spacetimedb_sats::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use spacetimedb_sats::buffer::{BufReader, BufWriter};
use spacetimedb_sats::typespace::TypespaceBuilder;
use spacetimedb_sats::{AlgebraicType, AlgebraicTypeRef, ProductType, Typespace};
use thiserror::Error;

/// A name in a module definition: a table, reducer, index, or type name.
pub type RawIdentifier = Box<str>;

/// Implements the BSATN codec for product-shaped structs
/// (each field in declaration order) and for C-style enums
/// (one tag byte, tags in declaration order).
macro_rules! impl_serde {
    (struct $ty:ident { $($field:ident),+ $(,)? }) => {
        impl Serialize for $ty {
            fn serialize(&self, writer: &mut impl BufWriter) {
                $(self.$field.serialize(writer);)+
            }
        }
        impl Deserialize for $ty {
            fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
                $(let $field = Deserialize::deserialize(de)?;)+
                Ok(Self { $($field),+ })
            }
        }
    };
    (enum $ty:ident { $($variant:ident = $tag:literal),+ $(,)? }) => {
        impl Serialize for $ty {
            fn serialize(&self, writer: &mut impl BufWriter) {
                writer.put_u8(match self { $($ty::$variant => $tag),+ });
            }
        }
        impl Deserialize for $ty {
            fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
                match de.get_u8()? {
                    $($tag => Ok($ty::$variant),)+
                    tag => Err(DecodeError::InvalidTag { tag, sum_name: stringify!($ty) }),
                }
            }
        }
    };
}

/// A versioned module definition.
///
/// The one-byte version tag leads the descriptor; everything the host
/// learns about a module's schema hangs off the variant payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModuleDef {
    /// The obsolete V8 shape. The variant exists so the version tag
    /// numbering stays stable; this crate never produces it.
    V8Unsupported,
    /// The current shape.
    V9(RawModuleDefV9),
}

impl Serialize for RawModuleDef {
    fn serialize(&self, writer: &mut impl BufWriter) {
        match self {
            RawModuleDef::V8Unsupported => writer.put_u8(0),
            RawModuleDef::V9(def) => {
                writer.put_u8(1);
                def.serialize(writer);
            }
        }
    }
}

impl Deserialize for RawModuleDef {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        match de.sum_tag("RawModuleDef", 2)? {
            0 => Ok(RawModuleDef::V8Unsupported),
            _ => Deserialize::deserialize(de).map(RawModuleDef::V9),
        }
    }
}

/// A module definition: everything the host needs to install a module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawModuleDefV9 {
    /// The types of the module, indexed by [`AlgebraicTypeRef`].
    pub typespace: Typespace,
    /// The tables of the module, in declaration order.
    pub tables: Vec<RawTableDefV9>,
    /// The reducers of the module. A reducer's index in this vector
    /// is its id, the argument of the call-by-id export.
    pub reducers: Vec<RawReducerDefV9>,
    /// Named types, exported to drive client code generation.
    pub types: Vec<RawTypeDefV9>,
    /// Miscellaneous exports. Currently always empty.
    pub misc_exports: Vec<RawMiscModuleExportV9>,
    /// Row-level security rules, applied to all client queries.
    pub row_level_security: Vec<RawRowLevelSecurityDefV9>,
}

impl_serde!(struct RawModuleDefV9 {
    typespace,
    tables,
    reducers,
    types,
    misc_exports,
    row_level_security,
});

/// A table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTableDefV9 {
    /// The name of the table, unique within the module.
    pub name: RawIdentifier,
    /// The type of the table's rows;
    /// must refer to a `Product` in the module's typespace.
    pub product_type_ref: AlgebraicTypeRef,
    /// The columns of the primary key, possibly empty.
    pub primary_key: ColList,
    /// The indexes of the table.
    pub indexes: Vec<RawIndexDefV9>,
    /// The constraints on the table.
    pub constraints: Vec<RawConstraintDefV9>,
    /// The sequences attached to columns of the table.
    pub sequences: Vec<RawSequenceDefV9>,
    /// Scheduling metadata, if this is a scheduled table.
    pub schedule: Option<RawScheduleDefV9>,
    /// Whether this is a system- or user-defined table.
    pub table_type: TableType,
    /// Whether clients may read this table.
    pub table_access: TableAccess,
}

impl_serde!(struct RawTableDefV9 {
    name,
    product_type_ref,
    primary_key,
    indexes,
    constraints,
    sequences,
    schedule,
    table_type,
    table_access,
});

/// Whether a table was defined by the system or by a user module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableType {
    /// A table defined by a user module.
    #[default]
    User,
    /// A table defined by the system.
    System,
}

impl_serde!(enum TableType { User = 0, System = 1 });

/// Whether clients can read a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableAccess {
    /// The table is visible to all clients.
    Public,
    /// The table is only visible to the module itself.
    #[default]
    Private,
}

impl_serde!(enum TableAccess { Public = 0, Private = 1 });

/// An index definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIndexDefV9 {
    /// The name of the index, if the module picked one;
    /// the host generates a name otherwise.
    pub name: Option<RawIdentifier>,
    /// How the index is maintained and queried.
    pub algorithm: RawIndexAlgorithm,
}

impl_serde!(struct RawIndexDefV9 { name, algorithm });

/// The algorithm of an index.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RawIndexAlgorithm {
    /// An ordered index over the given columns, in order.
    BTree {
        /// The columns indexed over.
        columns: ColList,
    },
}

impl Serialize for RawIndexAlgorithm {
    fn serialize(&self, writer: &mut impl BufWriter) {
        match self {
            RawIndexAlgorithm::BTree { columns } => {
                writer.put_u8(0);
                columns.serialize(writer);
            }
        }
    }
}

impl Deserialize for RawIndexAlgorithm {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        de.sum_tag("RawIndexAlgorithm", 1)?;
        Deserialize::deserialize(de).map(|columns| RawIndexAlgorithm::BTree { columns })
    }
}

/// A constraint definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RawConstraintDefV9 {
    /// The name of the constraint, if the module picked one.
    pub name: Option<RawIdentifier>,
    /// The kind of constraint, with its payload.
    pub data: RawConstraintDataV9,
}

impl_serde!(struct RawConstraintDefV9 { name, data });

/// The kind of a constraint.
///
/// The taxonomy is extensible; only uniqueness exists today.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RawConstraintDataV9 {
    /// A unique constraint over a set of columns.
    Unique(RawUniqueConstraintDataV9),
}

impl Serialize for RawConstraintDataV9 {
    fn serialize(&self, writer: &mut impl BufWriter) {
        match self {
            RawConstraintDataV9::Unique(unique) => {
                writer.put_u8(0);
                unique.serialize(writer);
            }
        }
    }
}

impl Deserialize for RawConstraintDataV9 {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        de.sum_tag("RawConstraintDataV9", 1)?;
        Deserialize::deserialize(de).map(RawConstraintDataV9::Unique)
    }
}

/// The payload of a unique constraint: no two rows may agree
/// on the values of all of `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawUniqueConstraintDataV9 {
    /// The columns that must be collectively unique.
    pub columns: ColList,
}

impl_serde!(struct RawUniqueConstraintDataV9 { columns });

/// A sequence definition, backing an auto-increment column.
///
/// Inserting a row whose sequence column holds zero
/// draws the next value from the sequence instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSequenceDefV9 {
    /// The column the sequence feeds.
    pub column: ColId,
    /// The first value the sequence hands out.
    pub start: i128,
    /// The step between handed-out values.
    pub increment: i128,
    /// The smallest value the sequence may reach, if bounded.
    pub min_value: Option<i128>,
    /// The largest value the sequence may reach, if bounded.
    pub max_value: Option<i128>,
    /// The name of the sequence, if the module picked one.
    pub name: Option<RawIdentifier>,
}

impl_serde!(struct RawSequenceDefV9 {
    column,
    start,
    increment,
    min_value,
    max_value,
    name,
});

/// Scheduling metadata of a scheduled table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScheduleDefV9 {
    /// The reducer to fire for each row of the table.
    pub reducer_name: RawIdentifier,
    /// The column holding the row's `ScheduleAt` value.
    pub scheduled_at_column: ColId,
}

impl_serde!(struct RawScheduleDefV9 {
    reducer_name,
    scheduled_at_column,
});

/// A reducer definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReducerDefV9 {
    /// The name of the reducer, unique within the module.
    pub name: RawIdentifier,
    /// The parameter list, as a product whose elements carry
    /// the argument names and types.
    pub params: ProductType,
    /// The lifecycle role of the reducer, if any.
    pub lifecycle: Option<Lifecycle>,
}

impl_serde!(struct RawReducerDefV9 { name, params, lifecycle });

/// The lifecycle role of a reducer: when the host invokes it
/// besides explicit client calls.
///
/// A module may carry at most one reducer per role,
/// and lifecycle reducers take no arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Runs when the module is first published
    /// and whenever the database is cleared.
    Init,
    /// Runs when a client connects.
    OnConnect,
    /// Runs when a client disconnects.
    OnDisconnect,
    /// Runs when a row of a scheduled table comes due.
    Scheduled,
}

impl_serde!(enum Lifecycle {
    Init = 0,
    OnConnect = 1,
    OnDisconnect = 2,
    Scheduled = 3,
});

/// A scoped type name: the segments of the module path, then the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawScopedTypeNameV9 {
    /// The scope segments, outermost first. Empty for top-level names.
    pub scope: Vec<RawIdentifier>,
    /// The name itself.
    pub name: RawIdentifier,
}

impl RawScopedTypeNameV9 {
    /// Returns an unscoped name.
    pub fn new(name: impl Into<RawIdentifier>) -> Self {
        Self {
            scope: Vec::new(),
            name: name.into(),
        }
    }
}

impl_serde!(struct RawScopedTypeNameV9 { scope, name });

/// A named type export, binding a scoped name to a typespace entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTypeDefV9 {
    /// The name clients will generate code under.
    pub name: RawScopedTypeNameV9,
    /// The typespace entry being named.
    pub ty: AlgebraicTypeRef,
    /// Whether the order of the type's fields is semantically
    /// meaningful and must be preserved by clients.
    pub custom_ordering: bool,
}

impl_serde!(struct RawTypeDefV9 { name, ty, custom_ordering });

/// A miscellaneous module export. No kinds are defined yet;
/// the list exists so the descriptor layout is forward-compatible.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMiscModuleExportV9 {}

impl Serialize for RawMiscModuleExportV9 {
    fn serialize(&self, _writer: &mut impl BufWriter) {
        match *self {}
    }
}

impl Deserialize for RawMiscModuleExportV9 {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        Err(DecodeError::InvalidTag {
            tag: de.get_u8()?,
            sum_name: "RawMiscModuleExportV9",
        })
    }
}

/// A row-level security rule: an SQL filter applied to client queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRowLevelSecurityDefV9 {
    /// The filter, as SQL. Not parsed or validated guest-side;
    /// errors surface when the host installs the module.
    pub sql: Box<str>,
}

impl_serde!(struct RawRowLevelSecurityDefV9 { sql });

/// An invariant violation caught while assembling a module definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleDefError {
    #[error("table `{0}` is registered twice")]
    DuplicateTableName(RawIdentifier),
    #[error("reducer `{0}` is registered twice")]
    DuplicateReducerName(RawIdentifier),
    #[error("type name `{0}` is bound twice")]
    DuplicateTypeName(RawIdentifier),
    #[error("more than one {0:?} lifecycle reducer")]
    DuplicateLifecycle(Lifecycle),
    #[error("lifecycle reducer `{0}` takes arguments, but its role forbids them")]
    LifecycleWithArgs(RawIdentifier),
    #[error("table `{table}` has row type {ty} which is not a product in the typespace")]
    InvalidProductTypeRef { table: RawIdentifier, ty: AlgebraicTypeRef },
    #[error("table `{table}` refers to column {col} but its row type has {arity} columns")]
    ColumnOutOfBounds {
        table: RawIdentifier,
        col: ColId,
        arity: usize,
    },
    #[error("table `{table}` schedules unknown reducer `{reducer}`")]
    UnknownScheduleReducer {
        table: RawIdentifier,
        reducer: RawIdentifier,
    },
}

/// Builds a [`RawModuleDefV9`] incrementally.
///
/// Also serves as the [`TypespaceBuilder`] that module types
/// register themselves into.
#[derive(Default)]
pub struct RawModuleDefV9Builder {
    module: RawModuleDefV9,
    /// Rust types already registered, for idempotent registration.
    type_map: HashMap<TypeId, AlgebraicTypeRef>,
    /// Named types already bound, for name resolution.
    name_map: HashMap<RawIdentifier, AlgebraicTypeRef>,
}

impl RawModuleDefV9Builder {
    /// Returns an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the typespace assembled so far.
    pub fn typespace(&self) -> &Typespace {
        &self.module.typespace
    }

    /// Adds `ty` to the typespace without naming it,
    /// returning its new ref.
    pub fn add_algebraic_type(&mut self, ty: AlgebraicType) -> AlgebraicTypeRef {
        self.module.typespace.add(ty)
    }

    /// Resolves a bound type name to its typespace entry.
    pub fn resolve_name(&self, name: &str) -> Option<AlgebraicTypeRef> {
        self.name_map.get(name).copied()
    }

    /// Begins building a table named `name`
    /// over the row type at `product_type_ref`.
    ///
    /// Call [`RawTableDefBuilder::finish`] to add the table to the module.
    pub fn build_table(
        &mut self,
        name: impl Into<RawIdentifier>,
        product_type_ref: AlgebraicTypeRef,
    ) -> RawTableDefBuilder<'_> {
        RawTableDefBuilder {
            table: RawTableDefV9 {
                name: name.into(),
                product_type_ref,
                primary_key: ColList::new(),
                indexes: Vec::new(),
                constraints: Vec::new(),
                sequences: Vec::new(),
                schedule: None,
                table_type: TableType::User,
                table_access: TableAccess::Private,
            },
            module: &mut self.module,
        }
    }

    /// Adds a reducer, returning its id
    /// (its position in the ordered reducers vector).
    pub fn add_reducer(
        &mut self,
        name: impl Into<RawIdentifier>,
        params: ProductType,
        lifecycle: Option<Lifecycle>,
    ) -> ReducerId {
        let id = ReducerId(self.module.reducers.len() as u32);
        self.module.reducers.push(RawReducerDefV9 {
            name: name.into(),
            params,
            lifecycle,
        });
        id
    }

    /// Appends a row-level security rule.
    pub fn add_row_level_security(&mut self, sql: &str) {
        self.module.row_level_security.push(RawRowLevelSecurityDefV9 { sql: sql.into() });
    }

    /// Validates the assembled module and returns it.
    ///
    /// This is where registration-time sloppiness becomes a hard error:
    /// the descriptor is only ever emitted from a definition
    /// that upholds every invariant listed on [`ModuleDefError`].
    pub fn finish(mut self) -> Result<RawModuleDefV9, ModuleDefError> {
        self.mark_scheduled_reducers()?;
        self.check_unique_names()?;
        self.check_lifecycles()?;
        self.check_tables()?;
        Ok(self.module)
    }

    /// Upgrades reducers targeted by a table schedule
    /// to the `Scheduled` lifecycle.
    fn mark_scheduled_reducers(&mut self) -> Result<(), ModuleDefError> {
        for table in &self.module.tables {
            let Some(schedule) = &table.schedule else { continue };
            let reducer = self
                .module
                .reducers
                .iter_mut()
                .find(|r| r.name == schedule.reducer_name)
                .ok_or_else(|| ModuleDefError::UnknownScheduleReducer {
                    table: table.name.clone(),
                    reducer: schedule.reducer_name.clone(),
                })?;
            reducer.lifecycle.get_or_insert(Lifecycle::Scheduled);
        }
        Ok(())
    }

    fn check_unique_names(&self) -> Result<(), ModuleDefError> {
        let mut tables = HashMap::new();
        for table in &self.module.tables {
            if tables.insert(&table.name, ()).is_some() {
                return Err(ModuleDefError::DuplicateTableName(table.name.clone()));
            }
        }
        let mut reducers = HashMap::new();
        for reducer in &self.module.reducers {
            if reducers.insert(&reducer.name, ()).is_some() {
                return Err(ModuleDefError::DuplicateReducerName(reducer.name.clone()));
            }
        }
        let mut types = HashMap::new();
        for ty in &self.module.types {
            if types.insert(&ty.name, ()).is_some() {
                return Err(ModuleDefError::DuplicateTypeName(ty.name.name.clone()));
            }
        }
        Ok(())
    }

    fn check_lifecycles(&self) -> Result<(), ModuleDefError> {
        for role in [Lifecycle::Init, Lifecycle::OnConnect, Lifecycle::OnDisconnect] {
            let mut found = false;
            for reducer in &self.module.reducers {
                if reducer.lifecycle != Some(role) {
                    continue;
                }
                if found {
                    return Err(ModuleDefError::DuplicateLifecycle(role));
                }
                found = true;
                // The host invokes these with an empty argument stream.
                if reducer.params.arity() != 0 {
                    return Err(ModuleDefError::LifecycleWithArgs(reducer.name.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_tables(&self) -> Result<(), ModuleDefError> {
        for table in &self.module.tables {
            let arity = self
                .module
                .typespace
                .get(table.product_type_ref)
                .and_then(AlgebraicType::as_product)
                .ok_or_else(|| ModuleDefError::InvalidProductTypeRef {
                    table: table.name.clone(),
                    ty: table.product_type_ref,
                })?
                .arity();

            let check_col = |col: ColId| {
                if col.idx() < arity {
                    Ok(())
                } else {
                    Err(ModuleDefError::ColumnOutOfBounds {
                        table: table.name.clone(),
                        col,
                        arity,
                    })
                }
            };
            let check_cols = |cols: &ColList| cols.iter().try_for_each(check_col);

            check_cols(&table.primary_key)?;
            for index in &table.indexes {
                let RawIndexAlgorithm::BTree { columns } = &index.algorithm;
                check_cols(columns)?;
            }
            for constraint in &table.constraints {
                let RawConstraintDataV9::Unique(unique) = &constraint.data;
                check_cols(&unique.columns)?;
            }
            for sequence in &table.sequences {
                check_col(sequence.column)?;
            }
            if let Some(schedule) = &table.schedule {
                check_col(schedule.scheduled_at_column)?;
            }
        }
        Ok(())
    }
}

impl TypespaceBuilder for RawModuleDefV9Builder {
    fn add(
        &mut self,
        typeid: TypeId,
        name: Option<&'static str>,
        make_ty: impl FnOnce(&mut Self) -> AlgebraicType,
    ) -> AlgebraicType {
        let r = match self.type_map.get(&typeid) {
            Some(&r) => r,
            None => {
                // Reserve the slot first: `make_ty` may refer back to it.
                let r = self.module.typespace.reserve();
                self.type_map.insert(typeid, r);
                let ty = make_ty(self);
                self.module.typespace.set(r, ty);
                if let Some(name) = name {
                    if !self.name_map.contains_key(name) {
                        self.name_map.insert(name.into(), r);
                        self.module.types.push(RawTypeDefV9 {
                            name: RawScopedTypeNameV9::new(name),
                            ty: r,
                            custom_ordering: true,
                        });
                    }
                }
                r
            }
        };
        AlgebraicType::Ref(r)
    }
}

/// Builds one [`RawTableDefV9`], to be finished into the module.
pub struct RawTableDefBuilder<'a> {
    table: RawTableDefV9,
    module: &'a mut RawModuleDefV9,
}

impl RawTableDefBuilder<'_> {
    /// Sets whether this is a system or user table.
    pub fn with_type(mut self, table_type: TableType) -> Self {
        self.table.table_type = table_type;
        self
    }

    /// Sets the client visibility of the table.
    pub fn with_access(mut self, table_access: TableAccess) -> Self {
        self.table.table_access = table_access;
        self
    }

    /// Sets the primary key columns.
    pub fn with_primary_key(mut self, cols: impl Into<ColList>) -> Self {
        self.table.primary_key = cols.into();
        self
    }

    /// Adds a unique constraint over `cols`.
    ///
    /// The backing index is registered separately, with a name,
    /// so the module can resolve its id through the host.
    pub fn with_unique_constraint(mut self, cols: impl Into<ColList>) -> Self {
        self.table.constraints.push(RawConstraintDefV9 {
            name: None,
            data: RawConstraintDataV9::Unique(RawUniqueConstraintDataV9 { columns: cols.into() }),
        });
        self
    }

    /// Adds an index with the given `algorithm`,
    /// named after the module-side accessor.
    pub fn with_index(mut self, algorithm: RawIndexAlgorithm, accessor_name: &str) -> Self {
        self.table.indexes.push(RawIndexDefV9 {
            name: Some(format!("{}_{}_idx_btree", self.table.name, accessor_name).into()),
            algorithm,
        });
        self
    }

    /// Attaches a sequence to `column`, starting at 1 and stepping by 1.
    pub fn with_column_sequence(mut self, column: impl Into<ColId>) -> Self {
        self.table.sequences.push(RawSequenceDefV9 {
            column: column.into(),
            start: 1,
            increment: 1,
            min_value: None,
            max_value: None,
            name: None,
        });
        self
    }

    /// Marks the table as scheduled, firing `reducer_name`
    /// for each row as its `scheduled_at_column` comes due.
    pub fn with_schedule(mut self, reducer_name: impl Into<RawIdentifier>, scheduled_at_column: impl Into<ColId>) -> Self {
        self.table.schedule = Some(RawScheduleDefV9 {
            reducer_name: reducer_name.into(),
            scheduled_at_column: scheduled_at_column.into(),
        });
        self
    }

    /// Adds the table to the module.
    pub fn finish(self) {
        self.module.tables.push(self.table);
    }
}
