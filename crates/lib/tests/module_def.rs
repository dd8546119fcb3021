use spacetimedb_lib::bsatn;
use spacetimedb_lib::db::raw_def::v9::*;
use spacetimedb_lib::sats::{AlgebraicType, AlgebraicTypeRef, ProductType};
use spacetimedb_primitives::{ColId, ColList, ReducerId};

/// Builds the one-table, one-reducer module used across these tests:
/// a public `person` table over `Person { id: u32, name: string, age: u8 }`
/// and a reducer `add(name: string, age: u8)`.
fn person_module() -> RawModuleDefV9Builder {
    let mut builder = RawModuleDefV9Builder::new();
    let person = builder.add_algebraic_type(AlgebraicType::product([
        ("id", AlgebraicType::U32),
        ("name", AlgebraicType::String),
        ("age", AlgebraicType::U8),
    ]));
    builder
        .build_table("person", person)
        .with_access(TableAccess::Public)
        .finish();
    builder.add_reducer(
        "add",
        ProductType::from([("name", AlgebraicType::String), ("age", AlgebraicType::U8)]),
        None,
    );
    builder
}

#[test]
fn descriptor_layout_and_round_trip() {
    let def = person_module().finish().unwrap();
    let bytes = bsatn::to_vec(&RawModuleDef::V9(def.clone()));

    // Version tag: 1 denotes V9.
    assert_eq!(bytes[0], 1);

    let decoded = match bsatn::from_slice::<RawModuleDef>(&bytes).unwrap() {
        RawModuleDef::V9(decoded) => decoded,
        other => panic!("decoded unexpected version: {other:?}"),
    };
    assert_eq!(decoded, def);

    assert_eq!(decoded.typespace.len(), 1);
    let [table] = &decoded.tables[..] else {
        panic!("expected exactly one table")
    };
    assert_eq!(&*table.name, "person");
    assert_eq!(table.product_type_ref, AlgebraicTypeRef(0));
    assert_eq!(table.table_access, TableAccess::Public);
    assert_eq!(table.table_type, TableType::User);

    let [reducer] = &decoded.reducers[..] else {
        panic!("expected exactly one reducer")
    };
    assert_eq!(&*reducer.name, "add");
    assert_eq!(reducer.params.arity(), 2);
    assert_eq!(reducer.lifecycle, None);

    assert!(decoded.types.is_empty());
    assert!(decoded.misc_exports.is_empty());
    assert!(decoded.row_level_security.is_empty());
}

#[test]
fn reducer_ids_are_assigned_in_order() {
    let mut builder = RawModuleDefV9Builder::new();
    assert_eq!(builder.add_reducer("a", ProductType::unit(), None), ReducerId(0));
    assert_eq!(builder.add_reducer("b", ProductType::unit(), None), ReducerId(1));
    assert_eq!(builder.add_reducer("c", ProductType::unit(), None), ReducerId(2));
}

#[test]
fn duplicate_table_name_is_an_emission_error() {
    let mut builder = person_module();
    let dup = builder.add_algebraic_type(AlgebraicType::product([("id", AlgebraicType::U32)]));
    builder.build_table("person", dup).finish();
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::DuplicateTableName("person".into())
    );
}

#[test]
fn duplicate_reducer_name_is_an_emission_error() {
    let mut builder = person_module();
    builder.add_reducer("add", ProductType::unit(), None);
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::DuplicateReducerName("add".into())
    );
}

#[test]
fn out_of_range_column_is_an_emission_error() {
    let mut builder = RawModuleDefV9Builder::new();
    let row = builder.add_algebraic_type(AlgebraicType::product([("id", AlgebraicType::U32)]));
    builder
        .build_table("t", row)
        .with_primary_key(ColList::from_col(ColId(3)))
        .finish();
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::ColumnOutOfBounds {
            table: "t".into(),
            col: ColId(3),
            arity: 1,
        }
    );
}

#[test]
fn non_product_row_type_is_an_emission_error() {
    let mut builder = RawModuleDefV9Builder::new();
    let row = builder.add_algebraic_type(AlgebraicType::U32);
    builder.build_table("t", row).finish();
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::InvalidProductTypeRef {
            table: "t".into(),
            ty: AlgebraicTypeRef(0),
        }
    );
}

#[test]
fn lifecycle_reducers_must_take_no_args() {
    let mut builder = RawModuleDefV9Builder::new();
    builder.add_reducer(
        "init",
        ProductType::from([("x", AlgebraicType::U8)]),
        Some(Lifecycle::Init),
    );
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::LifecycleWithArgs("init".into())
    );
}

#[test]
fn at_most_one_reducer_per_lifecycle_role() {
    let mut builder = RawModuleDefV9Builder::new();
    builder.add_reducer("a", ProductType::unit(), Some(Lifecycle::OnConnect));
    builder.add_reducer("b", ProductType::unit(), Some(Lifecycle::OnConnect));
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::DuplicateLifecycle(Lifecycle::OnConnect)
    );
}

#[test]
fn schedule_marks_target_reducer() {
    let mut builder = RawModuleDefV9Builder::new();
    let row = builder.add_algebraic_type(AlgebraicType::product([
        ("scheduled_id", AlgebraicType::U64),
        ("scheduled_at", AlgebraicType::schedule_at()),
    ]));
    builder
        .build_table("tick_timer", row)
        .with_primary_key(ColList::from_col(ColId(0)))
        .with_column_sequence(ColId(0))
        .with_schedule("tick", ColId(1))
        .finish();
    builder.add_reducer(
        "tick",
        ProductType::from([("row", AlgebraicType::Ref(AlgebraicTypeRef(0)))]),
        None,
    );

    let def = builder.finish().unwrap();
    assert_eq!(def.reducers[0].lifecycle, Some(Lifecycle::Scheduled));
    let schedule = def.tables[0].schedule.as_ref().unwrap();
    assert_eq!(&*schedule.reducer_name, "tick");
    assert_eq!(schedule.scheduled_at_column, ColId(1));
}

#[test]
fn schedule_of_unknown_reducer_is_an_emission_error() {
    let mut builder = RawModuleDefV9Builder::new();
    let row = builder.add_algebraic_type(AlgebraicType::product([("scheduled_at", AlgebraicType::schedule_at())]));
    builder.build_table("t", row).with_schedule("nope", ColId(0)).finish();
    assert_eq!(
        builder.finish().unwrap_err(),
        ModuleDefError::UnknownScheduleReducer {
            table: "t".into(),
            reducer: "nope".into(),
        }
    );
}

#[test]
fn unique_constraint_and_named_index_are_recorded() {
    let mut builder = RawModuleDefV9Builder::new();
    let row = builder.add_algebraic_type(AlgebraicType::product([("id", AlgebraicType::U32)]));
    builder
        .build_table("t", row)
        .with_unique_constraint(ColList::from_col(ColId(0)))
        .with_index(
            RawIndexAlgorithm::BTree {
                columns: ColList::from_col(ColId(0)),
            },
            "id",
        )
        .finish();
    let def = builder.finish().unwrap();
    let table = &def.tables[0];
    assert_eq!(table.constraints.len(), 1);
    let RawConstraintDataV9::Unique(unique) = &table.constraints[0].data else {
        panic!("expected a unique constraint")
    };
    assert_eq!(unique.columns, ColList::from_col(ColId(0)));
    let [index] = &table.indexes[..] else {
        panic!("expected exactly one index")
    };
    assert_eq!(index.name.as_deref(), Some("t_id_idx_btree"));
}
