//! Exercises the registration macros the way a module crate uses them:
//! declaring row types, tables, and reducers, and checking the schema
//! and wire encodings they produce.

use spacetimedb::sats::bsatn;
use spacetimedb::spacetimedb_lib::db::raw_def::v9::RawModuleDefV9Builder;
use spacetimedb::table::TableInternal;
use spacetimedb::{
    impl_st_enum, impl_st_struct, register_reducer, register_table, Lifecycle, ReducerContext, ScheduleAt,
    SpacetimeType, Table, TableAccess,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: u32,
    pub name: String,
    pub age: u8,
}
impl_st_struct!(Person { id: u32, name: String, age: u8 });

register_table!(
    name = person,
    handle = PersonTable,
    row = Person,
    access = Public,
    primary_key = 0,
    auto_inc = [0 => id],
    unique = [0 => id(PersonIdColumn): u32],
    index = [by_age(PersonAgeIndex) btree(2): (u8,)],
);

fn add(_ctx: &ReducerContext, _name: String, _age: u8) {}
register_reducer!(add(name: String, age: u8));

fn noop_init(_ctx: &ReducerContext) {}
register_reducer!(init noop_init());

#[derive(Debug, Clone, PartialEq)]
pub struct TickTimer {
    pub scheduled_id: u64,
    pub scheduled_at: ScheduleAt,
}
impl_st_struct!(TickTimer {
    scheduled_id: u64,
    scheduled_at: ScheduleAt,
});

register_table!(
    name = tick_timer,
    handle = TickTimerTable,
    row = TickTimer,
    primary_key = 0,
    auto_inc = [0 => scheduled_id],
    scheduled = (tick, 1),
);

fn tick(_ctx: &ReducerContext, _row: TickTimer) {}
register_reducer!(tick(row: TickTimer));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Red,
    Green,
    Blue,
}
impl_st_enum!(Color { Red = 0, Green = 1, Blue = 2 });

#[test]
fn row_encoding_matches_the_wire_format() {
    let row = Person {
        id: 1,
        name: "Alice".into(),
        age: 30,
    };
    let bytes = bsatn::to_vec(&row);
    assert_eq!(
        bytes,
        [0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x41, 0x6C, 0x69, 0x63, 0x65, 0x1E]
    );
    assert_eq!(bsatn::from_slice::<Person>(&bytes).unwrap(), row);
}

#[test]
fn row_type_registration_is_idempotent() {
    let mut builder = RawModuleDefV9Builder::new();
    let first = Person::make_type(&mut builder);
    let second = Person::make_type(&mut builder);
    assert_eq!(first, second);

    let def = builder.finish().unwrap();
    // One registration, one named type, no duplicates.
    assert_eq!(def.typespace.len(), 1);
    let [ty] = &def.types[..] else {
        panic!("expected exactly one named type")
    };
    assert_eq!(&*ty.name.name, "Person");
    assert!(ty.custom_ordering);

    let product = def.typespace.types[0].as_product().unwrap();
    assert_eq!(product.arity(), 3);
    assert_eq!(product.elements[1].name(), Some("name"));
}

#[test]
fn table_handle_describes_the_table() {
    assert_eq!(PersonTable::TABLE_NAME, "person");
    assert_eq!(PersonTable::TABLE_ACCESS, TableAccess::Public);
    assert_eq!(PersonTable::PRIMARY_KEY, Some(0));
    assert_eq!(PersonTable::SEQUENCES, &[0]);
    assert_eq!(PersonTable::UNIQUE_COLUMNS, &[0]);
    assert_eq!(PersonTable::UNIQUE_COLUMN_NAMES, &["id"]);

    let accessors: Vec<_> = PersonTable::INDEXES.iter().map(|idx| idx.accessor_name).collect();
    assert_eq!(accessors, ["id", "by_age"]);

    let schedule = TickTimerTable::SCHEDULE.unwrap();
    assert_eq!(schedule.reducer_name, "tick");
    assert_eq!(schedule.scheduled_at_column, 1);
}

#[test]
fn table_accessor_is_reachable_through_the_context() {
    let ctx = ReducerContext::__dummy();
    let _: PersonTable = ctx.db.person();
    let _: TickTimerTable = ctx.db.tick_timer();
}

#[test]
fn generated_columns_replace_zero_valued_triggers() {
    let mut row = Person {
        id: 0,
        name: "Bob".into(),
        age: 41,
    };
    PersonTable::integrate_generated_columns(&mut row, &42u32.to_le_bytes());
    assert_eq!(row.id, 42);

    // A row that did not trigger the sequence is left alone.
    let mut row = Person {
        id: 7,
        name: "Eve".into(),
        age: 12,
    };
    PersonTable::integrate_generated_columns(&mut row, &[]);
    assert_eq!(row.id, 7);
}

#[test]
fn unique_violation_names_the_offending_column() {
    let err = <spacetimedb::UniqueConstraintViolation as spacetimedb::table::MaybeError>::get::<PersonTable>().unwrap();
    let msg = err.to_string();
    assert!(msg.contains("person"), "{msg}");
    assert!(msg.contains("id"), "{msg}");
}

#[test]
fn enums_keep_sum_framing() {
    assert_eq!(bsatn::to_vec(&Color::Green), [1]);
    assert_eq!(bsatn::from_slice::<Color>(&[2]).unwrap(), Color::Blue);
    assert!(bsatn::from_slice::<Color>(&[3]).is_err());

    let mut builder = RawModuleDefV9Builder::new();
    let ty = Color::make_type(&mut builder);
    let def = builder.finish().unwrap();
    let r = ty.as_ref().unwrap();
    let sum = def.typespace.types[r.idx()].as_sum().unwrap();
    assert!(sum.is_simple_enum());
    assert_eq!(sum.variants.len(), 3);
    assert_eq!(sum.variants[2].name(), Some("Blue"));
}

#[test]
fn schedule_at_columns_encode_as_sums() {
    let row = TickTimer {
        scheduled_id: 9,
        scheduled_at: ScheduleAt::Interval(std::time::Duration::from_micros(50).into()),
    };
    let mut expected = 9u64.to_le_bytes().to_vec();
    expected.push(0); // Interval variant tag
    expected.extend_from_slice(&50i64.to_le_bytes());
    assert_eq!(bsatn::to_vec(&row), expected);
}

#[test]
fn lifecycle_is_exported() {
    // The lifecycle names the host dispatches on.
    assert_eq!(Lifecycle::Init as u8, 0);
}
