//! A common library for SpacetimeDB modules:
//! the shared data model that sits between the algebraic type system
//! ([`spacetimedb_sats`]) and the guest runtime.
//!
//! Holds the special boundary types ([`Identity`], [`ConnectionId`],
//! [`ScheduleAt`]) and the raw module definition ([`db::raw_def`])
//! that the describe export emits.

pub mod connection_id;
pub mod db;
pub mod identity;
pub mod scheduled;

pub use spacetimedb_sats as sats;
pub use spacetimedb_sats::bsatn;

pub use connection_id::ConnectionId;
pub use db::raw_def::v9::RawModuleDef;
pub use identity::Identity;
pub use sats::{AlgebraicType, AlgebraicTypeRef, ProductType, ProductTypeElement, SpacetimeType};
pub use sats::{DecodeError, Deserialize, Serialize};
pub use sats::{TimeDuration, Timestamp};
pub use scheduled::ScheduleAt;
