//! Machine reservation registry.
//!
//! Tracks a pool of named lab machines, lets users reserve and release them
//! and gates reservations of grouped machines on `(user, group)` grants.
//!
//! - [`machine`]: records and the derived reservation state
//! - [`storage`]: the [`MachineStore`] contract and its `SQLite` adapter
//! - [`registry`]: the rules, returning outcome enums instead of errors

pub mod machine;
pub mod registry;
pub mod storage;


pub use machine::{Machine, MachineState, NewMachine, PartialMachine, Permission};
pub use registry::{AddOutcome, Registry, ReleaseOutcome, RemoveOutcome, ReserveOutcome};
pub use storage::{DatabaseError, MachineStore, RegistryDatabase};
