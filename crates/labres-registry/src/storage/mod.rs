//! Persistence for the reservation registry.
//!
//! [`MachineStore`] is the contract the [`Registry`](crate::Registry)
//! relies on; [`RegistryDatabase`] implements it on `SQLite`.

mod db;
mod queries;


use async_trait::async_trait;

use crate::machine::{Machine, NewMachine, Permission};

pub use db::{DatabaseError, RegistryDatabase};

/// Table-like storage for machines and `(user, group)` permissions.
///
/// Every method is a single statement. Name lists are ordered ascending by
/// name, user lists ascending by user. Callers check business rules before
/// writing; only [`claim_machine`](Self::claim_machine) is conditional.
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Insert a new available machine stamped with `now`.
    ///
    /// Fails with [`DatabaseError::Conflict`] when the name is taken.
    async fn insert_machine(&self, machine: &NewMachine, now: i64) -> Result<(), DatabaseError>;

    /// Delete a machine. Returns `false` if it did not exist.
    async fn delete_machine(&self, name: &str) -> Result<bool, DatabaseError>;

    /// Unconditionally set (or clear) the holder of a machine.
    ///
    /// Returns `false` if the machine does not exist.
    async fn set_reservation(
        &self,
        name: &str,
        user: Option<&str>,
        now: i64,
    ) -> Result<bool, DatabaseError>;

    /// Reserve a machine only if nobody holds it.
    ///
    /// Returns `true` when this call made the reservation.
    async fn claim_machine(&self, name: &str, user: &str, now: i64) -> Result<bool, DatabaseError>;

    /// Grant `user` access to `group`. Granting twice is a no-op.
    async fn insert_permission(&self, user: &str, group: &str) -> Result<(), DatabaseError>;

    /// Revoke a grant. Revoking a missing grant is a no-op.
    async fn delete_permission(&self, user: &str, group: &str) -> Result<(), DatabaseError>;

    async fn machine_exists(&self, name: &str) -> Result<bool, DatabaseError>;

    async fn get_machine(&self, name: &str) -> Result<Option<Machine>, DatabaseError>;

    async fn machine_names(&self) -> Result<Vec<String>, DatabaseError>;

    async fn available_names(&self) -> Result<Vec<String>, DatabaseError>;

    async fn reserved_names(&self) -> Result<Vec<String>, DatabaseError>;

    async fn names_by_user(&self, user: &str) -> Result<Vec<String>, DatabaseError>;

    /// Distinct users currently holding at least one machine.
    async fn reserving_users(&self) -> Result<Vec<String>, DatabaseError>;

    async fn users_in_group(&self, group: &str) -> Result<Vec<String>, DatabaseError>;

    /// All grants, ordered by group then user.
    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError>;
}
