//! Reservation rules on top of a [`MachineStore`].
//!
//! Rejections (unknown machine, double reservation, missing permission) are
//! ordinary outcomes returned as values. Only storage faults travel through
//! the error channel.

use labres_core::db::unix_timestamp;
use tracing::{debug, info};

use crate::machine::{Machine, NewMachine, PartialMachine, Permission};
use crate::storage::{DatabaseError, MachineStore};

/// Result of [`Registry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

/// Result of [`Registry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotFound,
}

/// Result of [`Registry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Result of [`Registry::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    NotFound,
    /// Somebody (possibly the requester) already holds the machine.
    AlreadyReserved { holder: String },
    /// The machine belongs to `group` and the requester is not a member.
    Forbidden { group: String },
}

impl ReserveOutcome {
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved)
    }
}

/// The machine reservation registry.
///
/// Holds no machine state of its own; every call goes to the injected
/// store. Cloning is cheap when the store is (the `SQLite` store shares its
/// pool).
#[derive(Debug, Clone)]
pub struct Registry<S> {
    store: S,
}

impl<S: MachineStore> Registry<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Add a machine. Names are compared exactly.
    pub async fn add(&self, machine: &NewMachine) -> Result<AddOutcome, DatabaseError> {
        if self.store.machine_exists(&machine.name).await? {
            debug!(machine = %machine.name, "Add rejected: machine exists");
            return Ok(AddOutcome::AlreadyExists);
        }

        match self.store.insert_machine(machine, unix_timestamp()).await {
            Ok(()) => {
                info!(
                    machine = %machine.name,
                    group = machine.group.as_deref().unwrap_or("-"),
                    "Machine added"
                );
                Ok(AddOutcome::Added)
            }
            // Lost a race against a concurrent add of the same name.
            Err(DatabaseError::Conflict(_)) => Ok(AddOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    pub async fn get_info(&self, name: &str) -> Result<Option<Machine>, DatabaseError> {
        self.store.get_machine(name).await
    }

    pub async fn list_all(&self) -> Result<Vec<String>, DatabaseError> {
        self.store.machine_names().await
    }

    pub async fn list_available(&self) -> Result<Vec<String>, DatabaseError> {
        self.store.available_names().await
    }

    pub async fn list_reserved(&self) -> Result<Vec<String>, DatabaseError> {
        self.store.reserved_names().await
    }

    pub async fn list_by_user(&self, user: &str) -> Result<Vec<String>, DatabaseError> {
        self.store.names_by_user(user).await
    }

    /// Users holding at least one machine.
    pub async fn list_users(&self) -> Result<Vec<String>, DatabaseError> {
        self.store.reserving_users().await
    }

    /// Make a machine available again. Releasing a free machine succeeds
    /// and only refreshes its timestamp.
    pub async fn release(&self, name: &str) -> Result<ReleaseOutcome, DatabaseError> {
        if self
            .store
            .set_reservation(name, None, unix_timestamp())
            .await?
        {
            info!(machine = %name, "Machine released");
            Ok(ReleaseOutcome::Released)
        } else {
            debug!(machine = %name, "Release rejected: no such machine");
            Ok(ReleaseOutcome::NotFound)
        }
    }

    /// Delete a machine whatever its state; a current reservation is
    /// discarded with it.
    pub async fn remove(&self, name: &str) -> Result<RemoveOutcome, DatabaseError> {
        if self.store.delete_machine(name).await? {
            info!(machine = %name, "Machine removed");
            Ok(RemoveOutcome::Removed)
        } else {
            debug!(machine = %name, "Remove rejected: no such machine");
            Ok(RemoveOutcome::NotFound)
        }
    }

    /// Reserve `name` for `user`.
    ///
    /// Checks, in order: the machine exists, nobody holds it, and `user` is
    /// permitted for the machine's group (ungrouped machines are open to
    /// everyone). The final write only succeeds if the machine is still
    /// free, so concurrent reservations of one machine yield exactly one
    /// [`ReserveOutcome::Reserved`].
    pub async fn reserve(&self, name: &str, user: &str) -> Result<ReserveOutcome, DatabaseError> {
        loop {
            let Some(machine) = self.store.get_machine(name).await? else {
                debug!(machine = %name, user = %user, "Reserve rejected: no such machine");
                return Ok(ReserveOutcome::NotFound);
            };

            if let Some(holder) = machine.user {
                debug!(machine = %name, user = %user, holder = %holder, "Reserve rejected: already reserved");
                return Ok(ReserveOutcome::AlreadyReserved { holder });
            }

            if let Some(group) = machine.group {
                let permitted = self.store.users_in_group(&group).await?;
                if !permitted.iter().any(|u| u == user) {
                    debug!(machine = %name, user = %user, group = %group, "Reserve rejected: no permission");
                    return Ok(ReserveOutcome::Forbidden { group });
                }
            }

            if self
                .store
                .claim_machine(name, user, unix_timestamp())
                .await?
            {
                info!(machine = %name, user = %user, "Machine reserved");
                return Ok(ReserveOutcome::Reserved);
            }

            // The machine changed between the checks and the write; judge
            // the new state.
            debug!(machine = %name, user = %user, "Reserve lost race, rechecking");
        }
    }

    pub async fn associate(&self, user: &str, group: &str) -> Result<(), DatabaseError> {
        self.store.insert_permission(user, group).await?;
        info!(user = %user, group = %group, "Permission granted");
        Ok(())
    }

    pub async fn unassociate(&self, user: &str, group: &str) -> Result<(), DatabaseError> {
        self.store.delete_permission(user, group).await?;
        info!(user = %user, group = %group, "Permission revoked");
        Ok(())
    }

    pub async fn permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        self.store.list_permissions().await
    }

    /// Add every named row, reporting each outcome. Neither duplicates nor
    /// storage faults stop the import: every row gets its own result, so
    /// rows committed before a fault are still reported. Nameless rows are
    /// skipped.
    pub async fn import<I>(&self, rows: I) -> Vec<(NewMachine, Result<AddOutcome, DatabaseError>)>
    where
        I: IntoIterator<Item = PartialMachine>,
    {
        let mut report = Vec::new();
        for row in rows {
            let Some(machine) = row.into_new() else {
                debug!("Skipping imported row without a name");
                continue;
            };
            let outcome = self.add(&machine).await;
            report.push((machine, outcome));
        }

        let added = report
            .iter()
            .filter(|(_, o)| matches!(o, Ok(AddOutcome::Added)))
            .count();
        let failed = report.iter().filter(|(_, o)| o.is_err()).count();
        info!(rows = report.len(), added, failed, "Import finished");
        report
    }
}
