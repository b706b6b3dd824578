//! Data model for the reservation registry.

use serde::{Deserialize, Serialize};

/// A machine as stored in the registry.
///
/// `user` is the only reservation flag: `None` means the machine is
/// available, `Some` names the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Machine {
    pub name: String,
    pub ip: Option<String>,
    /// Identifier assigned by the machine's controller (IVM, HMC, ...).
    pub id: Option<String>,
    #[sqlx(rename = "grp")]
    pub group: Option<String>,
    pub user: Option<String>,
    /// Unix time of creation or of the last reserve/release.
    #[sqlx(rename = "start")]
    pub since: i64,
}

/// Reservation state derived from [`Machine::user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState<'a> {
    Available,
    Reserved { user: &'a str },
}

impl Machine {
    pub fn state(&self) -> MachineState<'_> {
        match self.user.as_deref() {
            None => MachineState::Available,
            Some(user) => MachineState::Reserved { user },
        }
    }

    pub const fn is_available(&self) -> bool {
        self.user.is_none()
    }

    /// Seconds spent in the current state as of `now`.
    pub fn held_for(&self, now: i64) -> i64 {
        (now - self.since).max(0)
    }
}

/// Attributes supplied when adding a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMachine {
    pub name: String,
    pub ip: Option<String>,
    pub id: Option<String>,
    pub group: Option<String>,
}

impl NewMachine {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A row produced by a bulk import. Any column may be missing, including
/// the name; nameless rows are skipped on import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMachine {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub id: Option<String>,
    pub group: Option<String>,
}

impl PartialMachine {
    pub fn into_new(self) -> Option<NewMachine> {
        let name = self.name?;
        Some(NewMachine {
            name,
            ip: self.ip,
            id: self.id,
            group: self.group,
        })
    }
}

/// Grant allowing `user` to reserve machines tagged with `group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub user: String,
    #[sqlx(rename = "grp")]
    pub group: String,
}
