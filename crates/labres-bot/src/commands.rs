//! Chat commands.
//!
//! A chat line such as `reserve lab01 lab02` is parsed into a [`Command`]
//! and executed by [`CommandHandler`] on behalf of the sender. Every
//! machine argument is handled on its own and gets its own [`Reply`]; one
//! failure, storage faults included, never stops the rest.

use labres_core::db::unix_timestamp;
use labres_registry::{
    AddOutcome, DatabaseError, MachineState, MachineStore, NewMachine, Registry, ReleaseOutcome,
    RemoveOutcome, ReserveOutcome,
};
use tracing::{debug, error, warn};

use crate::format::{format_interval, format_list};
use crate::importer::{ImportError, PageSource, parse_table};

const SHOW_USAGE: &str = "Usage: show (all | reserved | free)";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(Vec<String>),
    Free(Vec<String>),
    Info(Vec<String>),
    Reserve(Vec<String>),
    Remove(Vec<String>),
    /// `show all|reserved|free`; the filter is checked when handled.
    Show(Option<String>),
    /// Bulk import from the machines table.
    Update,
    Users,
    Groups,
    Associate(Vec<String>),
    Unassociate(Vec<String>),
    Ping,
    Unknown(String),
}

impl Command {
    /// Parse a chat line. Returns `None` for a blank line.
    ///
    /// Verbs are case-insensitive and may carry a leading `@`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.trim_start_matches('@').to_lowercase();
        let args: Vec<String> = words.map(str::to_string).collect();

        Some(match verb.as_str() {
            "add" => Self::Add(args),
            "free" | "release" => Self::Free(args),
            "info" => Self::Info(args),
            "reserve" => Self::Reserve(args),
            "remove" => Self::Remove(args),
            "show" => Self::Show(args.into_iter().next()),
            "update" => Self::Update,
            "users" => Self::Users,
            "groups" => Self::Groups,
            "associate" => Self::Associate(args),
            "unassociate" => Self::Unassociate(args),
            "ping" => Self::Ping,
            _ => Self::Unknown(verb),
        })
    }
}

/// One line of bot output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Sent to the requester in private instead of the channel.
    pub private: bool,
    /// Prefixed with the requester's nick.
    pub mention: bool,
}

impl Reply {
    pub fn public(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            private: false,
            mention: false,
        }
    }

    pub fn to_sender(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            private: false,
            mention: true,
        }
    }

    pub fn private(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            private: true,
            mention: false,
        }
    }

    /// Render for a line-oriented transport.
    pub fn render(&self, nick: &str) -> String {
        if self.private {
            format!("[private -> {nick}] {}", self.text)
        } else if self.mention {
            format!("{nick}: {}", self.text)
        } else {
            self.text.clone()
        }
    }
}

fn machines_usage(verb: &str) -> Reply {
    Reply::to_sender(format!("Usage: {verb} <machine 1> [... <machine N>]"))
}

fn missing(name: &str) -> Reply {
    Reply::to_sender(format!("Machine {name} does not exist"))
}

fn internal_error(name: &str, e: &DatabaseError) -> Reply {
    error!(machine = %name, error = %e, "Storage fault while handling machine");
    Reply::to_sender(format!("Machine {name}: internal error"))
}

fn added_reply(name: &str, outcome: AddOutcome) -> Reply {
    match outcome {
        AddOutcome::Added => Reply::public(format!("Machine {name} added")),
        AddOutcome::AlreadyExists => Reply::public(format!("Machine {name} already exists")),
    }
}

/// Executes chat commands against a [`Registry`].
#[derive(Debug, Clone)]
pub struct CommandHandler<S> {
    registry: Registry<S>,
    source: Option<PageSource>,
}

impl<S: MachineStore> CommandHandler<S> {
    /// `source` is where `update` reads the machines table from; without it
    /// `update` only reports that nothing is configured.
    pub const fn new(registry: Registry<S>, source: Option<PageSource>) -> Self {
        Self { registry, source }
    }

    pub const fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// Parse and execute one chat line from `sender`.
    pub async fn handle_line(&self, sender: &str, line: &str) -> Result<Vec<Reply>, DatabaseError> {
        match Command::parse(line) {
            Some(command) => self.handle(sender, command).await,
            None => Ok(Vec::new()),
        }
    }

    /// Execute a command for `sender`.
    ///
    /// Per-machine commands turn a storage fault into that machine's reply
    /// and carry on. Listings and permission changes have nothing partial
    /// to report, so a fault there aborts the command.
    pub async fn handle(&self, sender: &str, command: Command) -> Result<Vec<Reply>, DatabaseError> {
        debug!(sender = %sender, ?command, "Handling command");
        match command {
            Command::Add(names) => self.add(&names).await,
            Command::Free(names) => self.free(&names).await,
            Command::Info(names) => self.info(&names).await,
            Command::Reserve(names) => self.reserve(sender, &names).await,
            Command::Remove(names) => self.remove(&names).await,
            Command::Show(filter) => self.show(filter.as_deref()).await,
            Command::Update => self.update().await,
            Command::Users => self.users().await,
            Command::Groups => self.groups().await,
            Command::Associate(args) => self.associate(&args, true).await,
            Command::Unassociate(args) => self.associate(&args, false).await,
            Command::Ping => Ok(vec![Reply::to_sender("pong")]),
            Command::Unknown(verb) => Ok(vec![Reply::to_sender(format!(
                "Unknown command: {verb}"
            ))]),
        }
    }

    async fn add(&self, names: &[String]) -> Result<Vec<Reply>, DatabaseError> {
        if names.is_empty() {
            return Ok(vec![machines_usage("add")]);
        }

        let mut replies = Vec::with_capacity(names.len());
        for name in names {
            replies.push(
                match self.registry.add(&NewMachine::named(name.as_str())).await {
                    Ok(outcome) => added_reply(name, outcome),
                    Err(e) => internal_error(name, &e),
                },
            );
        }
        Ok(replies)
    }

    async fn free(&self, names: &[String]) -> Result<Vec<Reply>, DatabaseError> {
        if names.is_empty() {
            return Ok(vec![machines_usage("free")]);
        }

        let mut replies = Vec::with_capacity(names.len());
        for name in names {
            replies.push(match self.registry.release(name).await {
                Ok(ReleaseOutcome::Released) => {
                    Reply::public(format!("Machine {name} has been released"))
                }
                Ok(ReleaseOutcome::NotFound) => missing(name),
                Err(e) => internal_error(name, &e),
            });
        }
        Ok(replies)
    }

    async fn info(&self, names: &[String]) -> Result<Vec<Reply>, DatabaseError> {
        if names.is_empty() {
            return Ok(vec![machines_usage("info")]);
        }

        let mut replies = vec![Reply::to_sender("pvt")];
        let now = unix_timestamp();
        for name in names {
            let machine = match self.registry.get_info(name).await {
                Ok(Some(machine)) => machine,
                Ok(None) => {
                    replies.push(missing(name));
                    continue;
                }
                Err(e) => {
                    replies.push(internal_error(name, &e));
                    continue;
                }
            };

            let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".into());
            let interval = format_interval(machine.held_for(now));

            replies.push(Reply::private(format!("# Name   : {}", machine.name)));
            replies.push(Reply::private(format!("# Ip     : {}", field(&machine.ip))));
            replies.push(Reply::private(format!("# Id     : {}", field(&machine.id))));
            replies.push(Reply::private(format!("# Group  : {}", field(&machine.group))));
            match machine.state() {
                MachineState::Available => {
                    replies.push(Reply::private(format!("# Status : available ({interval})")));
                }
                MachineState::Reserved { user } => {
                    replies.push(Reply::private(format!("# Status : reserved ({interval})")));
                    replies.push(Reply::private(format!("# User   : {user}")));
                }
            }
        }
        Ok(replies)
    }

    async fn reserve(&self, sender: &str, names: &[String]) -> Result<Vec<Reply>, DatabaseError> {
        if names.is_empty() {
            return Ok(vec![machines_usage("reserve")]);
        }

        let mut replies = Vec::with_capacity(names.len());
        for name in names {
            replies.push(match self.registry.reserve(name, sender).await {
                Ok(ReserveOutcome::Reserved) => {
                    Reply::public(format!("Machine {name} has been reserved for {sender}"))
                }
                Ok(ReserveOutcome::NotFound) => missing(name),
                Ok(ReserveOutcome::AlreadyReserved { .. }) => {
                    Reply::to_sender(format!("Machine {name} is already reserved"))
                }
                Ok(ReserveOutcome::Forbidden { .. }) => Reply::to_sender(format!(
                    "User {sender} has no permissions to reserve machine {name}"
                )),
                Err(e) => internal_error(name, &e),
            });
        }
        Ok(replies)
    }

    async fn remove(&self, names: &[String]) -> Result<Vec<Reply>, DatabaseError> {
        if names.is_empty() {
            return Ok(vec![machines_usage("remove")]);
        }

        let mut replies = Vec::with_capacity(names.len());
        for name in names {
            replies.push(match self.registry.remove(name).await {
                Ok(RemoveOutcome::Removed) => Reply::public(format!("Machine {name} removed")),
                Ok(RemoveOutcome::NotFound) => missing(name),
                Err(e) => internal_error(name, &e),
            });
        }
        Ok(replies)
    }

    async fn show(&self, filter: Option<&str>) -> Result<Vec<Reply>, DatabaseError> {
        let (label, machines) = match filter {
            Some("all") => ("Registered machines", self.registry.list_all().await?),
            Some("reserved") => ("Reserved machines", self.registry.list_reserved().await?),
            Some("free") => ("Available machines", self.registry.list_available().await?),
            _ => return Ok(vec![Reply::to_sender(SHOW_USAGE)]),
        };
        Ok(vec![Reply::to_sender(format!(
            "{label}: {}",
            format_list(&machines)
        ))])
    }

    async fn update(&self) -> Result<Vec<Reply>, DatabaseError> {
        let mut replies = vec![Reply::public("Retrieving machines table from wiki")];

        let page = match self.load_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Machines table import failed");
                replies.push(Reply::to_sender(format!(
                    "Failed to retrieve machines table: {e}"
                )));
                return Ok(replies);
            }
        };

        for (machine, outcome) in self.registry.import(parse_table(&page)).await {
            replies.push(match outcome {
                Ok(outcome) => added_reply(&machine.name, outcome),
                Err(e) => internal_error(&machine.name, &e),
            });
        }
        Ok(replies)
    }

    async fn load_page(&self) -> Result<String, ImportError> {
        self.source
            .as_ref()
            .ok_or(ImportError::MissingSource)?
            .load()
            .await
    }

    async fn users(&self) -> Result<Vec<Reply>, DatabaseError> {
        let mut entries = Vec::new();
        for user in self.registry.list_users().await? {
            let machines = self.registry.list_by_user(&user).await?;
            entries.push(format!("{user} - {}", format_list(&machines)));
        }

        let listing = if entries.is_empty() {
            "none".to_string()
        } else {
            entries.join(" * ")
        };
        Ok(vec![Reply::public(format!("Machines by user: {listing}"))])
    }

    async fn groups(&self) -> Result<Vec<Reply>, DatabaseError> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for grant in self.registry.permissions().await? {
            match groups.last_mut() {
                Some((group, users)) if *group == grant.group => users.push(grant.user),
                _ => groups.push((grant.group, vec![grant.user])),
            }
        }

        let listing = if groups.is_empty() {
            "none".to_string()
        } else {
            groups
                .iter()
                .map(|(group, users)| format!("{group} - {}", format_list(users)))
                .collect::<Vec<_>>()
                .join(" * ")
        };
        Ok(vec![Reply::public(format!("Group permissions: {listing}"))])
    }

    async fn associate(&self, args: &[String], grant: bool) -> Result<Vec<Reply>, DatabaseError> {
        let [user, group] = args else {
            let verb = if grant { "associate" } else { "unassociate" };
            return Ok(vec![Reply::to_sender(format!(
                "Usage: {verb} <user> <group>"
            ))]);
        };

        if grant {
            self.registry.associate(user, group).await?;
            Ok(vec![Reply::public(format!(
                "User {user} can now reserve machines in group {group}"
            ))])
        } else {
            self.registry.unassociate(user, group).await?;
            Ok(vec![Reply::public(format!(
                "User {user} can no longer reserve machines in group {group}"
            ))])
        }
    }
}
