//! `SQLite` implementation of [`MachineStore`].

use async_trait::async_trait;

use super::MachineStore;
use super::db::{DatabaseError, RegistryDatabase};
use crate::machine::{Machine, NewMachine, Permission};

#[async_trait]
impl MachineStore for RegistryDatabase {
    // =========================================================================
    // Machine writes
    // =========================================================================

    async fn insert_machine(&self, machine: &NewMachine, now: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO machines (name, ip, id, grp, user, start) VALUES (?, ?, ?, ?, NULL, ?)",
        )
        .bind(&machine.name)
        .bind(&machine.ip)
        .bind(&machine.id)
        .bind(&machine.group)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn delete_machine(&self, name: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM machines WHERE name = ?")
            .bind(name)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_reservation(
        &self,
        name: &str,
        user: Option<&str>,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE machines SET user = ?, start = ? WHERE name = ?")
            .bind(user)
            .bind(now)
            .bind(name)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn claim_machine(&self, name: &str, user: &str, now: i64) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE machines SET user = ?, start = ? WHERE name = ? AND user IS NULL")
                .bind(user)
                .bind(now)
                .bind(name)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Permission writes
    // =========================================================================

    async fn insert_permission(&self, user: &str, group: &str) -> Result<(), DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO permissions (user, grp) VALUES (?, ?)")
            .bind(user)
            .bind(group)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn delete_permission(&self, user: &str, group: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM permissions WHERE user = ? AND grp = ?")
            .bind(user)
            .bind(group)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    async fn machine_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM machines WHERE name = ?)")
                .bind(name)
                .fetch_one(self.pool())
                .await?;

        Ok(found != 0)
    }

    async fn get_machine(&self, name: &str) -> Result<Option<Machine>, DatabaseError> {
        let machine = sqlx::query_as::<_, Machine>(
            "SELECT name, ip, id, grp, user, start FROM machines WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?;

        Ok(machine)
    }

    async fn machine_names(&self) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM machines ORDER BY name ASC")
            .fetch_all(self.pool())
            .await?;

        Ok(names)
    }

    async fn available_names(&self) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM machines WHERE user IS NULL ORDER BY name ASC")
                .fetch_all(self.pool())
                .await?;

        Ok(names)
    }

    async fn reserved_names(&self) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM machines WHERE user IS NOT NULL ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(names)
    }

    async fn names_by_user(&self, user: &str) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM machines WHERE user = ? ORDER BY name ASC")
                .bind(user)
                .fetch_all(self.pool())
                .await?;

        Ok(names)
    }

    async fn reserving_users(&self) -> Result<Vec<String>, DatabaseError> {
        let users: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT user FROM machines WHERE user IS NOT NULL ORDER BY user ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }

    async fn users_in_group(&self, group: &str) -> Result<Vec<String>, DatabaseError> {
        let users: Vec<String> =
            sqlx::query_scalar("SELECT user FROM permissions WHERE grp = ? ORDER BY user ASC")
                .bind(group)
                .fetch_all(self.pool())
                .await?;

        Ok(users)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        let grants = sqlx::query_as::<_, Permission>(
            "SELECT user, grp FROM permissions ORDER BY grp ASC, user ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(grants)
    }
}
