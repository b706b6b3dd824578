//! Database connection and initialization.

pub use labres_core::db::DatabaseError;

labres_core::define_database!(RegistryDatabase, "Registry schema ready");

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_works() {
        let db = RegistryDatabase::open_in_memory().await;
        assert!(db.is_ok());
    }

    #[tokio::test]
    async fn reopening_file_keeps_schema_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let db = RegistryDatabase::open(&path).await.unwrap();
        sqlx::query("INSERT INTO machines (name, start) VALUES ('alpha', 1)")
            .execute(db.pool())
            .await
            .unwrap();
        db.pool().close().await;

        let db = RegistryDatabase::open(&path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM machines")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
