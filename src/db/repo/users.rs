//! Address to uid lookup rows backing the SQLite user directory.

use crate::domain::{Address, Uid};

use super::Repository;

impl Repository {
    /// Map `address` to `uid`, replacing any earlier mapping for the address.
    pub async fn register_address(&self, address: &Address, uid: Uid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_addresses (address, uid)
            VALUES (?, ?)
            ON CONFLICT(address) DO UPDATE SET uid = excluded.uid
            "#,
        )
        .bind(address.as_str())
        .bind(uid.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_uid_by_address(&self, address: &Address) -> Result<Option<Uid>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT uid FROM user_addresses WHERE address = ?")
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(uid,)| Uid::new(uid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_register_and_find_address() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let repo = Repository::new(init_db(&db_path).await.expect("init_db failed"));

        let addr = Address::from_str("0xABCDEF").unwrap();
        assert_eq!(repo.find_uid_by_address(&addr).await.unwrap(), None);

        repo.register_address(&addr, Uid::new(11)).await.unwrap();
        let lookup = Address::from_str("0xabcdef").unwrap();
        assert_eq!(repo.find_uid_by_address(&lookup).await.unwrap(), Some(Uid::new(11)));

        repo.register_address(&addr, Uid::new(12)).await.unwrap();
        assert_eq!(repo.find_uid_by_address(&lookup).await.unwrap(), Some(Uid::new(12)));
    }
}
