use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub mod schema;
pub mod migrations;
pub mod records;

/// 数据库管理器
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// 创建新的数据库连接
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // 启用外键约束
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 创建内存数据库（测试和临时分析用）
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<()> {
        self.with_connection(|conn| migrations::run_migrations(conn))
    }

    /// 获取数据库连接的引用（需要锁定）
    pub fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("数据库连接锁已损坏"))?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_database_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_path_buf();

        let db = Database::new(db_path).unwrap();
        assert!(db.initialize().is_ok());
    }

    #[test]
    fn test_in_memory_database_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM activity_records", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
