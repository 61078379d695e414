/// 数据库迁移
///
/// 负责创建和更新数据库表结构

use anyhow::Result;
use rusqlite::Connection;

/// 运行所有迁移
pub fn run_migrations(conn: &Connection) -> Result<()> {
    create_activity_records_table(conn)?;

    Ok(())
}

/// 创建 activity_records 表
///
/// timestamp 允许为空：采集端偶尔写入缺失时间的行，读取时排除
fn create_activity_records_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_records (
            id INTEGER PRIMARY KEY,
            timestamp INTEGER,
            task_label TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'other',
            embedding BLOB,
            raw_text TEXT,
            window_data TEXT,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    // 创建索引
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_records_timestamp
         ON activity_records(timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_records_task
         ON activity_records(task_label)",
        [],
    )?;

    Ok(())
}
