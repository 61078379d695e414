/// 活动记录存储
///
/// 记录来源边界：写入时校验向量维度，读取时解码窗口信息、
/// 排除缺少时间戳的行，并按时间顺序返回

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::schema::{ActivityRecord, WindowData};
use super::Database;

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, task_label, category, embedding, raw_text, window_data FROM activity_records";

/// 记录存储
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
    embedding_dimensions: Option<usize>,
}

/// 数据库原始行（timestamp 可能缺失）
struct RecordRow {
    id: i64,
    timestamp: Option<i64>,
    task_label: String,
    category: String,
    embedding: Option<Vec<u8>>,
    raw_text: Option<String>,
    window_data: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            task_label: row.get(2)?,
            category: row.get(3)?,
            embedding: row.get(4)?,
            raw_text: row.get(5)?,
            window_data: row.get(6)?,
        })
    }

    /// 转换为活动记录，缺少有效时间戳时返回 None
    fn into_record(self) -> Option<ActivityRecord> {
        let Some(seconds) = self.timestamp else {
            log::warn!("Record {} has no timestamp, excluded", self.id);
            return None;
        };
        let Some(timestamp) = DateTime::from_timestamp(seconds, 0) else {
            log::warn!("Record {} has out-of-range timestamp {}, excluded", self.id, seconds);
            return None;
        };

        let embedding = match self.embedding {
            Some(blob) => match deserialize_embedding(&blob) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    log::warn!("Record {} has unreadable embedding: {}", self.id, e);
                    None
                }
            },
            None => None,
        };

        Some(ActivityRecord {
            id: self.id,
            timestamp,
            task_label: self.task_label,
            category: self.category,
            embedding,
            raw_text: self.raw_text,
            window: self.window_data.as_deref().and_then(WindowData::decode),
        })
    }
}

impl RecordStore {
    pub fn new(db: Arc<Database>, embedding_dimensions: Option<usize>) -> Self {
        Self { db, embedding_dimensions }
    }

    /// 写入单条记录
    pub fn insert_record(&self, record: &ActivityRecord) -> Result<()> {
        self.check_dimensions(record)?;
        self.db.with_connection(|conn| insert_with(conn, record))
    }

    /// 批量写入记录（单个事务）
    pub fn insert_records(&self, records: &[ActivityRecord]) -> Result<usize> {
        for record in records {
            self.check_dimensions(record)?;
        }

        self.db.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            for record in records {
                insert_with(&tx, record)?;
            }
            tx.commit()?;
            Ok(records.len())
        })
    }

    /// 写入缺少时间戳的原始行
    ///
    /// 采集端无法确定截图时间时使用。行会保留在表中，
    /// 但所有读取接口都会跳过它并记录 warn 日志
    pub fn insert_untimed_row(&self, id: i64, task_label: &str, category: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO activity_records (id, timestamp, task_label, category)
                 VALUES (?1, NULL, ?2, ?3)",
                params![id, task_label, category],
            )?;
            Ok(())
        })
    }

    /// 读取所有记录（按时间升序）
    pub fn load_all(&self) -> Result<Vec<ActivityRecord>> {
        self.query_records(&format!("{} ORDER BY timestamp ASC, id ASC", SELECT_COLUMNS), params![])
    }

    /// 读取时间范围内的记录（闭区间，按时间升序）
    pub fn load_records(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ActivityRecord>> {
        let sql = format!(
            "{} WHERE timestamp IS NULL OR timestamp BETWEEN ?1 AND ?2
             ORDER BY timestamp ASC, id ASC",
            SELECT_COLUMNS
        );
        self.query_records(&sql, params![start.timestamp(), end.timestamp()])
    }

    /// 读取某一 UTC 日期的记录
    pub fn load_records_for_date(&self, date: NaiveDate) -> Result<Vec<ActivityRecord>> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .context("无效的日期")?
            .and_utc();
        let end = start + Duration::days(1) - Duration::seconds(1);
        self.load_records(start, end)
    }

    /// 按 id 读取单条记录
    pub fn load_record(&self, id: i64) -> Result<Option<ActivityRecord>> {
        let row = self.db.with_connection(|conn| {
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id], RecordRow::from_row)
                .optional()?)
        })?;

        Ok(row.and_then(RecordRow::into_record))
    }

    /// 记录总数（包括缺少时间戳的行）
    pub fn record_count(&self) -> Result<usize> {
        self.db.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM activity_records", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    fn query_records(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ActivityRecord>> {
        let rows = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(args, RecordRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        Ok(rows.into_iter().filter_map(RecordRow::into_record).collect())
    }

    /// 写入前校验向量维度，不做截断或补齐
    fn check_dimensions(&self, record: &ActivityRecord) -> Result<()> {
        if let (Some(expected), Some(embedding)) = (self.embedding_dimensions, &record.embedding) {
            if embedding.len() != expected {
                anyhow::bail!(
                    "记录 {} 的向量维度 {} 与部署维度 {} 不一致",
                    record.id,
                    embedding.len(),
                    expected
                );
            }
        }
        Ok(())
    }
}

fn insert_with(conn: &Connection, record: &ActivityRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO activity_records (id, timestamp, task_label, category, embedding, raw_text, window_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.timestamp.timestamp(),
            &record.task_label,
            &record.category,
            record.embedding.as_deref().map(serialize_embedding),
            &record.raw_text,
            record.window.as_ref().map(WindowData::encode),
        ],
    )
    .with_context(|| format!("写入记录 {} 失败", record.id))?;
    Ok(())
}

/// 序列化embedding为BLOB
fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// 反序列化BLOB为embedding
fn deserialize_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        anyhow::bail!("Invalid embedding blob length");
    }

    let embedding: Vec<f32> = blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect();

    Ok(embedding)
}
