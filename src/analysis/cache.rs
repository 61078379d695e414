/// 分析结果缓存
///
/// 由调用方创建并显式传入，按输入内容的 SHA-256 哈希索引，
/// 每次查询都带上有效期，过期条目在查询时清除

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::db::schema::ActivityRecord;

/// 结果缓存
pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 读取未过期的缓存值
    pub fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let fresh = entries.get(key).map(|entry| entry.stored_at.elapsed() < ttl)?;
        if fresh {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    /// 写入缓存值
    pub fn insert(&self, key: String, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    /// 命中则返回缓存值，否则计算并写入
    pub fn get_or_try_insert<E, F>(&self, key: String, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key, ttl) {
            log::debug!("Cache hit for {}", key);
            return Ok(value);
        }

        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// 当前条目数（包括已过期但未清除的条目）
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// 计算记录集合与参数的内容哈希
///
/// 覆盖 id、时间戳和向量字节，参数以字符串形式追加
pub fn content_hash(records: &[ActivityRecord], params: &str) -> String {
    let mut hasher = Sha256::new();

    for record in records {
        hasher.update(record.id.to_le_bytes());
        hasher.update(record.timestamp.timestamp().to_le_bytes());
        match &record.embedding {
            Some(embedding) => {
                hasher.update((embedding.len() as u64).to_le_bytes());
                for value in embedding {
                    hasher.update(value.to_le_bytes());
                }
            }
            None => hasher.update([0xffu8]),
        }
    }
    hasher.update(params.as_bytes());

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: i64, embedding: Vec<f32>) -> ActivityRecord {
        ActivityRecord::new(id, Utc.timestamp_opt(1_700_000_000, 0).unwrap(), "task", "work")
            .with_embedding(embedding)
    }

    #[test]
    fn test_content_hash_stable() {
        let records = vec![record(1, vec![1.0, 0.0]), record(2, vec![0.0, 1.0])];

        let hash1 = content_hash(&records, "groups:2:0.9");
        let hash2 = content_hash(&records, "groups:2:0.9");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_input() {
        let records = vec![record(1, vec![1.0, 0.0])];
        let changed = vec![record(1, vec![1.0, 0.5])];

        assert_ne!(content_hash(&records, "p"), content_hash(&changed, "p"));
        assert_ne!(content_hash(&records, "p"), content_hash(&records, "q"));
    }

    #[test]
    fn test_get_or_try_insert_uses_cache() {
        let cache: ResultCache<Vec<i64>> = ResultCache::new();
        let ttl = Duration::from_secs(60);

        let first: Result<_, ()> = cache.get_or_try_insert("k".to_string(), ttl, || Ok(vec![1]));
        let second: Result<_, ()> = cache.get_or_try_insert("k".to_string(), ttl, || Ok(vec![2]));

        assert_eq!(first.unwrap(), vec![1]);
        assert_eq!(second.unwrap(), vec![1]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_recomputed() {
        let cache: ResultCache<u32> = ResultCache::new();
        cache.insert("k".to_string(), 1);

        assert_eq!(cache.get("k", Duration::ZERO), None);
        assert!(cache.is_empty());

        let value: Result<_, ()> = cache.get_or_try_insert("k".to_string(), Duration::ZERO, || Ok(2));
        assert_eq!(value.unwrap(), 2);
    }

    #[test]
    fn test_failed_compute_not_cached() {
        let cache: ResultCache<u32> = ResultCache::new();
        let result: Result<u32, &str> =
            cache.get_or_try_insert("k".to_string(), Duration::from_secs(60), || Err("boom"));

        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
