/// 相似度引擎
///
/// - 余弦相似度：L2 归一化点积，零向量相似度定义为 0
/// - 语义搜索：以某条记录的向量为查询，按相似度降序返回其他记录
/// - 相似分组：贪心分组，成员互不重叠
///
/// 分组的种子按记录 id 升序遍历，候选按与种子的相似度降序（相同则 id 升序）加入，
/// 只有与组内所有已有成员相似度都不低于阈值的候选才会加入

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::db::schema::ActivityRecord;
use crate::error::{AppError, AppResult};
use crate::settings::{is_valid_threshold, AnalysisConfig};

/// 搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record_id: i64,
    pub similarity: f32,
}

/// 相似分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityGroup {
    /// 成员 id（升序）
    pub member_ids: Vec<i64>,
}

impl SimilarityGroup {
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.member_ids.binary_search(&id).is_ok()
    }
}

/// 计算cosine相似度
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// L2 归一化，零向量返回全零向量
///
/// 结果保持 f64 精度，与 `cosine_similarity` 的计算一致
pub fn normalize(vector: &[f32]) -> Vec<f64> {
    let norm = vector.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vec![0.0; vector.len()];
    }
    vector.iter().map(|x| *x as f64 / norm).collect()
}

/// 两个已归一化向量的相似度
fn dot(a: &[f64], b: &[f64]) -> f32 {
    let sum: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    sum.clamp(-1.0, 1.0) as f32
}

/// 相似度降序，相同时 id 升序
fn rank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then(a.record_id.cmp(&b.record_id))
}

/// 相似度引擎
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    embedding_dimensions: Option<usize>,
}

impl SimilarityEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            embedding_dimensions: config.embedding_dimensions,
        }
    }

    /// 语义搜索
    ///
    /// `records` 为已按时间窗口筛选的候选集合（可以包含查询记录本身）
    pub fn semantic_search(
        &self,
        records: &[ActivityRecord],
        query: &ActivityRecord,
        limit: usize,
        similarity_threshold: f32,
    ) -> AppResult<Vec<SearchResult>> {
        validate_threshold(similarity_threshold)?;
        if limit == 0 {
            return Err(AppError::invalid_limit(limit));
        }

        let Some(query_embedding) = query.embedding.as_deref() else {
            log::debug!("Query record {} has no embedding, nothing to search", query.id);
            return Ok(Vec::new());
        };
        if let Some(expected) = self.embedding_dimensions {
            if query_embedding.len() != expected {
                log::warn!(
                    "Query record {} has dimension {} (expected {}), nothing to search",
                    query.id,
                    query_embedding.len(),
                    expected
                );
                return Ok(Vec::new());
            }
        }
        let query_vector = normalize(query_embedding);

        let mut results: Vec<SearchResult> = records
            .iter()
            .filter(|record| record.id != query.id)
            .filter_map(|record| {
                let embedding = candidate_embedding(record, query_vector.len())?;
                let similarity = dot(&query_vector, &normalize(embedding));
                (similarity >= similarity_threshold).then_some(SearchResult {
                    record_id: record.id,
                    similarity,
                })
            })
            .collect();

        results.sort_by(rank_order);
        results.truncate(limit);

        Ok(results)
    }

    /// 查找相似任务分组
    pub fn find_similar_task_groups(
        &self,
        records: &[ActivityRecord],
        min_group_size: usize,
        similarity_threshold: f32,
    ) -> AppResult<Vec<SimilarityGroup>> {
        validate_threshold(similarity_threshold)?;
        if min_group_size == 0 {
            return Err(AppError::invalid_group_size(min_group_size));
        }

        let mut candidates: Vec<&ActivityRecord> = records
            .iter()
            .filter(|record| {
                if record.embedding.is_none() {
                    log::debug!("Record {} has no embedding, skipped", record.id);
                }
                record.embedding.is_some()
            })
            .collect();
        candidates.sort_by_key(|record| record.id);
        candidates.dedup_by_key(|record| record.id);

        let Some(dimensions) = self
            .embedding_dimensions
            .or_else(|| candidates.first().and_then(|r| r.embedding.as_ref()).map(Vec::len))
        else {
            return Ok(Vec::new());
        };

        let (ids, vectors): (Vec<i64>, Vec<Vec<f64>>) = candidates
            .iter()
            .filter_map(|record| {
                candidate_embedding(record, dimensions).map(|embedding| (record.id, normalize(embedding)))
            })
            .unzip();

        let matrix = similarity_matrix(&vectors);
        let groups = greedy_groups(&ids, &matrix, min_group_size, similarity_threshold);

        log::debug!(
            "Grouped {} records into {} similarity groups (threshold {})",
            ids.len(),
            groups.len(),
            similarity_threshold
        );

        Ok(groups)
    }
}

/// 候选记录的向量：缺失或维度不一致时返回 None
fn candidate_embedding(record: &ActivityRecord, dimensions: usize) -> Option<&[f32]> {
    let embedding = record.embedding.as_deref()?;
    if embedding.len() != dimensions {
        log::warn!(
            "Record {} has dimension {} (expected {}), excluded",
            record.id,
            embedding.len(),
            dimensions
        );
        return None;
    }
    Some(embedding)
}

/// 完整相似度矩阵（按行并行计算，行列顺序与输入一致）
fn similarity_matrix(vectors: &[Vec<f64>]) -> Vec<Vec<f32>> {
    vectors
        .par_iter()
        .map(|row| vectors.iter().map(|col| dot(row, col)).collect())
        .collect()
}

/// 贪心分组
fn greedy_groups(
    ids: &[i64],
    matrix: &[Vec<f32>],
    min_group_size: usize,
    threshold: f32,
) -> Vec<SimilarityGroup> {
    let mut assigned = vec![false; ids.len()];
    let mut groups = Vec::new();

    for seed in 0..ids.len() {
        if assigned[seed] {
            continue;
        }

        let mut candidates: Vec<usize> = (0..ids.len())
            .filter(|&other| other != seed && !assigned[other] && matrix[seed][other] >= threshold)
            .collect();
        candidates.sort_by(|&a, &b| {
            matrix[seed][b]
                .partial_cmp(&matrix[seed][a])
                .unwrap_or(Ordering::Equal)
                .then(ids[a].cmp(&ids[b]))
        });

        let mut members = vec![seed];
        for candidate in candidates {
            if members.iter().all(|&member| matrix[member][candidate] >= threshold) {
                members.push(candidate);
            }
        }

        if members.len() < min_group_size {
            continue;
        }

        for &member in &members {
            assigned[member] = true;
        }
        let mut member_ids: Vec<i64> = members.iter().map(|&i| ids[i]).collect();
        member_ids.sort_unstable();
        groups.push(SimilarityGroup { member_ids });
    }

    groups
}

fn validate_threshold(threshold: f32) -> AppResult<()> {
    if is_valid_threshold(threshold) {
        Ok(())
    } else {
        Err(AppError::invalid_threshold(threshold))
    }
}
