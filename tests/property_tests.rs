//! Property tests for session reconstruction and similarity grouping.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, TimeZone, Utc};
use work_recall_lib::analysis::{cosine_similarity, SessionReconstructor, SimilarityEngine};
use work_recall_lib::{ActivityRecord, AnalysisConfig};

const TASKS: &[&str] = &["coding", "email", "reading"];
const CATEGORIES: &[&str] = &["work", "communication"];

fn build_records(layouts: &[(i64, usize, usize)]) -> Vec<ActivityRecord> {
    let base = Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap();
    layouts
        .iter()
        .enumerate()
        .map(|(i, (offset, task, category))| {
            ActivityRecord::new(
                i as i64 + 1,
                base + Duration::seconds(*offset),
                TASKS[*task % TASKS.len()],
                CATEGORIES[*category % CATEGORIES.len()],
            )
        })
        .collect()
}

fn record_layouts() -> impl Strategy<Value = Vec<(i64, usize, usize)>> {
    prop::collection::vec((0i64..7200, 0usize..3, 0usize..2), 0..60)
}

fn build_embedded(vectors: &[Vec<f32>]) -> Vec<ActivityRecord> {
    let base = Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap();
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            ActivityRecord::new(i as i64 + 1, base + Duration::seconds(i as i64), "task", "work")
                .with_embedding(v.clone())
        })
        .collect()
}

fn vectors() -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 0..25)
}

// Sessions cover every record exactly once.
proptest! {
    #[test]
    fn prop_sessions_partition_records(layouts in record_layouts()) {
        let records = build_records(&layouts);
        let sessions = SessionReconstructor::new(AnalysisConfig::default()).reconstruct(&records);

        let mut seen = HashSet::new();
        for session in &sessions {
            for id in &session.record_ids {
                prop_assert!(seen.insert(*id), "record {} appears twice", id);
            }
        }
        let expected: HashSet<i64> = records.iter().map(|r| r.id).collect();
        prop_assert_eq!(seen, expected);
    }
}

// Same-task sessions never overlap, durations and confidence stay in range.
proptest! {
    #[test]
    fn prop_session_invariants(layouts in record_layouts()) {
        let records = build_records(&layouts);
        let sessions = SessionReconstructor::new(AnalysisConfig::default()).reconstruct(&records);

        for session in &sessions {
            prop_assert!(session.active_duration_seconds >= 0);
            prop_assert!(session.active_duration_seconds <= session.total_elapsed_seconds);
            prop_assert!((0.0..=1.0).contains(&session.confidence));
            prop_assert_eq!(session.record_count, session.record_ids.len());
        }

        for task in TASKS {
            let mut task_sessions: Vec<_> = sessions.iter().filter(|s| s.task_label == *task).collect();
            task_sessions.sort_by_key(|s| s.start);
            for pair in task_sessions.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
        }
    }
}

// Reconstruction is idempotent and independent of input order.
proptest! {
    #[test]
    fn prop_sessions_order_independent(layouts in record_layouts()) {
        let records = build_records(&layouts);
        let reconstructor = SessionReconstructor::new(AnalysisConfig::default());

        let first = reconstructor.reconstruct(&records);
        let mut reversed = records.clone();
        reversed.reverse();
        let second = reconstructor.reconstruct(&reversed);

        prop_assert_eq!(first, second);
    }
}

// Cosine similarity is symmetric and reflexive.
proptest! {
    #[test]
    fn prop_cosine_symmetric_reflexive(
        a in prop::collection::vec(-10.0f32..10.0, 8),
        b in prop::collection::vec(-10.0f32..10.0, 8),
    ) {
        prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));

        if a.iter().any(|x| *x != 0.0) {
            prop_assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-4);
        }
    }
}

// Groups are disjoint, meet the minimum size and are pairwise similar.
proptest! {
    #[test]
    fn prop_groups_disjoint(vectors in vectors(), threshold in 0.0f32..1.0, min_size in 1usize..4) {
        let records = build_embedded(&vectors);
        let groups = SimilarityEngine::new(&AnalysisConfig::default())
            .find_similar_task_groups(&records, min_size, threshold)
            .unwrap();

        let mut seen = BTreeSet::new();
        for group in &groups {
            prop_assert!(group.len() >= min_size);
            for id in &group.member_ids {
                prop_assert!(seen.insert(*id));
            }
            for a in &group.member_ids {
                for b in &group.member_ids {
                    if a != b {
                        let va = &vectors[(*a - 1) as usize];
                        let vb = &vectors[(*b - 1) as usize];
                        prop_assert!(cosine_similarity(va, vb) >= threshold - 1e-5);
                    }
                }
            }
        }
    }
}

// Search never returns the query, stays sorted and bounded.
proptest! {
    #[test]
    fn prop_search_excludes_query(vectors in vectors(), limit in 1usize..10, threshold in 0.0f32..1.0) {
        let records = build_embedded(&vectors);
        prop_assume!(!records.is_empty());

        let query = &records[0];
        let results = SimilarityEngine::new(&AnalysisConfig::default())
            .semantic_search(&records, query, limit, threshold)
            .unwrap();

        prop_assert!(results.len() <= limit);
        prop_assert!(results.iter().all(|r| r.record_id != query.id));
        for pair in results.windows(2) {
            prop_assert!(
                pair[0].similarity > pair[1].similarity
                    || (pair[0].similarity == pair[1].similarity && pair[0].record_id < pair[1].record_id)
            );
        }
    }
}
