//! Diff labels as SQL expressions.
//!
//! The expressions mirror `sd_core::diff_status::derive_diff_status` and read
//! the diff through alias `d` and its compare artifact through alias `ca`.

use sd_core::diff_status::FAILURE_MARKER;
use sd_core::types::DiffStatus;
use std::sync::LazyLock;

pub static DIFF_STATUS_SQL: LazyLock<String> =
    LazyLock::new(|| status_case(|status| format!("'{}'", status.as_str())));

pub static DIFF_RANK_SQL: LazyLock<String> =
    LazyLock::new(|| status_case(|status| status.sort_rank().to_string()));

/// `IN (...)` list of the labels that count as changes.
pub static CHANGE_LABELS_SQL: LazyLock<String> = LazyLock::new(|| {
    DiffStatus::ALL
        .iter()
        .filter(|status| status.is_change())
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
});

fn status_case(leaf: impl Fn(DiffStatus) -> String) -> String {
    let marker = FAILURE_MARKER.replace('\'', "''");
    let retry = "json_extract(ca.metadata, '$.test.retry')";
    let retries = "json_extract(ca.metadata, '$.test.retries')";
    format!(
        "CASE \
           WHEN d.compare_artifact_id IS NULL THEN {removed} \
           WHEN d.base_artifact_id IS NULL THEN \
             CASE \
               WHEN instr(ca.name, '{marker}') > 0 THEN \
                 CASE \
                   WHEN {retry} IS NOT NULL AND {retries} IS NOT NULL AND {retry} <> {retries} \
                     THEN {retry_failure} \
                   ELSE {failure} \
                 END \
               ELSE {added} \
             END \
           WHEN d.score IS NULL THEN {pending} \
           WHEN d.score > 0 THEN CASE WHEN d.ignored THEN {ignored} ELSE {changed} END \
           ELSE {unchanged} \
         END",
        removed = leaf(DiffStatus::Removed),
        retry_failure = leaf(DiffStatus::RetryFailure),
        failure = leaf(DiffStatus::Failure),
        added = leaf(DiffStatus::Added),
        pending = leaf(DiffStatus::Pending),
        ignored = leaf(DiffStatus::Ignored),
        changed = leaf(DiffStatus::Changed),
        unchanged = leaf(DiffStatus::Unchanged),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use crate::util::decode_enum;
    use proptest::prelude::*;
    use rusqlite::Connection;
    use sd_core::diff_status::{DiffStatusInput, derive_diff_status};
    use sd_core::types::{ArtifactId, ArtifactMetadata, TestMetadata};

    #[derive(Debug, Clone)]
    struct Row {
        compare: bool,
        base: bool,
        score: Option<f64>,
        ignored: bool,
        name: String,
        retry: Option<u32>,
        retries: Option<u32>,
    }

    fn metadata(row: &Row) -> Option<String> {
        if row.retry.is_none() && row.retries.is_none() {
            return None;
        }
        let metadata = ArtifactMetadata {
            test: Some(TestMetadata {
                retry: row.retry,
                retries: row.retries,
            }),
        };
        Some(serde_json::to_string(&metadata).unwrap())
    }

    fn evaluate(conn: &Connection, expression: &str, row: &Row) -> rusqlite::Result<String> {
        let sql = format!(
            "SELECT {expression} FROM \
             (SELECT ?1 AS compare_artifact_id, ?2 AS base_artifact_id, ?3 AS score, ?4 AS ignored) AS d, \
             (SELECT ?5 AS name, ?6 AS metadata) AS ca"
        );
        conn.query_row(
            &sql,
            rusqlite::params![
                row.compare.then_some("art_compare"),
                row.base.then_some("art_base"),
                row.score,
                row.ignored,
                row.name,
                metadata(row),
            ],
            |result| result.get::<_, rusqlite::types::Value>(0),
        )
        .map(|value| match value {
            rusqlite::types::Value::Text(text) => text,
            rusqlite::types::Value::Integer(rank) => rank.to_string(),
            other => format!("{other:?}"),
        })
    }

    fn derive(row: &Row) -> DiffStatus {
        let compare = ArtifactId::generate();
        let base = ArtifactId::generate();
        derive_diff_status(&DiffStatusInput {
            compare_artifact_id: row.compare.then_some(&compare),
            base_artifact_id: row.base.then_some(&base),
            score: row.score,
            ignored: row.ignored,
            name: &row.name,
            retry: row.retry,
            retries: row.retries,
        })
    }

    fn assert_same(conn: &Connection, row: &Row) {
        let expected = derive(row);
        let label = evaluate(conn, &DIFF_STATUS_SQL, row).unwrap();
        let label: DiffStatus = decode_enum(&label).unwrap();
        assert_eq!(label, expected, "label of {row:?}");
        let rank = evaluate(conn, &DIFF_RANK_SQL, row).unwrap();
        assert_eq!(rank, expected.sort_rank().to_string(), "rank of {row:?}");
    }

    const NAMES: [&str; 4] = [
        "home.png",
        "login -- fails (failed).png",
        "(failed).png",
        "it's (failed).png",
    ];
    const SCORES: [Option<f64>; 5] = [None, Some(0.0), Some(0.000_001), Some(0.5), Some(1.0)];
    const ATTEMPTS: [Option<u32>; 3] = [None, Some(0), Some(2)];

    #[test]
    fn every_discrete_combination_agrees() {
        let conn = with_test_db().unwrap();
        let mut checked = 0;
        for compare in [false, true] {
            for base in [false, true] {
                for score in SCORES {
                    for ignored in [false, true] {
                        for name in NAMES {
                            for retry in ATTEMPTS {
                                for retries in ATTEMPTS {
                                    let row = Row {
                                        compare,
                                        base,
                                        score,
                                        ignored,
                                        name: name.to_string(),
                                        retry,
                                        retries,
                                    };
                                    assert_same(&conn, &row);
                                    checked += 1;
                                }
                            }
                        }
                    }
                }
            }
        }
        assert_eq!(checked, 2 * 2 * 5 * 2 * 4 * 3 * 3);
    }

    #[test]
    fn change_labels_are_the_conclusion_labels() {
        assert_eq!(*CHANGE_LABELS_SQL, "'removed', 'added', 'changed'");
    }

    fn arb_row() -> impl Strategy<Value = Row> {
        let name = prop_oneof![
            "[a-z ]{0,12}".prop_map(|name| format!("{name}.png")),
            "[a-z ]{0,12}".prop_map(|name| format!("{name} (failed).png")),
            proptest::sample::select(NAMES.to_vec()).prop_map(str::to_string),
        ];
        let score = prop_oneof![Just(None), Just(Some(0.0)), (0.0..=1.0f64).prop_map(Some)];
        (
            any::<bool>(),
            any::<bool>(),
            score,
            any::<bool>(),
            name,
            proptest::option::of(0u32..4),
            proptest::option::of(0u32..4),
        )
            .prop_map(|(compare, base, score, ignored, name, retry, retries)| Row {
                compare,
                base,
                score,
                ignored,
                name,
                retry,
                retries,
            })
    }

    proptest! {
        #[test]
        fn query_form_matches_pure_derivation(row in arb_row()) {
            let conn = with_test_db().unwrap();
            let label = evaluate(&conn, &DIFF_STATUS_SQL, &row).unwrap();
            let label: DiffStatus = decode_enum(&label).unwrap();
            prop_assert_eq!(label, derive(&row));
        }
    }
}
