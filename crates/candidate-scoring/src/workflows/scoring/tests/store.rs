use super::common::*;

use crate::workflows::scoring::repository::{
    rank_results, ResultStore, ScoreQuery, DEFAULT_QUERY_LIMIT,
};

fn fifteen_results() -> MemoryResults {
    let store = MemoryResults::default();
    for hour in 0..15u32 {
        let candidate = if hour % 3 == 0 { "cand-special" } else { "cand-1" };
        store.insert(stored_result(&format!("app-{hour:02}"), candidate, hour));
    }
    store
}

#[tokio::test]
async fn query_returns_newest_first_within_limit() {
    let store = fifteen_results();
    let query = ScoreQuery {
        limit: 10,
        ..ScoreQuery::for_workspace(WORKSPACE)
    };

    let results = store.query(&query).await.expect("query succeeds");

    assert_eq!(results.len(), 10);
    assert_eq!(results[0].application_id, "app-14");
    assert!(results
        .windows(2)
        .all(|pair| pair[0].scored_at >= pair[1].scored_at));
}

#[tokio::test]
async fn query_filters_by_candidate_and_vacancy() {
    let store = fifteen_results();
    let query = ScoreQuery {
        candidate_id: Some("cand-special".to_string()),
        vacancy_id: Some("vac-1".to_string()),
        ..ScoreQuery::for_workspace(WORKSPACE)
    };

    let results = store.query(&query).await.expect("query succeeds");

    let ids: Vec<_> = results.iter().map(|r| r.application_id.as_str()).collect();
    assert_eq!(ids, ["app-12", "app-09", "app-06", "app-03", "app-00"]);

    let other_vacancy = ScoreQuery {
        vacancy_id: Some("vac-2".to_string()),
        ..ScoreQuery::for_workspace(WORKSPACE)
    };
    assert!(store
        .query(&other_vacancy)
        .await
        .expect("query succeeds")
        .is_empty());
}

#[tokio::test]
async fn saving_twice_keeps_one_document() {
    let store = MemoryResults::default();
    let first = stored_result("app-1", "cand-1", 8);
    let mut second = stored_result("app-1", "cand-1", 9);
    second.reasoning = "Updated after new intake notes.".to_string();

    let first_id = store.save(&first).await.expect("first save");
    let second_id = store.save(&second).await.expect("second save");

    assert_eq!(first_id, second_id);
    assert_eq!(store.len(), 1);
    let stored = store.get(WORKSPACE, "app-1").await.expect("stored");
    assert_eq!(stored.reasoning, "Updated after new intake notes.");
}

#[test]
fn ranking_ignores_other_workspaces() {
    let mut foreign = stored_result("app-x", "cand-1", 23);
    foreign.workspace_id = "ws-other".to_string();
    let local = stored_result("app-1", "cand-1", 1);

    let ranked = rank_results(&ScoreQuery::for_workspace(WORKSPACE), [&foreign, &local]);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].application_id, "app-1");
}

#[test]
fn query_limit_defaults_and_bounds() {
    let parsed: ScoreQuery =
        serde_json::from_value(serde_json::json!({ "workspace_id": WORKSPACE }))
            .expect("query parses");
    assert_eq!(parsed.limit, DEFAULT_QUERY_LIMIT);
    assert!(parsed.limit_in_range());

    for (limit, expected) in [(0, false), (1, true), (200, true), (201, false)] {
        let query = ScoreQuery {
            limit,
            ..ScoreQuery::for_workspace(WORKSPACE)
        };
        assert_eq!(query.limit_in_range(), expected, "limit {limit}");
    }
}

#[test]
fn stored_scores_reject_out_of_range_values() {
    let mut raw = serde_json::to_value(stored_result("app-1", "cand-1", 1)).expect("serializes");
    raw["score"] = serde_json::json!(101);
    assert!(serde_json::from_value::<crate::workflows::scoring::ScoringResult>(raw.clone()).is_err());
    raw["score"] = serde_json::json!(-1);
    assert!(serde_json::from_value::<crate::workflows::scoring::ScoringResult>(raw).is_err());
}
