mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{error_code, id_of, TestApp, ADMIN, DESIGNER, QA};
use kct_server::curriculum::MAX_ACTIVITY_MINUTES;

#[tokio::test]
async fn test_end_to_end_scenario() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "TEST-1").await;

    let (status, report) = app
        .get(&format!("/api/v1/units/{}/completeness", tree.unit_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["unit_id"], tree.unit_id.as_str());
    assert_eq!(report["score"], 100);
    assert_eq!(report["checklist"].as_array().unwrap().len(), 6);

    let (status, _) = app
        .delete(&format!("/api/v1/kct/{}", tree.framework_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .get(&format!("/api/v1/kct/{}", tree.framework_id), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    // Descendants go with it
    let (status, _) = app.get(&format!("/api/v1/units/{}", tree.unit_id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get(&format!("/api/v1/versions/{}", tree.version_id), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_framework_code_conflict_and_reuse() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;

    let (status, first) = app
        .post("/api/v1/kct", &token, json!({ "code": "DUP-1", "name": "First", "language": "en" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, fetched) = app.get(&format!("/api/v1/kct/{}", id_of(&first)), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["code"], "DUP-1");
    assert_eq!(fetched["language"], "en");
    assert_eq!(fetched["status"], "draft");

    let (status, body) = app
        .post("/api/v1/kct", &token, json!({ "code": "DUP-1", "name": "Second" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    app.delete(&format!("/api/v1/kct/{}", id_of(&first)), &token).await;
    let (status, _) = app
        .post("/api/v1/kct", &token, json!({ "code": "DUP-1", "name": "Third" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_framework_validation() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;

    let (status, _) = app.post("/api/v1/kct", &token, json!({ "code": "", "name": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/v1/kct", &token, json!({ "code": "NEG", "name": "x", "total_hours": -1.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_framework_patch_keeps_other_fields() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let (_, created) = app
        .post(
            "/api/v1/kct",
            &token,
            json!({ "code": "P-1", "name": "Before", "description": "Keep me", "total_hours": 40.0 }),
        )
        .await;
    let id = id_of(&created);

    let (status, updated) = app
        .patch(&format!("/api/v1/kct/{}", id), &token, json!({ "name": "After" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "After");
    assert_eq!(updated["code"], "P-1");
    assert_eq!(updated["description"], "Keep me");
    assert_eq!(updated["total_hours"], 40.0);

    app.post("/api/v1/kct", &token, json!({ "code": "P-2", "name": "Other" })).await;
    let (status, _) = app
        .patch(&format!("/api/v1/kct/{}", id), &token, json!({ "code": "P-2" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_framework_pagination_and_filters() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    for i in 0..5 {
        let language = if i % 2 == 0 { "en" } else { "vi" };
        app.post(
            "/api/v1/kct",
            &token,
            json!({ "code": format!("PG-{}", i), "name": format!("Paged {}", i), "language": language }),
        )
        .await;
    }

    let (status, page) = app.get("/api/v1/kct?page=2&page_size=2", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["page"], 2);
    assert_eq!(page["page_size"], 2);
    assert_eq!(page["total"], 5);
    assert_eq!(page["total_pages"], 3);

    let (_, last) = app.get("/api/v1/kct?page=3&page_size=2", &token).await;
    assert_eq!(last["data"].as_array().unwrap().len(), 1);

    // Oversized pages are clamped
    let (_, clamped) = app.get("/api/v1/kct?page_size=1000", &token).await;
    assert_eq!(clamped["page_size"], 100);

    let (_, english) = app.get("/api/v1/kct?language=en", &token).await;
    assert_eq!(english["total"], 3);

    let (status, _) = app.get("/api/v1/kct?page=abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_course_reorder_is_atomic() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "R-1").await;
    let courses_uri = format!("/api/v1/versions/{}/courses", tree.version_id);

    for title in ["Travel", "Food"] {
        let (status, _) = app.post(&courses_uri, &token, json!({ "title": title })).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, listed) = app.get(&courses_uri, &token).await;
    let ids: Vec<String> = listed["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(id_of)
        .collect();
    assert_eq!(ids.len(), 3);

    // Duplicate index: rejected, nothing changes
    let (status, _) = app
        .post(
            "/api/v1/courses/reorder",
            &token,
            json!({ "orders": [
                { "id": ids[0], "order_index": 0 },
                { "id": ids[1], "order_index": 0 },
                { "id": ids[2], "order_index": 1 }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing an item: rejected
    let (status, _) = app
        .post(
            "/api/v1/courses/reorder",
            &token,
            json!({ "orders": [{ "id": ids[0], "order_index": 1 }, { "id": ids[1], "order_index": 0 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = app.get(&courses_uri, &token).await;
    let titles: Vec<&str> = unchanged["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Basics", "Travel", "Food"]);

    let (status, reordered) = app
        .post(
            "/api/v1/courses/reorder",
            &token,
            json!({ "orders": [
                { "id": ids[0], "order_index": 2 },
                { "id": ids[1], "order_index": 1 },
                { "id": ids[2], "order_index": 0 }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = reordered["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Food", "Travel", "Basics"]);

    // Deleting compacts the remaining indices
    let (status, _) = app.delete(&format!("/api/v1/courses/{}", ids[1]), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = app.get(&courses_uri, &token).await;
    let indices: Vec<i64> = after["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["order_index"].as_i64().unwrap())
        .collect();
    assert_eq!(indices, vec![0, 1]);
}

#[tokio::test]
async fn test_version_workflow() {
    let app = TestApp::new();
    let admin = app.login(ADMIN).await;
    let designer = app.login(DESIGNER).await;
    let qa = app.login(QA).await;
    let tree = app.seed_tree(&designer, "WF-1").await;
    let version_uri = format!("/api/v1/versions/{}", tree.version_id);

    // Publishing a draft is not a valid transition
    let (status, body) = app.post(&format!("{}/publish", version_uri), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "INVALID_STATE_TRANSITION");

    let (status, submitted) = app.post(&format!("{}/submit", version_uri), &designer, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["state"], "submitted");

    // Content is frozen outside draft
    let (status, body) = app
        .patch(&format!("/api/v1/units/{}", tree.unit_id), &designer, json!({ "hours": 2.0 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "VERSION_NOT_EDITABLE");

    let (status, _) = app
        .post(&format!("{}/approve", version_uri), &designer, json!({ "decision": "approved" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = app
        .post(
            &format!("{}/approve", version_uri),
            &qa,
            json!({ "decision": "approved", "comments": "Looks good" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["state"], "approved");

    let (_, framework) = app.get(&format!("/api/v1/kct/{}", tree.framework_id), &admin).await;
    assert_eq!(framework["status"], "approved");

    let (status, _) = app.post(&format!("{}/publish", version_uri), &qa, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, published) = app
        .post(
            &format!("{}/publish", version_uri),
            &admin,
            json!({ "rollout_notes": "Term 1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["state"], "published");
    assert_eq!(published["rollout_notes"], "Term 1");

    let (_, framework) = app.get(&format!("/api/v1/kct/{}", tree.framework_id), &admin).await;
    assert_eq!(framework["status"], "published");

    let (_, approvals) = app
        .get(&format!("/api/v1/approvals/versions/{}/approvals", tree.version_id), &admin)
        .await;
    let actions: Vec<&str> = approvals["approvals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["submit", "approve", "publish"]);
    assert_eq!(approvals["approvals"][1]["decision"], "approved");
    assert_eq!(approvals["approvals"][1]["comments"], "Looks good");

    let (status, history) = app
        .get(&format!("/api/v1/kct/{}/versions/history", tree.framework_id), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["history"].as_array().unwrap().len(), 3);
    assert_eq!(history["history"][0]["action"], "publish");

    let (status, stats) = app
        .get(&format!("/api/v1/kct/{}/versions/stats", tree.framework_id), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_versions"], 1);
    assert_eq!(stats["published_version"]["id"], tree.version_id.as_str());
    assert_eq!(stats["total_courses"], 1);
    assert_eq!(stats["total_units"], 1);
    assert_eq!(stats["total_hours"], 10.0);

    // DELETE archives
    let (status, archived) = app.delete(&version_uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["state"], "archived");
    let (status, _) = app.post(&format!("{}/submit", version_uri), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rejection_returns_to_draft() {
    let app = TestApp::new();
    let admin = app.login(ADMIN).await;
    let tree = app.seed_tree(&admin, "WF-2").await;
    let version_uri = format!("/api/v1/versions/{}", tree.version_id);

    app.post(&format!("{}/submit", version_uri), &admin, json!({})).await;
    let (status, version) = app
        .post(
            &format!("{}/approve", version_uri),
            &admin,
            json!({ "decision": "changes_requested", "comments": "Add objectives" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version["state"], "draft");

    let (status, _) = app
        .post(&format!("{}/approve", version_uri), &admin, json!({ "decision": "maybe" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Drive a draft version through submit, approve and publish
async fn publish(app: &TestApp, token: &str, version_id: &str) {
    let uri = format!("/api/v1/versions/{}", version_id);
    app.post(&format!("{}/submit", uri), token, json!({})).await;
    app.post(&format!("{}/approve", uri), token, json!({ "decision": "approved" }))
        .await;
    let (status, body) = app.post(&format!("{}/publish", uri), token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_publishing_supersedes_previous_version() {
    let app = TestApp::new();
    let admin = app.login(ADMIN).await;
    let tree = app.seed_tree(&admin, "SUP-1").await;

    publish(&app, &admin, &tree.version_id).await;

    let (status, v2) = app
        .post(
            &format!("/api/v1/kct/{}/versions", tree.framework_id),
            &admin,
            json!({ "version_no": "v2.0", "copy_from_version_id": tree.version_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let v2_id = id_of(&v2);

    // The copy carries the content
    let (_, courses) = app.get(&format!("/api/v1/versions/{}/courses", v2_id), &admin).await;
    assert_eq!(courses["courses"].as_array().unwrap().len(), 1);

    publish(&app, &admin, &v2_id).await;

    let (_, v1) = app.get(&format!("/api/v1/versions/{}", tree.version_id), &admin).await;
    assert_eq!(v1["state"], "archived");

    let (_, listed) = app
        .get(&format!("/api/v1/kct/{}/versions", tree.framework_id), &admin)
        .await;
    let states: Vec<&str> = listed["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["state"].as_str().unwrap())
        .collect();
    assert_eq!(states, vec!["archived", "published"]);

    let (status, _) = app
        .post(
            &format!("/api/v1/kct/{}/versions", tree.framework_id),
            &admin,
            json!({ "version_no": "v2.0" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_compare_versions() {
    let app = TestApp::new();
    let admin = app.login(ADMIN).await;
    let tree = app.seed_tree(&admin, "CMP-1").await;

    let (_, v2) = app
        .post(
            &format!("/api/v1/kct/{}/versions", tree.framework_id),
            &admin,
            json!({ "version_no": "v2.0", "copy_from_version_id": tree.version_id }),
        )
        .await;
    let v2_id = id_of(&v2);

    let (_, courses) = app.get(&format!("/api/v1/versions/{}/courses", v2_id), &admin).await;
    let course_id = id_of(&courses["courses"][0]);
    let (_, units) = app.get(&format!("/api/v1/courses/{}/units", course_id), &admin).await;
    let unit_id = id_of(&units["units"][0]);

    app.patch(&format!("/api/v1/units/{}", unit_id), &admin, json!({ "hours": 2.0 }))
        .await;
    app.post(&format!("/api/v1/versions/{}/courses", v2_id), &admin, json!({ "title": "Extra" }))
        .await;

    let (status, diff) = app
        .get(
            &format!("/api/v1/versions/compare?base={}&compare={}", tree.version_id, v2_id),
            &admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(diff["base"]["id"], tree.version_id.as_str());
    assert_eq!(diff["summary"]["courses_added"], 1);
    assert_eq!(diff["summary"]["units_modified"], 1);
    assert_eq!(diff["summary"]["total_changes"], 2);
    assert_eq!(diff["units"]["modified"][0]["changes"][0]["field"], "hours");

    let (status, _) = app
        .get(&format!("/api/v1/versions/compare?base={}&compare=missing", tree.version_id), &admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/versions/compare", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unit_duplicate_split_and_derived_reads() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "U-1").await;
    let unit_uri = format!("/api/v1/units/{}", tree.unit_id);

    let (status, copy) = app.post(&format!("{}/duplicate", unit_uri), &token, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["title"], "Greetings (copy)");
    assert_eq!(copy["order_index"], 1);
    assert_eq!(copy["objectives"], json!(["Greet a classmate"]));

    // A unit with one activity cannot be split
    let (status, _) = app
        .post(&format!("{}/split", unit_uri), &token, json!({ "split_after_order_index": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.patch(
        &unit_uri,
        &token,
        json!({ "activities": [
            { "type": "drill", "title": "Hello chain", "duration_minutes": 30 },
            { "type": "game", "title": "Name bingo", "duration_minutes": 30 }
        ]}),
    )
    .await;
    let (status, split) = app
        .post(
            &format!("{}/split", unit_uri),
            &token,
            json!({ "split_after_order_index": 0, "new_title": "Greetings II" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(split["source"]["activities"].as_array().unwrap().len(), 1);
    assert_eq!(split["source"]["hours"], 0.5);
    assert_eq!(split["new_unit"]["title"], "Greetings II");
    assert_eq!(split["new_unit"]["hours"], 0.5);
    assert_eq!(split["new_unit"]["order_index"], 1);

    // The copy moved down to make room
    let (_, units) = app.get(&format!("/api/v1/courses/{}/units", tree.course_id), &token).await;
    let titles: Vec<&str> = units["units"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Greetings", "Greetings II", "Greetings (copy)"]);

    let (status, outcomes) = app.get(&format!("{}/learning-outcomes", unit_uri), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes["learning_outcomes"][0]["objective"], "Greet a classmate");
    assert_eq!(outcomes["learning_outcomes"][0]["skills"], json!(["speaking"]));

    let (status, report) = app.post(&format!("{}/validate", unit_uri), &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);
    assert!(report["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_reports_errors() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "V-1").await;

    let (status, bare) = app
        .post(&format!("/api/v1/courses/{}/units", tree.course_id), &token, json!({ "title": "Bare" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bare["completeness_score"], 10);

    let (status, report) = app
        .post(&format!("/api/v1/units/{}/validate", id_of(&bare)), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], false);
    assert_eq!(report["errors"].as_array().unwrap().len(), 2);

    let (_, completeness) = app
        .get(&format!("/api/v1/units/{}/completeness", id_of(&bare)), &token)
        .await;
    assert_eq!(completeness["score"], 10);
    assert!(completeness["missing"].as_array().unwrap().contains(&json!("objectives")));
}

#[tokio::test]
async fn test_templates_and_template_based_units() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "T-1").await;

    let (status, listed) = app.get("/api/v1/units/templates", &token).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = listed["templates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"standard-lesson"));

    let (status, unit) = app
        .post(
            &format!("/api/v1/courses/{}/units", tree.course_id),
            &token,
            json!({ "title": "From template", "template_id": "standard-lesson" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(unit["title"], "From template");
    assert!(!unit["activities"].as_array().unwrap().is_empty());

    let (status, _) = app
        .post(
            &format!("/api/v1/courses/{}/units", tree.course_id),
            &token,
            json!({ "title": "Nope", "template_id": "no-such-template" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_update_applies_all_or_nothing() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "B-1").await;
    let (_, second) = app
        .post(&format!("/api/v1/courses/{}/units", tree.course_id), &token, json!({ "title": "Second" }))
        .await;
    let second_id = id_of(&second);

    let (status, _) = app
        .post(
            "/api/v1/units/bulk-update",
            &token,
            json!({ "updates": [
                { "id": tree.unit_id, "hours": 3.0 },
                { "id": second_id, "difficulty_level": "impossible" }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, first) = app.get(&format!("/api/v1/units/{}", tree.unit_id), &token).await;
    assert_eq!(first["hours"], 1.0);

    let (status, result) = app
        .post(
            "/api/v1/units/bulk-update",
            &token,
            json!({ "updates": [
                { "id": tree.unit_id, "hours": 3.0 },
                { "id": second_id, "difficulty_level": "advanced" }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["updated"], 2);
    assert_eq!(result["units"][0]["hours"], 3.0);
    assert_eq!(result["units"][1]["difficulty_level"], "advanced");

    let (status, _) = app
        .post("/api/v1/units/bulk-update", &token, json!({ "updates": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A misspelled field fails the whole batch
    let (status, body) = app
        .post(
            "/api/v1/units/bulk-update",
            &token,
            json!({ "updates": [
                { "id": tree.unit_id, "hours": 4.0 },
                { "id": second_id, "titel": "Typo" }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    let (_, first) = app.get(&format!("/api/v1/units/{}", tree.unit_id), &token).await;
    assert_eq!(first["hours"], 3.0);

    let (status, _) = app
        .patch(
            &format!("/api/v1/units/{}", tree.unit_id),
            &token,
            json!({ "activities": [{ "type": "drill", "title": "Forever", "duration_minutes": MAX_ACTIVITY_MINUTES + 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unit_reorder_is_atomic() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "UR-1").await;
    let units_uri = format!("/api/v1/courses/{}/units", tree.course_id);
    for title in ["Numbers", "Colours"] {
        let (status, _) = app.post(&units_uri, &token, json!({ "title": title })).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, listed) = app.get(&units_uri, &token).await;
    let ids: Vec<String> = listed["units"].as_array().unwrap().iter().map(id_of).collect();

    let titles = |body: &serde_json::Value| -> Vec<String> {
        body["units"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["title"].as_str().unwrap().to_string())
            .collect()
    };

    let (status, _) = app
        .post(
            "/api/v1/units/reorder",
            &token,
            json!({ "orders": [
                { "id": ids[0], "order_index": 1 },
                { "id": ids[1], "order_index": 1 },
                { "id": ids[2], "order_index": 0 }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(
            "/api/v1/units/reorder",
            &token,
            json!({ "orders": [{ "id": ids[2], "order_index": 0 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = app.get(&units_uri, &token).await;
    assert_eq!(titles(&unchanged), vec!["Greetings", "Numbers", "Colours"]);

    let (status, reordered) = app
        .post(
            "/api/v1/units/reorder",
            &token,
            json!({ "orders": [
                { "id": ids[0], "order_index": 2 },
                { "id": ids[1], "order_index": 0 },
                { "id": ids[2], "order_index": 1 }
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&reordered), vec!["Numbers", "Colours", "Greetings"]);
}

#[tokio::test]
async fn test_tenants_cannot_see_each_other() {
    let app = TestApp::new();
    let admin = app.login(ADMIN).await;
    let tree = app.seed_tree(&admin, "ISO-1").await;
    let outsider = app.seed_other_tenant().await;

    for uri in [
        format!("/api/v1/kct/{}", tree.framework_id),
        format!("/api/v1/versions/{}", tree.version_id),
        format!("/api/v1/courses/{}", tree.course_id),
        format!("/api/v1/units/{}", tree.unit_id),
    ] {
        let (status, body) = app.get(&uri, &outsider).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(error_code(&body), "NOT_FOUND");
    }

    let (status, _) = app
        .patch(&format!("/api/v1/units/{}", tree.unit_id), &outsider, json!({ "hours": 9.0 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = app.get("/api/v1/kct", &outsider).await;
    assert_eq!(listed["total"], 0);

    // Codes are unique per tenant only
    let (status, _) = app
        .post("/api/v1/kct", &outsider, json!({ "code": "ISO-1", "name": "Same code" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_ai_suggestions() {
    let app = TestApp::new();
    let token = app.login(ADMIN).await;
    let tree = app.seed_tree(&token, "AI-1").await;

    let (_, bare) = app
        .post(&format!("/api/v1/courses/{}/units", tree.course_id), &token, json!({ "title": "Weather" }))
        .await;
    let (status, suggestions) = app
        .post(&format!("/api/v1/units/{}/ai-suggestions", id_of(&bare)), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suggestions["provider"], "rule-based");
    assert!(!suggestions["objectives"].as_array().unwrap().is_empty());
    assert!(!suggestions["activities"].as_array().unwrap().is_empty());
    assert_eq!(suggestions["difficulty_level"], "beginner");

    let (status, _) = app
        .post("/api/v1/units/missing/ai-suggestions", &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_resources_and_mappings() {
    let app = TestApp::new();
    let admin = app.login(ADMIN).await;
    let teacher = app.login(common::TEACHER).await;
    let tree = app.seed_tree(&admin, "CM-1").await;
    let comments_uri = format!("/api/v1/comments/entities/units/{}/comments", tree.unit_id);

    // Teachers may comment
    let (status, root) = app.post(&comments_uri, &teacher, json!({ "body": "Too long?" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(root["entity_type"], "unit");

    let (status, reply) = app
        .post(&comments_uri, &admin, json!({ "body": "Trimmed", "parent_id": id_of(&root) }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["parent_id"], id_of(&root).as_str());

    let (status, _) = app
        .post(&comments_uri, &admin, json!({ "body": "Orphan", "parent_id": "nope" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/v1/comments/entities/lessons/{}/comments", tree.unit_id), &admin)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = app.get(&comments_uri, &admin).await;
    assert_eq!(listed["comments"].as_array().unwrap().len(), 2);

    let resources_uri = format!("/api/v1/resources/units/{}/resources", tree.unit_id);
    let (status, _) = app
        .post(&resources_uri, &teacher, json!({ "title": "Slides" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, resource) = app
        .post(
            &resources_uri,
            &admin,
            json!({ "title": "Slides", "resource_type": "link", "url": "https://example.com/slides" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resource["resource_type"], "link");
    let (_, resources) = app.get(&resources_uri, &teacher).await;
    assert_eq!(resources["resources"].as_array().unwrap().len(), 1);

    let (status, mapping) = app
        .post(
            "/api/v1/mappings",
            &admin,
            json!({ "entity_type": "unit", "entity_id": tree.unit_id, "standard": "CEFR", "external_code": "A1.1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mapping["framework_id"], tree.framework_id.as_str());

    let (status, _) = app
        .post(
            "/api/v1/mappings",
            &admin,
            json!({ "entity_type": "unit", "entity_id": tree.unit_id, "standard": "CEFR", "external_code": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, by_framework) = app
        .get(&format!("/api/v1/kct/mappings?framework_id={}", tree.framework_id), &admin)
        .await;
    assert_eq!(by_framework["mappings"].as_array().unwrap().len(), 1);
    let (_, all) = app.get("/api/v1/mappings", &admin).await;
    assert_eq!(all["mappings"][0]["external_code"], "A1.1");
}
