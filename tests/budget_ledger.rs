
use axum::http::StatusCode;
use serde_json::json;
use test_support::{app, error_code, request, request_ok};

#[tokio::test]
async fn entries_roll_up_into_summary() {
    let app = app();
    for body in [
        json!({ "type": "income", "category": "Scholarship", "amount": 500 }),
        json!({ "type": "expense", "category": "Books", "amount": 120.5, "date": "2025-09-02" }),
        json!({ "type": "Expense", "category": "Coffee", "amount": 9.5, "note": "exam week" }),
    ] {
        request_ok(&app.router, "POST", "/budget", Some(body)).await;
    }

    let listed = request_ok(&app.router, "GET", "/budget", None).await;
    let entries = listed.as_array().expect("entries");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2]["type"], "expense");
    assert_eq!(entries[2]["note"], "exam week");

    let summary = request_ok(&app.router, "GET", "/budget/summary", None).await;
    assert_eq!(summary["income"], 500.0);
    assert_eq!(summary["expense"], 130.0);
    assert_eq!(summary["balance"], 370.0);
    assert_eq!(summary["count"], 3);
}

#[tokio::test]
async fn invalid_entries_are_rejected() {
    let app = app();
    for body in [
        json!({ "category": "Books", "amount": 10 }),
        json!({ "type": "gift", "category": "Books", "amount": 10 }),
        json!({ "type": "expense", "amount": 10 }),
        json!({ "type": "expense", "category": "Books" }),
        json!({ "type": "expense", "category": "Books", "amount": -4 }),
        json!({ "type": "expense", "category": "Books", "amount": "ten" }),
        json!({ "type": "expense", "category": "Books", "amount": 1, "date": "tomorrow" }),
    ] {
        let (status, resp) = request(&app.router, "POST", "/budget", Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(error_code(&resp), Some("bad_params"));
    }
    let listed = request_ok(&app.router, "GET", "/budget", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn update_replaces_and_delete_removes() {
    let app = app();
    let created = request_ok(
        &app.router,
        "POST",
        "/budget",
        Some(json!({ "type": "expense", "category": "Rent", "amount": 800 })),
    )
    .await;
    let id = created["_id"].as_str().expect("_id").to_string();

    let updated = request_ok(
        &app.router,
        "PUT",
        &format!("/budget/{id}"),
        Some(json!({ "type": "expense", "category": "Rent", "amount": 750 })),
    )
    .await;
    assert_eq!(updated["amount"], 750.0);
    assert_eq!(updated["_id"], id.as_str());

    let fetched = request_ok(&app.router, "GET", &format!("/budget/{id}"), None).await;
    assert_eq!(fetched, updated);

    request_ok(&app.router, "DELETE", &format!("/budget/{id}"), None).await;
    let (status, resp) = request(&app.router, "DELETE", &format!("/budget/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&resp), Some("not_found"));
    let (status, _) = request(&app.router, "GET", &format!("/budget/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app.router,
        "PUT",
        "/budget/not-a-uuid",
        Some(json!({ "type": "expense", "category": "Rent", "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
