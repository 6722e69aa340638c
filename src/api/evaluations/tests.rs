use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::db::types::UserRole;
use crate::repositories;
use crate::services::evaluation_review::ReviewAction;
use crate::services::grading::{GradeOutcome, GradeRequest, Grader, GradingError};
use crate::services::mock_grading::MockGrader;
use crate::test_support::{self, MultipartFile};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nanswer-sheet";

async fn send(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("request");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn create_evaluation(app: &Router, token: &str, mode: &str, total_marks: f64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/evaluations",
        token,
        Some(json!({"title": "  Algebra midterm ", "total_marks": total_marks, "mode": mode})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create: {body}");
    assert_eq!(body["title"], "Algebra midterm");
    assert_eq!(body["status"], "draft");
    body["id"].as_str().expect("id").to_string()
}

async fn upload(
    app: &Router,
    token: &str,
    evaluation_id: &str,
    filenames: &[&str],
    fields: &[(&str, &str)],
) -> (StatusCode, Value) {
    let files: Vec<MultipartFile<'_>> = filenames
        .iter()
        .map(|filename| MultipartFile { field: "files", filename, content_type: "image/png", bytes: PNG })
        .collect();
    let response = app
        .clone()
        .oneshot(test_support::multipart_request(
            &format!("/api/v1/evaluations/{evaluation_id}/answer-sheets"),
            token,
            &files,
            fields,
        ))
        .await
        .expect("upload");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn upload_paper(app: &Router, token: &str, evaluation_id: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_support::multipart_request(
            &format!("/api/v1/evaluations/{evaluation_id}/question-paper"),
            token,
            &[MultipartFile {
                field: "file",
                filename: "paper.pdf",
                content_type: "application/pdf",
                bytes: b"%PDF-1.4 questions",
            }],
            &[],
        ))
        .await
        .expect("question paper");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

fn record_id(evaluation: &Value, index: usize) -> String {
    evaluation["records"][index]["id"].as_str().expect("record id").to_string()
}

#[tokio::test]
async fn bulk_evaluation_goes_from_upload_to_finalized() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let app = &ctx.app;

    let id = create_evaluation(app, &token, "bulk", 100.0).await;

    let (status, uploaded) =
        upload(app, &token, &id, &["ada_lovelace.png", "alan-turing.png", "grace_hopper.png"], &[]).await;
    assert_eq!(status, StatusCode::CREATED, "upload: {uploaded}");
    assert_eq!(uploaded["total_sheets"], 3);
    assert_eq!(uploaded["sheets"][0]["student_name"], "Ada Lovelace");
    assert_eq!(uploaded["sheets"][1]["roll_number"], "R002");
    assert!(uploaded["sheets"][2]["preview_data_url"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let (status, run) = send(app, Method::POST, &format!("/api/v1/evaluations/{id}/grade"), &token, None).await;
    assert_eq!(status, StatusCode::OK, "grade: {run}");
    assert_eq!(run["grader"], "mock");
    assert_eq!(run["graded"], 3);
    assert!(run["failed"].as_array().unwrap().is_empty());
    let evaluation = &run["evaluation"];
    assert_eq!(evaluation["status"], "in_review");
    assert_eq!(evaluation["grading_progress"], 100);
    assert_eq!(evaluation["records"].as_array().unwrap().len(), 3);
    for record in evaluation["records"].as_array().unwrap() {
        let breakdown = record["breakdown"].as_array().unwrap();
        assert_eq!(breakdown.len(), 3);
        let score = record["score"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&score));
        assert_eq!(record["status"], "pending");
    }

    let (status, again) = send(app, Method::POST, &format!("/api/v1/evaluations/{id}/grade"), &token, None).await;
    assert_eq!(status, StatusCode::CONFLICT, "regrade: {again}");

    let (status, paper) = upload_paper(app, &token, &id).await;
    assert_eq!(status, StatusCode::CONFLICT, "paper after grading: {paper}");
    let (status, _) = upload(app, &token, &id, &["after_grading.png"], &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let first = record_id(evaluation, 0);
    let second = record_id(evaluation, 1);
    let third = record_id(evaluation, 2);
    for (record, action) in [(&first, "approve"), (&second, "approve"), (&third, "revise")] {
        let (status, body) = send(
            app,
            Method::POST,
            &format!("/api/v1/evaluations/{id}/records/{record}/{action}"),
            &token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{action}: {body}");
    }

    let (status, current) = send(app, Method::GET, &format!("/api/v1/evaluations/{id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["summary"]["progress_label"], "2/3");
    assert_eq!(current["summary"]["needs_revision"], 1);
    assert_eq!(current["records"][0]["reviewed_by"], teacher.id.as_str());

    let (status, refused) =
        send(app, Method::POST, &format!("/api/v1/evaluations/{id}/finalize"), &token, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT, "finalize without confirm: {refused}");

    let (status, finalized) = send(
        app,
        Method::POST,
        &format!("/api/v1/evaluations/{id}/finalize"),
        &token,
        Some(json!({"confirm_unreviewed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "finalize: {finalized}");
    assert_eq!(finalized["status"], "finalized");
    assert_eq!(finalized["finalized_by"], teacher.id.as_str());

    let (status, _) = send(
        app,
        Method::POST,
        &format!("/api/v1/evaluations/{id}/records/{third}/approve"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = upload(app, &token, &id, &["late.png"], &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let unread = repositories::notifications::count_unread(ctx.state.db(), &teacher.id)
        .await
        .expect("unread");
    assert_eq!(unread, 1);
    let notices = repositories::notifications::list_for_user(ctx.state.db(), &teacher.id, true, 0, 10)
        .await
        .expect("notifications");
    assert_eq!(notices[0].message, "Evaluation finalized: 2/3 approved");
    assert_eq!(notices[0].title, "Algebra midterm");
    assert_eq!(notices[0].action_url.as_deref(), Some(format!("/evaluations/{id}").as_str()));
}

#[tokio::test]
async fn single_mode_takes_one_sheet_with_explicit_identity() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let app = &ctx.app;

    let id = create_evaluation(app, &token, "single", 20.0).await;

    let (status, _) = send(app, Method::POST, &format!("/api/v1/evaluations/{id}/grade"), &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = upload(app, &token, &id, &["a.png", "b.png"], &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, uploaded) = upload(
        app,
        &token,
        &id,
        &["scan001.png"],
        &[("student_name", "Emmy Noether"), ("roll_number", "MATH-7")],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "upload: {uploaded}");
    assert_eq!(uploaded["sheets"][0]["student_name"], "Emmy Noether");
    assert_eq!(uploaded["sheets"][0]["roll_number"], "MATH-7");

    let (status, _) = upload(app, &token, &id, &["second.png"], &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listing) =
        send(app, Method::GET, &format!("/api/v1/evaluations/{id}/answer-sheets"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["sheets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn uploads_reject_disallowed_types() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let id = create_evaluation(&ctx.app, &token, "bulk", 10.0).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::multipart_request(
            &format!("/api/v1/evaluations/{id}/answer-sheets"),
            &token,
            &[MultipartFile { field: "files", filename: "notes.txt", content_type: "text/plain", bytes: b"hi" }],
            &[],
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, paper) = upload_paper(&ctx.app, &token, &id).await;
    assert_eq!(status, StatusCode::OK, "paper: {paper}");
    assert_eq!(paper["filename"], "paper.pdf");
    assert_eq!(paper["mime_type"], "application/pdf");
}

#[tokio::test]
async fn question_edits_respect_range_and_approval_lock() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let app = &ctx.app;

    let id = create_evaluation(app, &token, "single", 100.0).await;
    let (status, _) = upload(app, &token, &id, &["ada.png"], &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, run) = send(app, Method::POST, &format!("/api/v1/evaluations/{id}/grade"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let record = record_id(&run["evaluation"], 0);
    let question_uri = format!("/api/v1/evaluations/{id}/records/{record}/questions/1");

    let (status, _) = send(app, Method::PATCH, &question_uri, &token, Some(json!({"marks": 40}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app,
        Method::PATCH,
        &format!("/api/v1/evaluations/{id}/records/{record}/questions/9"),
        &token,
        Some(json!({"marks": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, edited) = send(
        app,
        Method::PATCH,
        &question_uri,
        &token,
        Some(json!({"marks": 30, "comment": "Good working"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "edit: {edited}");
    let question = &edited["records"][0]["breakdown"][0];
    assert_eq!(question["teacher_adjusted_marks"], 30.0);
    assert_eq!(question["teacher_comment"], "Good working");
    let expected: f64 = edited["records"][0]["breakdown"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["teacher_adjusted_marks"].as_f64().unwrap_or_else(|| q["ai_marks"].as_f64().unwrap()))
        .sum();
    assert_eq!(edited["records"][0]["score"].as_f64().unwrap(), expected);

    let approve_uri = format!("/api/v1/evaluations/{id}/records/{record}/approve");
    let (status, _) = send(app, Method::POST, &approve_uri, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app, Method::PATCH, &question_uri, &token, Some(json!({"marks": 10}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(app, Method::POST, &approve_uri, &token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, undone) = send(
        app,
        Method::POST,
        &format!("/api/v1/evaluations/{id}/records/{record}/undo"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undone["records"][0]["status"], "pending");
    assert!(undone["records"][0]["reviewed_by"].is_null());

    let (status, approved) =
        send(app, Method::POST, &format!("/api/v1/evaluations/{id}/approve-all"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["approved"], 1);
    assert_eq!(approved["evaluation"]["summary"]["can_finalize"], true);
}

#[tokio::test]
async fn other_teachers_and_students_are_kept_out() {
    let ctx = test_support::setup_test_context().await;
    let owner =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let other =
        test_support::insert_user(ctx.state.db(), "o@school.io", "Otto Other", UserRole::Teacher, "Teach1234")
            .await;
    let student =
        test_support::insert_user(ctx.state.db(), "s@school.io", "Sam Student", UserRole::Student, "Study1234")
            .await;
    let admin =
        test_support::insert_user(ctx.state.db(), "a@school.io", "Ada Admin", UserRole::Admin, "Admin1234")
            .await;
    let owner_token = test_support::session_token(&owner.id, ctx.state.settings());
    let other_token = test_support::session_token(&other.id, ctx.state.settings());
    let student_token = test_support::session_token(&student.id, ctx.state.settings());
    let admin_token = test_support::session_token(&admin.id, ctx.state.settings());
    let app = &ctx.app;

    let id = create_evaluation(app, &owner_token, "bulk", 30.0).await;

    let (status, _) = send(app, Method::GET, &format!("/api/v1/evaluations/{id}"), &other_token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(app, Method::GET, &format!("/api/v1/evaluations/{id}"), &admin_token, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        app,
        Method::POST,
        "/api/v1/evaluations",
        &student_token,
        Some(json!({"title": "Nope", "total_marks": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(app, Method::GET, "/api/v1/evaluations/missing", &owner_token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, own_list) = send(app, Method::GET, "/api/v1/evaluations", &other_token, None).await;
    assert!(own_list.as_array().unwrap().is_empty());
    let (_, all) = send(app, Method::GET, "/api/v1/evaluations", &admin_token, None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["progress_label"], "0/0");
}

#[tokio::test]
async fn stale_review_write_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let app = &ctx.app;

    let id = create_evaluation(app, &token, "bulk", 50.0).await;
    upload(app, &token, &id, &["one.png", "two.png"], &[]).await;
    let (_, run) = send(app, Method::POST, &format!("/api/v1/evaluations/{id}/grade"), &token, None).await;
    let first = record_id(&run["evaluation"], 0);
    let second = record_id(&run["evaluation"], 1);

    let db = ctx.state.db();
    let now = crate::core::time::primitive_now_utc();
    let mut fresh = repositories::evaluations::load_aggregate(db, &id).await.unwrap().unwrap();
    let mut stale = repositories::evaluations::load_aggregate(db, &id).await.unwrap().unwrap();

    fresh.transition(&first, ReviewAction::Approve, &teacher.id, now).unwrap();
    assert!(repositories::evaluations::save_review(db, &fresh, now).await.unwrap());

    stale.transition(&second, ReviewAction::Approve, &teacher.id, now).unwrap();
    assert!(!repositories::evaluations::save_review(db, &stale, now).await.unwrap());

    let stored = repositories::evaluations::load_aggregate(db, &id).await.unwrap().unwrap();
    assert_eq!(stored.summary().approved, 1);
    assert_eq!(stored.version(), fresh.version() + 1);
}

/// Fails the named sheet on its first attempt and grades everything else normally.
struct FailsOnceGrader {
    inner: MockGrader,
    filename: &'static str,
    tripped: AtomicBool,
}

#[async_trait]
impl Grader for FailsOnceGrader {
    fn name(&self) -> &'static str {
        "fails-once"
    }

    async fn grade(&self, request: &GradeRequest) -> Result<GradeOutcome, GradingError> {
        if request.filename == self.filename && !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(GradingError::Upstream { status: 503, body: "overloaded".to_string() });
        }
        self.inner.grade(request).await
    }
}

#[tokio::test]
async fn failed_sheet_stays_ungraded_until_the_next_run() {
    let grader = Arc::new(FailsOnceGrader {
        inner: MockGrader::new(Some(test_support::TEST_GRADING_SEED), Duration::ZERO),
        filename: "broken.png",
        tripped: AtomicBool::new(false),
    });
    let ctx = test_support::setup_test_context_with_grader(grader).await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let app = &ctx.app;

    let id = create_evaluation(app, &token, "bulk", 60.0).await;
    let (status, _) = upload(app, &token, &id, &["ada.png", "broken.png", "grace.png"], &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    let grade_uri = format!("/api/v1/evaluations/{id}/grade");

    let (status, run) = send(app, Method::POST, &grade_uri, &token, None).await;
    assert_eq!(status, StatusCode::OK, "grade: {run}");
    assert_eq!(run["grader"], "fails-once");
    assert_eq!(run["graded"], 2);
    let failed = run["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["filename"], "broken.png");
    assert!(failed[0]["error"].as_str().unwrap().contains("503"));
    assert_eq!(run["evaluation"]["status"], "in_review");
    let records = run["evaluation"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record["student_name"] != "Broken"));

    let (status, retry) = send(app, Method::POST, &grade_uri, &token, None).await;
    assert_eq!(status, StatusCode::OK, "retry: {retry}");
    assert_eq!(retry["graded"], 1);
    assert!(retry["failed"].as_array().unwrap().is_empty());
    let records = retry["evaluation"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().any(|record| record["student_name"] == "Broken"));

    let (status, _) = send(app, Method::POST, &grade_uri, &token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn title_length_is_checked_after_trimming() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), "t@school.io", "Tess Teacher", UserRole::Teacher, "Teach1234")
            .await;
    let token = test_support::session_token(&teacher.id, ctx.state.settings());
    let app = &ctx.app;
    let longest = "q".repeat(200);

    let (status, created) = send(
        app,
        Method::POST,
        "/api/v1/evaluations",
        &token,
        Some(json!({"title": format!("  {longest}\t"), "total_marks": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create: {created}");
    assert_eq!(created["title"], longest.as_str());

    for title in ["q".repeat(201), "   ".to_string()] {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/evaluations",
            &token,
            Some(json!({"title": title, "total_marks": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "title {title:?}: {body}");
    }
}
