use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::helpers::{body_object, opt_string, parse_opt_bool, parse_task_id, required_str};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};
use crate::mail::task_reminder;
use crate::planner::{self, ImportedTask, NewTask, PlannerState, PlannerTask, Priority};

const EXPORT_DISPOSITION: &str = "attachment; filename=\"planner-export.json\"";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/planner", get(list_all).post(add_task))
        .route("/planner/import", post(import_planner))
        .route("/planner/export", get(export_planner))
        .route("/planner/notify/{id}", post(notify_task))
        .route("/planner/{date}", get(day_tasks))
        .route("/planner/{date}/{id}", put(update_task).delete(delete_task))
}

fn read_state(state: &AppState) -> AppResult<PlannerState> {
    state.store.with_conn(planner::list_all)
}

async fn list_all(State(state): State<AppState>) -> AppResult<Json<PlannerState>> {
    Ok(Json(read_state(&state)?))
}

async fn day_tasks(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> AppResult<Json<Vec<PlannerTask>>> {
    let date = planner::parse_date(&date)?;
    let tasks = state
        .store
        .with_conn(|conn| planner::day_tasks(conn, &date))?
        .unwrap_or_default();
    Ok(Json(tasks))
}

async fn add_task(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<PlannerTask>)> {
    let raw = body_object(&body)?;
    let date = planner::parse_date(&opt_string(&raw, "date")?.unwrap_or_default())?;
    let subject = required_str(&raw, "subject")?;
    let priority = match opt_string(&raw, "priority")? {
        None => Priority::default(),
        Some(p) => Priority::parse(&p)
            .ok_or_else(|| AppError::bad_params(format!("invalid priority: {p}")))?,
    };
    let notes = opt_string(&raw, "notes")?;

    let task = state.store.transaction(|tx| {
        planner::add_task(
            tx,
            &date,
            NewTask {
                subject,
                priority,
                notes,
            },
        )
    })?;
    info!(date = %date, id = task.id, "planner task added");
    Ok((StatusCode::CREATED, Json(task)))
}

/// Toggles `completed` and/or moves the task to `newDate`, in one transaction.
async fn update_task(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let date = planner::parse_date(&date)?;
    let id = parse_task_id(&id)?;
    let raw = body_object(&body)?;
    let completed = parse_opt_bool(raw.get("completed"))
        .map_err(|m| AppError::bad_params(format!("completed {m}")))?;
    let new_date = opt_string(&raw, "newDate")?
        .map(|d| planner::parse_date(&d))
        .transpose()?;
    if completed.is_none() && new_date.is_none() {
        return Err(AppError::bad_params("expected completed or newDate"));
    }

    let response = state.store.transaction(|tx| -> AppResult<Value> {
        let mut task = planner::find_task(tx, &date, id)?;
        if let Some(completed) = completed {
            task = planner::set_completed(tx, &date, id, completed)?;
        }
        match new_date.as_deref() {
            Some(to) => {
                let outcome = planner::move_task(tx, &date, id, to)?;
                Ok(json!({
                    "task": outcome.task,
                    "date": outcome.to,
                    "from": outcome.from,
                    "steps": outcome.steps,
                }))
            }
            None => Ok(json!({ "task": task, "date": date })),
        }
    })?;
    info!(date = %date, id, "planner task updated");
    Ok(Json(response))
}

async fn delete_task(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let date = planner::parse_date(&date)?;
    let id = parse_task_id(&id)?;
    let removed = state
        .store
        .with_conn(|conn| planner::delete_task(conn, &date, id))?;
    info!(date = %date, id, removed, "planner task delete");
    Ok(Json(json!({ "ok": true, "removed": removed })))
}

async fn import_planner(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let raw: BTreeMap<String, Vec<ImportedTask>> = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_params(format!("import must map dates to task lists: {e}")))?;
    let validated = planner::validate_import(raw)?;
    let outcome = state.store.transaction(|tx| planner::import(tx, validated))?;
    warn!(
        cleared = outcome.cleared_days,
        days = outcome.days,
        tasks = outcome.tasks,
        "planner replaced by import"
    );
    Ok(Json(json!(outcome)))
}

async fn export_planner(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let planner_state = read_state(&state)?;
    Ok((
        [(header::CONTENT_DISPOSITION, EXPORT_DISPOSITION)],
        Json(planner_state),
    ))
}

/// Claims the task's notified flag, sends the reminder, and releases the claim
/// again if delivery fails.
async fn notify_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let id = parse_task_id(&id)?;
    let raw = body_object(&body)?;
    let date = planner::parse_date(&opt_string(&raw, "date")?.unwrap_or_default())?;
    let recipient = opt_string(&raw, "email")?
        .or_else(|| state.notify_to.clone())
        .ok_or_else(|| AppError::bad_params("missing email and no default recipient configured"))?;

    let task = state
        .store
        .transaction(|tx| planner::claim_notification(tx, &date, id))?;

    let message = task_reminder(&state.mail_from, &recipient, &date, &task);
    if let Err(e) = state.mailer.send(&message).await {
        warn!(date = %date, id, error = %e, "reminder delivery failed, releasing claim");
        let released = state
            .store
            .transaction(|tx| planner::release_notification(tx, &date, id));
        return Err(match released {
            Ok(_) => AppError::MailDelivery(format!("{e}; notified flag released")),
            Err(release_err) => {
                warn!(date = %date, id, error = %release_err, "could not release notification claim");
                AppError::MailDelivery(format!("{e}; notified flag not released: {release_err}"))
            }
        });
    }

    info!(date = %date, id, "reminder sent");
    Ok(Json(json!({
        "ok": true,
        "task": task,
        "steps": ["claimed", "sent"],
    })))
}
