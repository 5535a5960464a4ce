//! Date-keyed task planner.
//!
//! Each calendar date owns one document in [`COLLECTION`] holding its ordered
//! task sequence. A day whose tasks have all been deleted or moved away keeps
//! its document with an empty sequence, so exports always list every date that
//! ever held a task and re-importing an export reproduces it exactly.
//!
//! Task ids come from a single store counter and are unique across all dates.
//! Multi-step mutations (move, import, the notification claim) are meant to run
//! inside one [`crate::store::Store::transaction`].

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::{AppError, AppResult};
use crate::store::{self, Document};

pub const COLLECTION: &str = "monthlyPlannerTasks";
const TASK_ID_COUNTER: &str = "planner_task_id";
const DATE_FIELD: &str = "date";
const TASKS_FIELD: &str = "tasks";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerTask {
    pub id: i64,
    pub subject: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notified: bool,
}

pub type PlannerState = BTreeMap<String, Vec<PlannerTask>>;

#[derive(Debug, Clone)]
pub struct NewTask {
    pub subject: String,
    pub priority: Priority,
    pub notes: Option<String>,
}

/// Task as accepted by a bulk import; a missing id gets a fresh one.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedTask {
    pub id: Option<i64>,
    pub subject: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStep {
    RemovedFromSource,
    InsertedAtDestination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub task: PlannerTask,
    pub from: String,
    pub to: String,
    pub steps: Vec<MoveStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Cleared,
    Inserted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub cleared_days: usize,
    pub days: usize,
    pub tasks: usize,
    pub steps: Vec<ImportStep>,
}

pub fn parse_date(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::bad_params("date is required"));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::bad_params(format!("invalid date: {raw} (expected YYYY-MM-DD)")))
}

fn decode_tasks(day: &Value) -> AppResult<Vec<PlannerTask>> {
    match day.get(TASKS_FIELD) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| AppError::Persistence(store::StoreError::Json(e))),
    }
}

fn encode_task(task: &PlannerTask) -> AppResult<Value> {
    serde_json::to_value(task).map_err(|e| AppError::Persistence(store::StoreError::Json(e)))
}

fn day_document(date: &str, tasks: &[PlannerTask]) -> AppResult<Document> {
    let tasks = tasks.iter().map(encode_task).collect::<AppResult<Vec<_>>>()?;
    let mut doc = Document::new();
    doc.insert(DATE_FIELD.to_string(), Value::String(date.to_string()));
    doc.insert(TASKS_FIELD.to_string(), Value::Array(tasks));
    Ok(doc)
}

pub fn list_all(conn: &Connection) -> AppResult<PlannerState> {
    let mut out = PlannerState::new();
    for day in store::find_all(conn, COLLECTION)? {
        let Some(date) = day.get(DATE_FIELD).and_then(|v| v.as_str()) else {
            continue;
        };
        out.entry(date.to_string())
            .or_default()
            .extend(decode_tasks(&day)?);
    }
    Ok(out)
}

pub fn day_tasks(conn: &Connection, date: &str) -> AppResult<Option<Vec<PlannerTask>>> {
    store::find_one(conn, COLLECTION, DATE_FIELD, date)?
        .map(|day| decode_tasks(&day))
        .transpose()
}

pub fn find_task(conn: &Connection, date: &str, id: i64) -> AppResult<PlannerTask> {
    let Some(tasks) = day_tasks(conn, date)? else {
        return Err(AppError::not_found(format!("no tasks for {date}")));
    };
    tasks
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| AppError::not_found(format!("task {id} not found on {date}")))
}

/// Appends `task` to the day's sequence, creating the day when it is new.
fn append_task(conn: &Connection, date: &str, task: &PlannerTask) -> AppResult<()> {
    let item = encode_task(task)?;
    if !store::push_to_array(conn, COLLECTION, DATE_FIELD, date, TASKS_FIELD, item)? {
        store::insert_one(conn, COLLECTION, day_document(date, std::slice::from_ref(task))?)?;
    }
    Ok(())
}

fn remove_task(conn: &Connection, date: &str, id: i64) -> AppResult<Vec<Value>> {
    Ok(store::pull_from_array(
        conn,
        COLLECTION,
        DATE_FIELD,
        date,
        TASKS_FIELD,
        "id",
        &json!(id),
    )?)
}

/// Rewrites one task in place, keeping its position in the sequence.
fn rewrite_task(
    conn: &Connection,
    date: &str,
    id: i64,
    edit: impl FnOnce(&mut PlannerTask),
) -> AppResult<PlannerTask> {
    let Some(Value::Object(mut day)) = store::find_one(conn, COLLECTION, DATE_FIELD, date)? else {
        return Err(AppError::not_found(format!("no tasks for {date}")));
    };
    let doc_id = day
        .get(store::ID_FIELD)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::not_found(format!("no tasks for {date}")))?;
    let mut tasks = decode_tasks(&Value::Object(day.clone()))?;
    let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
        return Err(AppError::not_found(format!("task {id} not found on {date}")));
    };
    edit(task);
    let updated = task.clone();
    let encoded = tasks.iter().map(encode_task).collect::<AppResult<Vec<_>>>()?;
    day.insert(TASKS_FIELD.to_string(), Value::Array(encoded));
    store::replace_one(conn, COLLECTION, &doc_id, day)?;
    Ok(updated)
}

pub fn add_task(conn: &Connection, date: &str, new_task: NewTask) -> AppResult<PlannerTask> {
    let subject = new_task.subject.trim().to_string();
    if subject.is_empty() {
        return Err(AppError::bad_params("subject is required"));
    }
    let task = PlannerTask {
        id: store::next_counter(conn, TASK_ID_COUNTER)?,
        subject,
        priority: new_task.priority,
        notes: new_task.notes.filter(|n| !n.trim().is_empty()),
        completed: false,
        notified: false,
    };
    append_task(conn, date, &task)?;
    Ok(task)
}

pub fn set_completed(conn: &Connection, date: &str, id: i64, completed: bool) -> AppResult<PlannerTask> {
    rewrite_task(conn, date, id, |t| t.completed = completed)
}

pub fn move_task(conn: &Connection, date: &str, id: i64, new_date: &str) -> AppResult<MoveOutcome> {
    let task = find_task(conn, date, id)?;
    let mut steps = Vec::with_capacity(2);

    if remove_task(conn, date, id)?.is_empty() {
        return Err(AppError::not_found(format!("task {id} not found on {date}")));
    }
    steps.push(MoveStep::RemovedFromSource);

    append_task(conn, new_date, &task)?;
    steps.push(MoveStep::InsertedAtDestination);

    Ok(MoveOutcome {
        task,
        from: date.to_string(),
        to: new_date.to_string(),
        steps,
    })
}

/// Removes the task if present. Returns whether anything was removed.
pub fn delete_task(conn: &Connection, date: &str, id: i64) -> AppResult<bool> {
    Ok(!remove_task(conn, date, id)?.is_empty())
}

/// Checks the payload without touching the store.
pub fn validate_import(
    raw: BTreeMap<String, Vec<ImportedTask>>,
) -> AppResult<BTreeMap<String, Vec<ImportedTask>>> {
    let mut out = BTreeMap::new();
    let mut seen_ids = HashSet::new();
    for (date, tasks) in raw {
        let date = parse_date(&date)?;
        for (i, t) in tasks.iter().enumerate() {
            let has_subject = t.subject.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
            if !has_subject {
                return Err(AppError::bad_params(format!("{date}[{i}].subject is required")));
            }
            if let Some(p) = t.priority.as_deref() {
                if Priority::parse(p).is_none() {
                    return Err(AppError::bad_params(format!("{date}[{i}].priority is invalid: {p}")));
                }
            }
            if let Some(id) = t.id {
                if !seen_ids.insert(id) {
                    return Err(AppError::bad_params(format!("duplicate task id {id}")));
                }
            }
        }
        out.entry(date).or_insert_with(Vec::new).extend(tasks);
    }
    Ok(out)
}

/// Replaces the whole planner with `state`. Expects a validated payload.
pub fn import(conn: &Connection, state: BTreeMap<String, Vec<ImportedTask>>) -> AppResult<ImportOutcome> {
    let mut steps = Vec::with_capacity(2);
    let cleared_days = store::delete_many(conn, COLLECTION)?;
    steps.push(ImportStep::Cleared);

    if let Some(max_id) = state.values().flatten().filter_map(|t| t.id).max() {
        store::bump_counter(conn, TASK_ID_COUNTER, max_id)?;
    }

    let mut docs = Vec::with_capacity(state.len());
    let mut task_count = 0;
    for (date, imported) in state {
        let mut tasks = Vec::with_capacity(imported.len());
        for t in imported {
            let id = match t.id {
                Some(id) => id,
                None => store::next_counter(conn, TASK_ID_COUNTER)?,
            };
            tasks.push(PlannerTask {
                id,
                subject: t.subject.unwrap_or_default().trim().to_string(),
                priority: t.priority.as_deref().and_then(Priority::parse).unwrap_or_default(),
                notes: t.notes,
                completed: t.completed,
                notified: t.notified,
            });
        }
        task_count += tasks.len();
        docs.push(day_document(&date, &tasks)?);
    }
    let days = docs.len();
    store::insert_many(conn, COLLECTION, docs)?;
    steps.push(ImportStep::Inserted);

    Ok(ImportOutcome {
        cleared_days,
        days,
        tasks: task_count,
        steps,
    })
}

/// Marks the task notified. Fails if it already was, so only one caller can
/// hold the claim.
pub fn claim_notification(conn: &Connection, date: &str, id: i64) -> AppResult<PlannerTask> {
    let task = find_task(conn, date, id)?;
    if task.notified {
        return Err(AppError::AlreadyNotified);
    }
    rewrite_task(conn, date, id, |t| t.notified = true)
}

/// Undoes a claim after a failed delivery.
pub fn release_notification(conn: &Connection, date: &str, id: i64) -> AppResult<PlannerTask> {
    rewrite_task(conn, date, id, |t| t.notified = false)
}
