use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use crate::db::{delete_task, find_task, find_tasks, insert_task, update_task};
use crate::error::AppError;
use crate::filter::{build_filter, TaskQuery};
use crate::middleware::Ready;
use crate::models::{DeleteResult, InsertOneResult, Task, TaskInput, UpdateResult};
use crate::task_lists::{self, IndexUpdate};
use crate::AppState;

pub async fn list_tasks(
    Ready(pool): Ready,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Task>>, AppError> {
    let filter = build_filter(&TaskQuery::from_pairs(params));
    let tasks = find_tasks(&pool, &filter)?;
    info!(count = tasks.len(), conditions = filter.conditions.len(), "Listed tasks");
    Ok(Json(tasks))
}

pub async fn get_task(
    Ready(pool): Ready,
    Path(id): Path<String>,
) -> Result<Json<Option<Task>>, AppError> {
    Ok(Json(find_task(&pool, &id)?))
}

pub async fn add_task(
    Ready(pool): Ready,
    State(state): State<AppState>,
    Json(req): Json<TaskInput>,
) -> Result<Json<InsertOneResult>, AppError> {
    let ack = insert_task(&pool, &req)?;
    info!(id = %ack.inserted_id, task_list = ?req.task_list, "Added task");

    task_lists::spawn_updates(
        &state.db,
        vec![IndexUpdate::Register(req.task_list_name().to_string())],
    );
    Ok(Json(ack))
}

pub async fn update_existing_task(
    Ready(pool): Ready,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TaskInput>,
) -> Result<Json<Option<UpdateResult>>, AppError> {
    let Some(previous) = find_task(&pool, &id)? else {
        return Ok(Json(None));
    };

    let ack = update_task(&pool, &id, &req)?;
    info!(id = %id, modified = ack.modified_count, "Updated task");

    // the task can vanish between the lookup and the write
    if ack.matched_count > 0 && previous.fields.task_list != req.task_list {
        task_lists::spawn_updates(
            &state.db,
            vec![
                IndexUpdate::MaybeRemove(previous.fields.task_list_name().to_string()),
                IndexUpdate::Register(req.task_list_name().to_string()),
            ],
        );
    }
    Ok(Json(Some(ack)))
}

pub async fn delete_existing_task(
    Ready(pool): Ready,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<DeleteResult>>, AppError> {
    let Some(previous) = find_task(&pool, &id)? else {
        return Ok(Json(None));
    };

    let ack = delete_task(&pool, &id)?;
    info!(id = %id, deleted = ack.deleted_count, "Deleted task");

    task_lists::spawn_updates(
        &state.db,
        vec![IndexUpdate::MaybeRemove(
            previous.fields.task_list_name().to_string(),
        )],
    );
    Ok(Json(Some(ack)))
}

pub async fn list_task_lists(Ready(pool): Ready) -> Json<Vec<String>> {
    Json(task_lists::all(&pool))
}
