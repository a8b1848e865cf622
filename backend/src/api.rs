//! JSON API over the store. Also serves as the admin read path: the listing
//! endpoint accepts `resolved`, `q`, and `order` query parameters.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use shared::{CreateTodoRequest, Todo, TodoQuery, UpdateTodoRequest};

use crate::error::StoreError;
use crate::AppState;

pub async fn list_todos(
    State(state): State<AppState>,
    Query(query): Query<TodoQuery>,
) -> Result<Json<Vec<Todo>>, StoreError> {
    let todos = state.store.search(&query.into()).await?;
    Ok(Json(todos))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Json(payload): Json<CreateTodoRequest>,
) -> Result<Json<Todo>, StoreError> {
    let todo = state.store.create(payload).await?;
    tracing::info!(id = %todo.id, "created todo");
    Ok(Json(todo))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, StoreError> {
    Ok(Json(state.store.get(id).await?))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTodoRequest>,
) -> Result<Json<Todo>, StoreError> {
    let todo = state.store.update(id, &payload.into()).await?;
    tracing::info!(id = %todo.id, "updated todo");
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StoreError> {
    state.store.delete(id).await?;
    tracing::info!(%id, "deleted todo");
    Ok(Json(json!({ "message": "Todo deleted successfully" })))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, StoreError> {
    let todo = state.store.toggle_resolved(id).await?;
    tracing::info!(id = %todo.id, resolved = todo.resolved, "toggled todo");
    Ok(Json(todo))
}
