//! Server-rendered HTML adapter over the store: list page, create/edit forms
//! with inline validation errors, delete confirmation, and the toggle action.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use chrono::NaiveDate;
use serde::Deserialize;
use tera::{Context, Tera};
use thiserror::Error;
use uuid::Uuid;

use shared::CreateTodoRequest;

use crate::error::StoreError;
use crate::store::TodoPatch;
use crate::AppState;

/// Templates are embedded so the binary and the tests never depend on the
/// working directory.
pub fn templates() -> Tera {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("todo_list.html", include_str!("../templates/todo_list.html")),
        ("todo_form.html", include_str!("../templates/todo_form.html")),
        (
            "todo_confirm_delete.html",
            include_str!("../templates/todo_confirm_delete.html"),
        ),
    ])
    .expect("embedded templates are valid");
    tera
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("template error: {0}")]
    Render(#[from] tera::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Store(StoreError::NotFound(id)) => {
                tracing::debug!(%id, "todo not found");
                (StatusCode::NOT_FOUND, Html("<h1>Not Found</h1>")).into_response()
            }
            PageError::Store(err) => err.into_response(),
            PageError::Render(err) => {
                tracing::error!(error = %err, "template rendering failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Raw form fields as posted. Everything defaults so a missing field becomes
/// a validation error rather than a rejected request.
#[derive(Debug, Default, Deserialize)]
pub struct TodoForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
}

fn parse_due_date(input: &str) -> Result<Option<NaiveDate>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| "Enter a valid date (YYYY-MM-DD).".to_string())
}

fn render_form(
    state: &AppState,
    heading: &str,
    action: &str,
    form: &TodoForm,
    error: Option<&str>,
) -> Result<Html<String>, PageError> {
    let mut ctx = Context::new();
    ctx.insert("heading", heading);
    ctx.insert("action", action);
    ctx.insert("title", &form.title);
    ctx.insert("description", &form.description);
    ctx.insert("due_date", &form.due_date);
    ctx.insert("error", &error);
    Ok(Html(state.templates.render("todo_form.html", &ctx)?))
}

pub async fn todo_list(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let todos = state.store.list().await?;
    let mut ctx = Context::new();
    ctx.insert("todos", &todos);
    Ok(Html(state.templates.render("todo_list.html", &ctx)?))
}

pub async fn todo_create_form(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    render_form(&state, "New Todo", "/todos/new", &TodoForm::default(), None)
}

pub async fn todo_create(
    State(state): State<AppState>,
    Form(form): Form<TodoForm>,
) -> Result<Response, PageError> {
    let redisplay = |error: &str| {
        render_form(&state, "New Todo", "/todos/new", &form, Some(error))
            .map(IntoResponse::into_response)
    };
    let due_date = match parse_due_date(&form.due_date) {
        Ok(date) => date,
        Err(message) => return redisplay(&message),
    };
    let request = CreateTodoRequest {
        title: form.title.clone(),
        description: Some(form.description.clone()),
        due_date,
    };
    match state.store.create(request).await {
        Ok(todo) => {
            tracing::info!(id = %todo.id, "created todo");
            Ok(Redirect::to("/").into_response())
        }
        Err(StoreError::Validation(message)) => redisplay(&message),
        Err(err) => Err(err.into()),
    }
}

pub async fn todo_edit_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, PageError> {
    let todo = state.store.get(id).await?;
    let form = TodoForm {
        title: todo.title,
        description: todo.description,
        due_date: todo.due_date.map(|d| d.to_string()).unwrap_or_default(),
    };
    let action = format!("/todos/{id}/edit");
    render_form(&state, "Edit Todo", &action, &form, None)
}

pub async fn todo_edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<TodoForm>,
) -> Result<Response, PageError> {
    let action = format!("/todos/{id}/edit");
    let redisplay = |error: &str| {
        render_form(&state, "Edit Todo", &action, &form, Some(error))
            .map(IntoResponse::into_response)
    };
    let due_date = match parse_due_date(&form.due_date) {
        Ok(date) => date,
        Err(message) => return redisplay(&message),
    };
    // The edit form carries every field, so an emptied date input clears it.
    let patch = TodoPatch {
        title: Some(form.title.clone()),
        description: Some(form.description.clone()),
        due_date: Some(due_date),
    };
    match state.store.update(id, &patch).await {
        Ok(todo) => {
            tracing::info!(id = %todo.id, "updated todo");
            Ok(Redirect::to("/").into_response())
        }
        Err(StoreError::Validation(message)) => redisplay(&message),
        Err(err) => Err(err.into()),
    }
}

pub async fn todo_confirm_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, PageError> {
    let todo = state.store.get(id).await?;
    let mut ctx = Context::new();
    ctx.insert("todo", &todo);
    Ok(Html(state.templates.render("todo_confirm_delete.html", &ctx)?))
}

pub async fn todo_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, PageError> {
    state.store.delete(id).await?;
    tracing::info!(%id, "deleted todo");
    Ok(Redirect::to("/"))
}

pub async fn todo_toggle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, PageError> {
    let todo = state.store.toggle_resolved(id).await?;
    tracing::info!(id = %todo.id, resolved = todo.resolved, "toggled todo");
    Ok(Redirect::to("/"))
}
