pub mod api;
pub mod error;
pub mod pages;
pub mod store;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tera::Tera;
use tower_http::cors::CorsLayer;

use crate::store::TodoStore;

#[derive(Clone)]
pub struct AppState {
    pub store: TodoStore,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub fn new(store: TodoStore) -> Self {
        Self {
            store,
            templates: Arc::new(pages::templates()),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::todo_list))
        .route(
            "/todos/new",
            get(pages::todo_create_form).post(pages::todo_create),
        )
        .route(
            "/todos/:id/edit",
            get(pages::todo_edit_form).post(pages::todo_edit),
        )
        .route(
            "/todos/:id/delete",
            get(pages::todo_confirm_delete).post(pages::todo_delete),
        )
        .route("/todos/:id/toggle", post(pages::todo_toggle))
        .route("/api/todos", get(api::list_todos).post(api::create_todo))
        .route(
            "/api/todos/:id",
            get(api::get_todo)
                .put(api::update_todo)
                .delete(api::delete_todo),
        )
        .route("/api/todos/:id/toggle", post(api::toggle_todo))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
