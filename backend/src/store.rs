use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use shared::{CreateTodoRequest, Todo, TodoOrder, TodoQuery, UpdateTodoRequest};

use crate::error::StoreError;

pub const TITLE_MAX_CHARS: usize = 200;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS todos (
    id          BLOB PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    due_date    TEXT,
    resolved    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
)";

const COLUMNS: &str = "id, title, description, due_date, resolved, created_at, updated_at";

/// Partial update applied by [`TodoStore::update`]. `None` fields are left
/// untouched; `due_date: Some(None)` clears the stored date.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl From<UpdateTodoRequest> for TodoPatch {
    fn from(req: UpdateTodoRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            due_date: req.due_date.map(Some),
        }
    }
}

/// Listing filter used by the HTML list page and the API/admin read path.
#[derive(Debug, Clone, Default)]
pub struct TodoFilter {
    pub resolved: Option<bool>,
    pub search: Option<String>,
    pub order: TodoOrder,
}

impl From<TodoQuery> for TodoFilter {
    fn from(query: TodoQuery) -> Self {
        Self {
            resolved: query.resolved,
            search: query.q,
            order: query.order.unwrap_or_default(),
        }
    }
}

/// Row as stored in the `todos` table; converted to the domain type at the
/// store boundary.
#[derive(Debug, sqlx::FromRow)]
struct TodoRow {
    id: Uuid,
    title: String,
    description: String,
    due_date: Option<NaiveDate>,
    resolved: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            resolved: row.resolved,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Sole owner of `Todo` persistence and validation, backed by a SQLite pool.
///
/// Every mutation executes as a single SQL statement, so concurrent calls on
/// the same id serialize in the database and never lose an update.
#[derive(Clone)]
pub struct TodoStore {
    pool: SqlitePool,
}

impl TodoStore {
    /// Opens (creating if missing) the database at `url` and ensures the
    /// schema exists before the first request.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and ensures the schema exists.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn create(&self, req: CreateTodoRequest) -> Result<Todo, StoreError> {
        validate_title(&req.title)?;
        let todo = Todo::new(
            req.title,
            req.description.unwrap_or_default(),
            req.due_date,
        );
        let row: TodoRow = sqlx::query_as(
            "INSERT INTO todos (id, title, description, due_date, resolved, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, title, description, due_date, resolved, created_at, updated_at",
        )
        .bind(todo.id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_date)
        .bind(todo.resolved)
        .bind(todo.created_at)
        .bind(todo.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Todo, StoreError> {
        let row: Option<TodoRow> = sqlx::query_as(
            "SELECT id, title, description, due_date, resolved, created_at, updated_at
             FROM todos WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Todo::from).ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of all todos, newest first.
    pub async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        self.search(&TodoFilter::default()).await
    }

    /// Filterable read path: optional `resolved` filter, case-insensitive
    /// substring search over title and description, selectable sort field.
    pub async fn search(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM todos WHERE 1 = 1"
        ));
        if let Some(resolved) = filter.resolved {
            query.push(" AND resolved = ").push_bind(resolved);
        }
        if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            query
                .push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        query.push(match filter.order {
            TodoOrder::CreatedAt => " ORDER BY created_at DESC",
            TodoOrder::UpdatedAt => " ORDER BY updated_at DESC",
            TodoOrder::DueDate => " ORDER BY due_date IS NULL, due_date",
            TodoOrder::Title => " ORDER BY title COLLATE NOCASE",
        });
        let rows: Vec<TodoRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Todo::from).collect())
    }

    /// Applies only the supplied fields and refreshes `updated_at`. A failed
    /// validation mutates nothing.
    pub async fn update(&self, id: Uuid, patch: &TodoPatch) -> Result<Todo, StoreError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE todos SET updated_at = ");
        query.push_bind(Utc::now());
        if let Some(title) = &patch.title {
            query.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &patch.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(due_date) = &patch.due_date {
            query.push(", due_date = ").push_bind(*due_date);
        }
        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {COLUMNS}"));
        let row: Option<TodoRow> = query.build_query_as().fetch_optional(&self.pool).await?;
        row.map(Todo::from).ok_or(StoreError::NotFound(id))
    }

    /// Hard delete. Repeated deletes of the same id keep failing `NotFound`.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Flips `resolved` in a single statement. The negation happens in the
    /// database, so two concurrent toggles always net out to two flips.
    pub async fn toggle_resolved(&self, id: Uuid) -> Result<Todo, StoreError> {
        let row: Option<TodoRow> = sqlx::query_as(
            "UPDATE todos SET resolved = NOT resolved, updated_at = ?2 WHERE id = ?1
             RETURNING id, title, description, due_date, resolved, created_at, updated_at",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Todo::from).ok_or(StoreError::NotFound(id))
    }
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("Title is required!".to_string()));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(StoreError::Validation(format!(
            "Title must be {TITLE_MAX_CHARS} characters or fewer"
        )));
    }
    Ok(())
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn memory_store() -> TodoStore {
        // One connection: a pooled `sqlite::memory:` database is per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        TodoStore::from_pool(pool).await.unwrap()
    }

    fn request(title: &str) -> CreateTodoRequest {
        CreateTodoRequest {
            title: title.to_string(),
            description: None,
            due_date: None,
        }
    }

    // Timestamps come from the wall clock; a short pause keeps them distinct.
    async fn pause() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn create_then_get_round_trips_all_fields() {
        let store = memory_store().await;
        let due = NaiveDate::from_ymd_opt(2026, 9, 15).unwrap();
        let created = store
            .create(CreateTodoRequest {
                title: "Buy groceries".to_string(),
                description: Some("Milk and eggs".to_string()),
                due_date: Some(due),
            })
            .await
            .unwrap();

        assert_eq!(created.title, "Buy groceries");
        assert_eq!(created.description, "Milk and eggs");
        assert_eq!(created.due_date, Some(due));
        assert!(!created.resolved);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn optional_fields_default_to_empty_and_none() {
        let store = memory_store().await;
        let todo = store.create(request("Minimal Todo")).await.unwrap();
        assert_eq!(todo.description, "");
        assert_eq!(todo.due_date, None);
    }

    #[tokio::test]
    async fn blank_title_is_rejected_and_persists_nothing() {
        let store = memory_store().await;
        for title in ["", "   "] {
            let err = store.create(request(title)).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlong_title_is_rejected_at_the_boundary() {
        let store = memory_store().await;
        let err = store.create(request(&"x".repeat(201))).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list().await.unwrap().is_empty());

        // Exactly 200 characters is still valid.
        store.create(request(&"x".repeat(200))).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn toggle_is_its_own_inverse() {
        let store = memory_store().await;
        let todo = store.create(request("Toggle Me")).await.unwrap();

        pause().await;
        let once = store.toggle_resolved(todo.id).await.unwrap();
        assert!(once.resolved);
        assert!(once.updated_at > todo.updated_at);
        assert_eq!(once.created_at, todo.created_at);

        pause().await;
        let twice = store.toggle_resolved(todo.id).await.unwrap();
        assert!(!twice.resolved);
        assert!(twice.updated_at >= once.updated_at);
    }

    #[tokio::test]
    async fn concurrent_toggles_cancel_out() {
        let store = memory_store().await;
        let todo = store.create(request("Race Me")).await.unwrap();

        let (a, b) = tokio::join!(
            store.toggle_resolved(todo.id),
            store.toggle_resolved(todo.id)
        );
        a.unwrap();
        b.unwrap();

        let after = store.get(todo.id).await.unwrap();
        assert!(!after.resolved, "two toggles must restore the original value");
    }

    #[tokio::test]
    async fn delete_is_permanent_and_repeat_fails_not_found() {
        let store = memory_store().await;
        let todo = store.create(request("To Delete")).await.unwrap();

        store.delete(todo.id).await.unwrap();
        assert!(matches!(
            store.get(todo.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.delete(todo.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn partial_update_touches_only_supplied_fields() {
        let store = memory_store().await;
        let due = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let todo = store
            .create(CreateTodoRequest {
                title: "Original Title".to_string(),
                description: Some("Original Description".to_string()),
                due_date: Some(due),
            })
            .await
            .unwrap();

        pause().await;
        let updated = store
            .update(
                todo.id,
                &TodoPatch {
                    title: Some("New".to_string()),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.description, "Original Description");
        assert_eq!(updated.due_date, Some(due));
        assert_eq!(updated.created_at, todo.created_at);
        assert!(updated.updated_at > todo.updated_at);
    }

    #[tokio::test]
    async fn update_can_clear_the_due_date() {
        let store = memory_store().await;
        let todo = store
            .create(CreateTodoRequest {
                title: "Dated".to_string(),
                description: None,
                due_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            })
            .await
            .unwrap();

        let updated = store
            .update(
                todo.id,
                &TodoPatch {
                    due_date: Some(None),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.due_date, None);
    }

    #[tokio::test]
    async fn failed_validation_leaves_the_record_untouched() {
        let store = memory_store().await;
        let todo = store.create(request("Original Title")).await.unwrap();

        let err = store
            .update(
                todo.id,
                &TodoPatch {
                    title: Some(String::new()),
                    description: Some("should not land".to_string()),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let unchanged = store.get(todo.id).await.unwrap();
        assert_eq!(unchanged, todo);
    }

    #[tokio::test]
    async fn update_of_missing_id_fails_not_found() {
        let store = memory_store().await;
        let err = store
            .update(Uuid::new_v4(), &TodoPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let store = memory_store().await;
        for title in ["First", "Second", "Third"] {
            store.create(request(title)).await.unwrap();
            pause().await;
        }

        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|todo| todo.title)
            .collect();
        assert_eq!(titles, ["Third", "Second", "First"]);
    }

    #[tokio::test]
    async fn search_filters_by_resolved_and_matches_text() {
        let store = memory_store().await;
        let groceries = store
            .create(CreateTodoRequest {
                title: "Buy groceries".to_string(),
                description: Some("Milk".to_string()),
                due_date: None,
            })
            .await
            .unwrap();
        store
            .create(CreateTodoRequest {
                title: "Write report".to_string(),
                description: Some("Quarterly groceries budget".to_string()),
                due_date: None,
            })
            .await
            .unwrap();
        store.create(request("Walk the dog")).await.unwrap();
        store.toggle_resolved(groceries.id).await.unwrap();

        let resolved = store
            .search(&TodoFilter {
                resolved: Some(true),
                ..TodoFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, groceries.id);

        // Matches title or description, case-insensitively.
        let matched = store
            .search(&TodoFilter {
                search: Some("GROCERIES".to_string()),
                ..TodoFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[tokio::test]
    async fn search_can_order_by_title() {
        let store = memory_store().await;
        for title in ["banana", "Apple", "cherry"] {
            store.create(request(title)).await.unwrap();
        }

        let titles: Vec<String> = store
            .search(&TodoFilter {
                order: TodoOrder::Title,
                ..TodoFilter::default()
            })
            .await
            .unwrap()
            .into_iter()
            .map(|todo| todo.title)
            .collect();
        assert_eq!(titles, ["Apple", "banana", "cherry"]);
    }
}
