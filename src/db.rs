use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use rusqlite::{params_from_iter, Connection, OptionalExtension, Result};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::filter::TaskFilter;
use crate::models::{DeleteResult, InsertOneResult, Task, TaskInput, TaskListIndex, UpdateResult};

pub type DbPool = Arc<Mutex<Connection>>;

const TASK_FIELDS: [&str; 6] = ["item", "due", "note", "taskList", "recurrence", "completed"];

/// Shared handle to the store. Starts out empty and is connected exactly once.
#[derive(Clone, Default)]
pub struct Database {
    pool: Arc<OnceLock<DbPool>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(pool: DbPool) -> Self {
        let db = Self::new();
        db.connect(pool);
        db
    }

    /// Returns false if the handle was already connected.
    pub fn connect(&self, pool: DbPool) -> bool {
        self.pool.set(pool).is_ok()
    }

    #[cfg(test)]
    fn is_ready(&self) -> bool {
        self.pool.get().is_some()
    }

    pub fn pool(&self) -> Result<&DbPool, AppError> {
        self.pool.get().ok_or(AppError::Unavailable)
    }
}

pub fn init_db(path: impl AsRef<Path>) -> Result<DbPool> {
    setup(Connection::open(path)?)
}

pub fn init_in_memory() -> Result<DbPool> {
    setup(Connection::open_in_memory()?)
}

fn setup(conn: Connection) -> Result<DbPool> {
    // One collection: task documents plus the task list index document.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL
        );
        ",
    )?;

    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>, AppError> {
    pool.lock()
        .map_err(|_| AppError::Database("database connection poisoned".to_string()))
}

fn parse_id(id: &str) -> Result<String, AppError> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|err| AppError::Database(format!("invalid id {id:?}: {err}")))
}

fn task_from_row(id: String, body: &str) -> Result<Task, AppError> {
    Ok(Task {
        id,
        fields: serde_json::from_str(body)?,
    })
}

// Task operations
pub fn find_tasks(pool: &DbPool, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
    let (clause, params) = filter.to_sql();
    let conn = lock(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT id, body FROM tasks WHERE {clause} ORDER BY rowid ASC"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, body)| task_from_row(id, &body))
        .collect()
}

fn find_task_body(conn: &Connection, id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT body FROM tasks WHERE id = ?1 AND json_extract(body, '$.allTaskLists') IS NULL",
        [id],
        |row| row.get(0),
    )
    .optional()
}

pub fn find_task(pool: &DbPool, id: &str) -> Result<Option<Task>, AppError> {
    let id = parse_id(id)?;
    let conn = lock(pool)?;
    match find_task_body(&conn, &id)? {
        Some(body) => Ok(Some(task_from_row(id, &body)?)),
        None => Ok(None),
    }
}

pub fn insert_task(pool: &DbPool, task: &TaskInput) -> Result<InsertOneResult, AppError> {
    let id = Uuid::new_v4().to_string();
    let body = serde_json::to_string(task)?;

    let conn = lock(pool)?;
    conn.execute("INSERT INTO tasks (id, body) VALUES (?1, ?2)", (&id, &body))?;

    Ok(InsertOneResult {
        acknowledged: true,
        inserted_id: id,
    })
}

/// Overwrites the fixed task field set, leaving any other stored keys alone.
pub fn update_task(pool: &DbPool, id: &str, task: &TaskInput) -> Result<UpdateResult, AppError> {
    let id = parse_id(id)?;
    let conn = lock(pool)?;

    let Some(old_body) = find_task_body(&conn, &id)? else {
        return Ok(UpdateResult {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_id: None,
            upserted_count: 0,
        });
    };

    let mut document: Map<String, Value> = serde_json::from_str(&old_body)?;
    let old_document = document.clone();
    for field in TASK_FIELDS {
        document.remove(field);
    }
    if let Value::Object(fields) = serde_json::to_value(task)? {
        document.extend(fields);
    }

    let modified = document != old_document;
    if modified {
        conn.execute(
            "UPDATE tasks SET body = ?1 WHERE id = ?2",
            (serde_json::to_string(&document)?, &id),
        )?;
    }

    Ok(UpdateResult {
        acknowledged: true,
        matched_count: 1,
        modified_count: u64::from(modified),
        upserted_id: None,
        upserted_count: 0,
    })
}

pub fn delete_task(pool: &DbPool, id: &str) -> Result<DeleteResult, AppError> {
    let id = parse_id(id)?;
    let conn = lock(pool)?;
    let rows = conn.execute(
        "DELETE FROM tasks WHERE id = ?1 AND json_extract(body, '$.allTaskLists') IS NULL",
        [&id],
    )?;

    Ok(DeleteResult {
        acknowledged: true,
        deleted_count: rows as u64,
    })
}

// Task list index operations
pub(crate) fn task_list_in_use(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM tasks
            WHERE json_type(body, '$.taskList') = 'text' AND json_extract(body, '$.taskList') = ?1
        )",
        [name],
        |row| row.get(0),
    )
}

pub(crate) fn load_task_list_index(
    conn: &Connection,
) -> Result<Option<(String, TaskListIndex)>, AppError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, body FROM tasks WHERE json_type(body, '$.allTaskLists') = 'true' LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((id, body)) => Ok(Some((id, serde_json::from_str(&body)?))),
        None => Ok(None),
    }
}

pub(crate) fn insert_task_list_index(
    conn: &Connection,
    index: &TaskListIndex,
) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO tasks (id, body) VALUES (?1, ?2)",
        (&id, serde_json::to_string(index)?),
    )?;
    Ok(id)
}

pub(crate) fn save_task_list_index(
    conn: &Connection,
    id: &str,
    index: &TaskListIndex,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE tasks SET body = ?1 WHERE id = ?2",
        (serde_json::to_string(index)?, id),
    )?;
    Ok(())
}

pub fn find_task_list_index(pool: &DbPool) -> Result<Option<TaskListIndex>, AppError> {
    let conn = lock(pool)?;
    Ok(load_task_list_index(&conn)?.map(|(_, index)| index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{build_filter, TaskQuery};

    fn task(item: &str, task_list: &str, completed: bool) -> TaskInput {
        TaskInput {
            item: Some(item.to_string()),
            due: Some("2024-01-01".to_string()),
            note: Some(String::new()),
            task_list: Some(task_list.to_string()),
            recurrence: Some("none".to_string()),
            completed: Some(completed),
        }
    }

    #[test]
    fn database_handle_connects_once() {
        let db = Database::new();
        assert!(!db.is_ready());
        assert!(matches!(db.pool(), Err(AppError::Unavailable)));

        assert!(db.connect(init_in_memory().unwrap()));
        assert!(db.is_ready());
        assert!(!db.connect(init_in_memory().unwrap()));
        assert!(db.clone().pool().is_ok());
    }

    #[test]
    fn insert_then_find_round_trips() {
        let pool = init_in_memory().unwrap();
        let input = task("Buy milk", "groceries", false);

        let ack = insert_task(&pool, &input).unwrap();
        assert!(ack.acknowledged);

        let found = find_task(&pool, &ack.inserted_id).unwrap().unwrap();
        assert_eq!(found.id, ack.inserted_id);
        assert_eq!(found.fields, input);
    }

    #[test]
    fn missing_and_malformed_ids() {
        let pool = init_in_memory().unwrap();
        let missing = Uuid::new_v4().to_string();

        assert!(find_task(&pool, &missing).unwrap().is_none());
        assert_eq!(delete_task(&pool, &missing).unwrap().deleted_count, 0);
        assert!(matches!(
            find_task(&pool, "not-an-id"),
            Err(AppError::Database(_))
        ));
    }

    #[test]
    fn find_filters_and_skips_index_document() {
        let pool = init_in_memory().unwrap();
        insert_task(&pool, &task("a", "home", false)).unwrap();
        insert_task(&pool, &task("b", "home", true)).unwrap();
        insert_task(&pool, &task("c", "work", false)).unwrap();
        {
            let conn = lock(&pool).unwrap();
            insert_task_list_index(
                &conn,
                &TaskListIndex {
                    all_task_lists: true,
                    task_lists: vec!["home".to_string(), "work".to_string()],
                },
            )
            .unwrap();
        }

        let all = find_tasks(&pool, &TaskFilter::default()).unwrap();
        let items: Vec<_> = all.iter().map(|t| t.fields.item.as_deref().unwrap()).collect();
        assert_eq!(items, ["a", "b", "c"]);

        let open_home = find_tasks(
            &pool,
            &build_filter(&TaskQuery {
                completed: Some("false".to_string()),
                task_list: Some("home".to_string()),
                ..TaskQuery::default()
            }),
        )
        .unwrap();
        assert_eq!(open_home.len(), 1);
        assert_eq!(open_home[0].fields.item.as_deref(), Some("a"));

        let done = find_tasks(
            &pool,
            &build_filter(&TaskQuery {
                completed: Some("yes".to_string()),
                ..TaskQuery::default()
            }),
        )
        .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].fields.item.as_deref(), Some("b"));
    }

    #[test]
    fn update_replaces_fixed_fields() {
        let pool = init_in_memory().unwrap();
        let id = insert_task(&pool, &task("a", "home", false)).unwrap().inserted_id;

        let same = update_task(&pool, &id, &task("a", "home", false)).unwrap();
        assert_eq!((same.matched_count, same.modified_count), (1, 0));

        let changed = TaskInput {
            item: Some("a2".to_string()),
            completed: Some(true),
            ..TaskInput::default()
        };
        let ack = update_task(&pool, &id, &changed).unwrap();
        assert_eq!((ack.matched_count, ack.modified_count), (1, 1));
        assert_eq!(find_task(&pool, &id).unwrap().unwrap().fields, changed);

        let missing = update_task(&pool, &Uuid::new_v4().to_string(), &changed).unwrap();
        assert_eq!(missing.matched_count, 0);
    }

    #[test]
    fn index_document_is_not_addressable_by_id() {
        let pool = init_in_memory().unwrap();
        let id = {
            let conn = lock(&pool).unwrap();
            insert_task_list_index(
                &conn,
                &TaskListIndex {
                    all_task_lists: true,
                    task_lists: vec!["home".to_string()],
                },
            )
            .unwrap()
        };

        assert!(find_task(&pool, &id).unwrap().is_none());
        assert_eq!(delete_task(&pool, &id).unwrap().deleted_count, 0);
        assert!(find_task_list_index(&pool).unwrap().is_some());
    }

    #[test]
    fn task_list_usage() {
        let pool = init_in_memory().unwrap();
        insert_task(&pool, &task("a", "home", false)).unwrap();

        let conn = lock(&pool).unwrap();
        assert!(task_list_in_use(&conn, "home").unwrap());
        assert!(!task_list_in_use(&conn, "work").unwrap());
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");

        let id = {
            let pool = init_db(&path).unwrap();
            insert_task(&pool, &task("a", "home", false)).unwrap().inserted_id
        };

        let pool = init_db(&path).unwrap();
        assert!(find_task(&pool, &id).unwrap().is_some());
    }
}
