use tracing::{debug, warn};

use crate::db::{
    find_task_list_index, insert_task_list_index, load_task_list_index, lock,
    save_task_list_index, task_list_in_use, Database, DbPool,
};
use crate::error::AppError;
use crate::models::TaskListIndex;

/// Adds `name` to the index, creating the index document on first use.
/// Returns whether the index changed.
///
/// Both this and [`maybe_remove`] run as one transaction under the connection
/// lock and decide from the stored tasks, so the index ends up the same
/// whichever order background updates land in.
pub fn register(pool: &DbPool, name: &str) -> Result<bool, AppError> {
    if name.is_empty() {
        return Ok(false);
    }

    let mut conn = lock(pool)?;
    let tx = conn.transaction()?;

    // a late update for a list whose tasks are already gone
    if !task_list_in_use(&tx, name)? {
        return Ok(false);
    }

    let changed = match load_task_list_index(&tx)? {
        None => {
            insert_task_list_index(
                &tx,
                &TaskListIndex {
                    all_task_lists: true,
                    task_lists: vec![name.to_string()],
                },
            )?;
            true
        }
        Some((_, index)) if index.task_lists.iter().any(|list| list == name) => false,
        Some((id, mut index)) => {
            index.task_lists.push(name.to_string());
            save_task_list_index(&tx, &id, &index)?;
            true
        }
    };

    tx.commit()?;
    Ok(changed)
}

/// Drops `name` from the index unless some task still belongs to it.
/// Returns whether the index changed.
pub fn maybe_remove(pool: &DbPool, name: &str) -> Result<bool, AppError> {
    if name.is_empty() {
        return Ok(false);
    }

    let mut conn = lock(pool)?;
    let tx = conn.transaction()?;

    if task_list_in_use(&tx, name)? {
        return Ok(false);
    }

    let changed = match load_task_list_index(&tx)? {
        Some((id, mut index)) if index.task_lists.iter().any(|list| list == name) => {
            index.task_lists.retain(|list| list != name);
            save_task_list_index(&tx, &id, &index)?;
            true
        }
        _ => false,
    };

    tx.commit()?;
    Ok(changed)
}

/// Lists every registered task list name, treating any failure as empty.
pub fn all(pool: &DbPool) -> Vec<String> {
    match find_task_list_index(pool) {
        Ok(Some(index)) => index.task_lists,
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read task list index");
            Vec::new()
        }
    }
}

/// What a finished task mutation means for the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexUpdate {
    Register(String),
    MaybeRemove(String),
}

/// Applies index updates in the background, in order. The caller's response
/// never waits on them and failures are only logged.
pub fn spawn_updates(db: &Database, updates: Vec<IndexUpdate>) {
    let db = db.clone();
    tokio::spawn(async move {
        let pool = match db.pool() {
            Ok(pool) => pool,
            Err(err) => {
                warn!(error = %err, "Skipping task list index update");
                return;
            }
        };

        for update in updates {
            let result = match &update {
                IndexUpdate::Register(name) => register(pool, name),
                IndexUpdate::MaybeRemove(name) => maybe_remove(pool, name),
            };
            match result {
                Ok(changed) => debug!(?update, changed, "Applied task list index update"),
                Err(err) => warn!(?update, error = %err, "Task list index update failed"),
            }
        }
    });
}
