use rusqlite::types::Value;

/// Recognized query parameters. Anything else in the query string is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub completed: Option<String>,
    pub due: Option<String>,
    pub item: Option<String>,
    pub recurrence: Option<String>,
    pub task_list: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Completed,
    Due,
    Item,
    Recurrence,
    TaskList,
}

impl TaskField {
    pub fn json_path(self) -> &'static str {
        match self {
            TaskField::Completed => "$.completed",
            TaskField::Due => "$.due",
            TaskField::Item => "$.item",
            TaskField::Recurrence => "$.recurrence",
            TaskField::TaskList => "$.taskList",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

/// Conjunction of exact-match conditions. An empty filter matches every task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub conditions: Vec<(TaskField, FieldValue)>,
}

impl TaskQuery {
    /// Collects raw query pairs. A repeated parameter keeps its last value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = TaskQuery::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "completed" => &mut query.completed,
                "due" => &mut query.due,
                "item" => &mut query.item,
                "recurrence" => &mut query.recurrence,
                "taskList" => &mut query.task_list,
                _ => continue,
            };
            *slot = Some(value);
        }
        query
    }
}

fn present(param: &Option<String>) -> Option<&str> {
    param.as_deref().filter(|value| !value.is_empty())
}

/// Turns the `GET /task` query parameters into a store filter. Empty values
/// count as absent.
pub fn build_filter(query: &TaskQuery) -> TaskFilter {
    let mut conditions = Vec::new();

    if let Some(completed) = present(&query.completed) {
        conditions.push((TaskField::Completed, FieldValue::Bool(completed != "false")));
    }

    let text_params = [
        (TaskField::Due, &query.due),
        (TaskField::Item, &query.item),
        (TaskField::Recurrence, &query.recurrence),
        (TaskField::TaskList, &query.task_list),
    ];
    for (field, param) in text_params {
        if let Some(value) = present(param) {
            conditions.push((field, FieldValue::Text(value.to_string())));
        }
    }

    TaskFilter { conditions }
}

impl TaskFilter {
    /// Renders the filter as a `WHERE` clause over the `body` column, always
    /// excluding the task list index document.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["json_extract(body, '$.allTaskLists') IS NULL".to_string()];
        let mut params = Vec::with_capacity(self.conditions.len());

        for (field, value) in &self.conditions {
            match value {
                // json_extract collapses true/false into 1/0; json_type keeps them apart.
                FieldValue::Bool(b) => {
                    clauses.push(format!(
                        "json_type(body, '{path}') = '{kind}'",
                        path = field.json_path(),
                        kind = if *b { "true" } else { "false" },
                    ));
                }
                FieldValue::Text(s) => {
                    clauses.push(format!(
                        "json_type(body, '{path}') = 'text' AND json_extract(body, '{path}') = ?",
                        path = field.json_path(),
                    ));
                    params.push(Value::Text(s.clone()));
                }
            }
        }

        (clauses.join(" AND "), params)
    }
}
