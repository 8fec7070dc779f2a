//! Kanban boards, columns, tasks, labels and comments.

use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{
    Board, BoardInput, Column, ColumnInput, ColumnOrder, Label, LabelInput, MoveTaskInput, Task,
    TaskComment, TaskInput, TaskPlacement, TasksFilter,
};
use serde_json::json;

pub const BOARDS: &str = r#"
query Boards {
  boards { id name slug description }
}"#;

pub const BOARD: &str = r#"
query Board($id: ID!) {
  board(id: $id) {
    id name slug description
    columns {
      id name color position wipLimit
      tasks {
        id title description priority position dueDate columnId projectId
        assignee { id name avatarUrl }
        labels { id name color }
      }
    }
  }
}"#;

pub const COLUMNS: &str = r#"
query Columns {
  columns {
    id name color position wipLimit
    createdBy { id name avatarUrl }
  }
}"#;

pub const COLUMN: &str = r#"
query GetColumn($id: ID!) {
  column(id: $id) { id name color position }
}"#;

pub const TASKS: &str = r#"
query Tasks($filter: TasksFilterInput) {
  tasks(filter: $filter) {
    id title description priority position dueDate columnId projectId
    project { id name color }
    assigneeId createdAt
    createdBy { id name avatarUrl }
    updatedBy { id name avatarUrl }
  }
}"#;

pub const TASK: &str = r#"
query GetTask($id: ID!) {
  task(id: $id) {
    id title description priority position dueDate columnId projectId
    project { id name color }
    labels { id name color }
    comments { id content author { id name } createdAt }
    createdAt updatedAt
    createdBy { id name avatarUrl }
    updatedBy { id name avatarUrl }
  }
}"#;

pub const LABELS: &str = r#"
query Labels {
  labels { id name color createdAt createdBy { id name avatarUrl } }
}"#;

pub const TASK_COMMENTS: &str = r#"
query TaskComments($taskId: ID!) {
  taskComments(taskId: $taskId) {
    id content author { id name avatarUrl } createdAt updatedAt
  }
}"#;

pub const CREATE_BOARD: &str = r#"
mutation CreateBoard($input: CreateBoardInput!) {
  createBoard(input: $input) { id name slug }
}"#;

pub const UPDATE_BOARD: &str = r#"
mutation UpdateBoard($input: UpdateBoardInput!) {
  updateBoard(input: $input) { id name description }
}"#;

pub const DELETE_BOARD: &str = r#"
mutation DeleteBoard($boardId: ID!) {
  deleteBoard(boardId: $boardId)
}"#;

pub const CREATE_COLUMN: &str = r#"
mutation CreateColumn($input: CreateColumnInput!) {
  createColumn(input: $input) { id name color position wipLimit }
}"#;

pub const UPDATE_COLUMN: &str = r#"
mutation UpdateColumn($input: UpdateColumnInput!) {
  updateColumn(input: $input) { id name color wipLimit }
}"#;

pub const REORDER_COLUMNS: &str = r#"
mutation ReorderColumns($input: ReorderColumnsInput!) {
  reorderColumns(input: $input) { id columns { id position } }
}"#;

pub const DELETE_COLUMN: &str = r#"
mutation DeleteColumn($columnId: ID!) {
  deleteColumn(columnId: $columnId)
}"#;

pub const CREATE_TASK: &str = r#"
mutation CreateTask($input: CreateTaskInput!) {
  createTask(input: $input) {
    id title description priority position dueDate estimatedHours
    assignee { id name avatarUrl }
    labels { id name color }
  }
}"#;

pub const UPDATE_TASK: &str = r#"
mutation UpdateTask($input: UpdateTaskInput!) {
  updateTask(input: $input) {
    id title description priority dueDate estimatedHours
    assignee { id name avatarUrl }
    labels { id name color }
  }
}"#;

pub const MOVE_TASK: &str = r#"
mutation MoveTask($input: MoveTaskInput!) {
  moveTask(input: $input) { id columnId position }
}"#;

pub const DELETE_TASK: &str = r#"
mutation DeleteTask($taskId: ID!) {
  deleteTask(taskId: $taskId)
}"#;

pub const CREATE_LABEL: &str = r#"
mutation CreateLabel($input: CreateLabelInput!) {
  createLabel(input: $input) { id name color }
}"#;

pub const UPDATE_LABEL: &str = r#"
mutation UpdateLabel($input: UpdateLabelInput!) {
  updateLabel(input: $input) { id name color }
}"#;

pub const DELETE_LABEL: &str = r#"
mutation DeleteLabel($labelId: ID!) {
  deleteLabel(labelId: $labelId)
}"#;

pub const ADD_TASK_COMMENT: &str = r#"
mutation AddTaskComment($input: AddCommentInput!) {
  addTaskComment(input: $input) {
    id content author { id name avatarUrl } createdAt
  }
}"#;

pub const UPDATE_TASK_COMMENT: &str = r#"
mutation UpdateTaskComment($input: UpdateCommentInput!) {
  updateTaskComment(input: $input) { id content updatedAt }
}"#;

pub const DELETE_TASK_COMMENT: &str = r#"
mutation DeleteTaskComment($commentId: ID!) {
  deleteTaskComment(commentId: $commentId)
}"#;

// Boards

pub async fn boards(client: &ApiClient) -> Result<Vec<Board>> {
    client.query(BOARDS, "Boards", json!({}), "boards").await
}

/// A board with its columns and their tasks, each ordered by position
pub async fn board(client: &ApiClient, id: &str) -> Result<Board> {
    let board: Option<Board> = client
        .query(BOARD, "Board", json!({ "id": id }), "board")
        .await?;
    let mut board = board.ok_or_else(|| Error::NotFound {
        what: format!("Board {}", id),
    })?;
    board.columns.sort_by_key(|c| c.position);
    for column in &mut board.columns {
        column.tasks.sort_by_key(|t| t.position);
    }
    Ok(board)
}

pub async fn create_board(client: &ApiClient, input: BoardInput) -> Result<Board> {
    require_name(&input.name)?;
    client
        .query(CREATE_BOARD, "CreateBoard", json!({ "input": input }), "createBoard")
        .await
}

pub async fn update_board(client: &ApiClient, input: BoardInput) -> Result<Board> {
    require_name(&input.name)?;
    client
        .query(UPDATE_BOARD, "UpdateBoard", json!({ "input": input }), "updateBoard")
        .await
}

pub async fn delete_board(client: &ApiClient, board_id: &str) -> Result<bool> {
    client
        .query(DELETE_BOARD, "DeleteBoard", json!({ "boardId": board_id }), "deleteBoard")
        .await
}

// Columns

pub async fn columns(client: &ApiClient) -> Result<Vec<Column>> {
    let mut columns: Vec<Column> = client.query(COLUMNS, "Columns", json!({}), "columns").await?;
    columns.sort_by_key(|c| c.position);
    Ok(columns)
}

pub async fn column(client: &ApiClient, id: &str) -> Result<Column> {
    let column: Option<Column> = client
        .query(COLUMN, "GetColumn", json!({ "id": id }), "column")
        .await?;
    column.ok_or_else(|| Error::NotFound {
        what: format!("Column {}", id),
    })
}

pub async fn create_column(client: &ApiClient, input: ColumnInput) -> Result<Column> {
    require_name(&input.name)?;
    client
        .query(CREATE_COLUMN, "CreateColumn", json!({ "input": input }), "createColumn")
        .await
}

pub async fn update_column(client: &ApiClient, input: ColumnInput) -> Result<Column> {
    require_name(&input.name)?;
    client
        .query(UPDATE_COLUMN, "UpdateColumn", json!({ "input": input }), "updateColumn")
        .await
}

/// `column_ids` in their new left-to-right order
pub async fn reorder_columns(
    client: &ApiClient,
    board_id: &str,
    column_ids: &[String],
) -> Result<ColumnOrder> {
    client
        .query(
            REORDER_COLUMNS,
            "ReorderColumns",
            json!({ "input": { "boardId": board_id, "columnIds": column_ids } }),
            "reorderColumns",
        )
        .await
}

pub async fn delete_column(client: &ApiClient, column_id: &str) -> Result<bool> {
    client
        .query(
            DELETE_COLUMN,
            "DeleteColumn",
            json!({ "columnId": column_id }),
            "deleteColumn",
        )
        .await
}

// Tasks

pub async fn tasks(client: &ApiClient, filter: Option<&TasksFilter>) -> Result<Vec<Task>> {
    let mut tasks: Vec<Task> = client
        .query(TASKS, "Tasks", json!({ "filter": filter }), "tasks")
        .await?;
    tasks.sort_by(|a, b| {
        a.column_id
            .cmp(&b.column_id)
            .then(a.position.cmp(&b.position))
    });
    Ok(tasks)
}

pub async fn task(client: &ApiClient, id: &str) -> Result<Task> {
    let task: Option<Task> = client
        .query(TASK, "GetTask", json!({ "id": id }), "task")
        .await?;
    task.ok_or_else(|| Error::NotFound {
        what: format!("Task {}", id),
    })
}

pub async fn create_task(client: &ApiClient, input: TaskInput) -> Result<Task> {
    if input.title.trim().is_empty() {
        return Err(Error::validation("title", "must not be empty"));
    }
    if input.column_id.is_none() {
        return Err(Error::validation("columnId", "required to create a task"));
    }
    client
        .query(CREATE_TASK, "CreateTask", json!({ "input": input }), "createTask")
        .await
}

pub async fn update_task(client: &ApiClient, input: TaskInput) -> Result<Task> {
    if input.task_id.is_none() {
        return Err(Error::validation("taskId", "required for update"));
    }
    client
        .query(UPDATE_TASK, "UpdateTask", json!({ "input": input }), "updateTask")
        .await
}

pub async fn move_task(client: &ApiClient, input: &MoveTaskInput) -> Result<TaskPlacement> {
    if input.new_position < 0 {
        return Err(Error::validation("newPosition", "must not be negative"));
    }
    client
        .query(MOVE_TASK, "MoveTask", json!({ "input": input }), "moveTask")
        .await
}

pub async fn delete_task(client: &ApiClient, task_id: &str) -> Result<bool> {
    client
        .query(DELETE_TASK, "DeleteTask", json!({ "taskId": task_id }), "deleteTask")
        .await
}

// Labels

pub async fn labels(client: &ApiClient) -> Result<Vec<Label>> {
    client.query(LABELS, "Labels", json!({}), "labels").await
}

pub async fn create_label(client: &ApiClient, input: LabelInput) -> Result<Label> {
    require_name(&input.name)?;
    client
        .query(CREATE_LABEL, "CreateLabel", json!({ "input": input }), "createLabel")
        .await
}

pub async fn update_label(client: &ApiClient, input: LabelInput) -> Result<Label> {
    require_name(&input.name)?;
    client
        .query(UPDATE_LABEL, "UpdateLabel", json!({ "input": input }), "updateLabel")
        .await
}

pub async fn delete_label(client: &ApiClient, label_id: &str) -> Result<bool> {
    client
        .query(DELETE_LABEL, "DeleteLabel", json!({ "labelId": label_id }), "deleteLabel")
        .await
}

// Comments

pub async fn task_comments(client: &ApiClient, task_id: &str) -> Result<Vec<TaskComment>> {
    client
        .query(
            TASK_COMMENTS,
            "TaskComments",
            json!({ "taskId": task_id }),
            "taskComments",
        )
        .await
}

pub async fn add_comment(client: &ApiClient, task_id: &str, content: &str) -> Result<TaskComment> {
    require_content(content)?;
    client
        .query(
            ADD_TASK_COMMENT,
            "AddTaskComment",
            json!({ "input": { "taskId": task_id, "content": content } }),
            "addTaskComment",
        )
        .await
}

pub async fn update_comment(
    client: &ApiClient,
    comment_id: &str,
    content: &str,
) -> Result<TaskComment> {
    require_content(content)?;
    client
        .query(
            UPDATE_TASK_COMMENT,
            "UpdateTaskComment",
            json!({ "input": { "commentId": comment_id, "content": content } }),
            "updateTaskComment",
        )
        .await
}

pub async fn delete_comment(client: &ApiClient, comment_id: &str) -> Result<bool> {
    client
        .query(
            DELETE_TASK_COMMENT,
            "DeleteTaskComment",
            json!({ "commentId": comment_id }),
            "deleteTaskComment",
        )
        .await
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    Ok(())
}

fn require_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::validation("content", "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, FakeTransport};

    #[tokio::test]
    async fn board_is_ordered_by_position() {
        let transport = FakeTransport::new().respond(
            "Board",
            json!({ "board": {
                "id": "b1", "name": "Ops",
                "columns": [
                    { "id": "c2", "name": "Done", "position": 1, "tasks": [] },
                    { "id": "c1", "name": "Todo", "position": 0, "tasks": [
                        { "id": "t2", "title": "second", "position": 1 },
                        { "id": "t1", "title": "first", "position": 0 }
                    ]}
                ]
            }}),
        );
        let client = signed_in_client(transport).await;

        let board = board(&client, "b1").await.unwrap();
        assert_eq!(board.columns[0].id, "c1");
        let titles: Vec<_> = board.columns[0].tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[tokio::test]
    async fn move_task_sends_target_and_position() {
        let transport = FakeTransport::new().respond(
            "MoveTask",
            json!({ "moveTask": { "id": "t1", "columnId": "c2", "position": 2 } }),
        );
        let client = signed_in_client(transport.clone()).await;

        let placement = move_task(
            &client,
            &MoveTaskInput {
                task_id: "t1".into(),
                target_column_id: "c2".into(),
                new_position: 2,
            },
        )
        .await
        .unwrap();
        assert_eq!(placement.position, 2);

        let sent = transport.last("MoveTask").unwrap();
        assert_eq!(
            sent.variables["input"],
            json!({ "taskId": "t1", "targetColumnId": "c2", "newPosition": 2 })
        );
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let transport = FakeTransport::new();
        let client = signed_in_client(transport.clone()).await;
        assert!(add_comment(&client, "t1", "   ").await.is_err());
        assert_eq!(transport.count("AddTaskComment"), 0);
    }
}
