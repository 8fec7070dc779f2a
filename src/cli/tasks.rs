use super::context::{confirm, Context};
use super::projects::day_start;
use crate::api::kanban;
use crate::display::{self, Table};
use crate::error::Result;
use crate::managers::BoardManager;
use crate::models::{Column, Task, TaskInput, TaskPriority, TasksFilter};
use chrono::NaiveDate;
use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum TasksCommand {
    /// Tasks grouped by column
    #[command(visible_alias = "ls")]
    List(ListArgs),

    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    Create(CreateArgs),

    /// Move a task to a column and position
    #[command(visible_alias = "mv")]
    Move {
        task_id: String,

        /// Target column id
        #[arg(long, short)]
        column: String,

        /// Zero-based position within the column
        #[arg(long, short, default_value = "0")]
        position: i32,
    },

    Delete {
        id: String,

        #[arg(long, short)]
        yes: bool,
    },

    /// Board columns in order
    Columns {
        #[arg(long)]
        json: bool,
    },

    /// Add a comment to a task
    Comment { id: String, content: String },
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub column: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub priority: Option<TaskPriority>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    pub title: String,

    #[arg(long, short)]
    pub column: String,

    #[arg(long, short)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<TaskPriority>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub due: Option<NaiveDate>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long = "label")]
    pub labels: Vec<String>,
}

pub async fn run(cmd: TasksCommand) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = dispatch(&ctx, cmd).await;
    ctx.settle(result).await
}

async fn dispatch(ctx: &Context, cmd: TasksCommand) -> Result<()> {
    let client = &ctx.client;

    match cmd {
        TasksCommand::List(args) => {
            let filter = TasksFilter {
                column_id: args.column,
                project_id: args.project,
                assignee_id: args.assignee,
                priority: args.priority,
            };
            let (columns, tasks) = tokio::try_join!(
                kanban::columns(client),
                kanban::tasks(client, Some(&filter)),
            )?;
            if args.json {
                return display::print_json(&tasks);
            }
            print_board(&columns, &tasks);
        }
        TasksCommand::Show { id, json } => {
            let task = kanban::task(client, &id).await?;
            if json {
                return display::print_json(&task);
            }
            print_task(&task);
        }
        TasksCommand::Create(args) => {
            let task = kanban::create_task(
                client,
                TaskInput {
                    column_id: Some(args.column),
                    title: args.title,
                    description: args.description,
                    priority: args.priority,
                    due_date: args.due.map(day_start),
                    assignee_id: args.assignee,
                    project_id: args.project,
                    label_ids: args.labels,
                    ..Default::default()
                },
            )
            .await?;
            println!("Created task {} ({})", task.title, task.id);
        }
        TasksCommand::Move {
            task_id,
            column,
            position,
        } => {
            let board = BoardManager::load(client.clone(), None).await?;
            match board.move_task(&task_id, &column, position).await? {
                Some(placement) => println!(
                    "Moved {} to {} at position {}",
                    task_id, placement.column_id, placement.position
                ),
                None => println!("{} is already there", task_id),
            }
        }
        TasksCommand::Delete { id, yes } => {
            let task = kanban::task(client, &id).await?;
            if !confirm(&format!("Delete task \"{}\"?", task.title), yes)? {
                return Ok(());
            }
            kanban::delete_task(client, &id).await?;
            println!("Deleted task {}", task.id);
        }
        TasksCommand::Columns { json } => {
            let mut columns = kanban::columns(client).await?;
            columns.sort_by_key(|c| c.position);
            if json {
                return display::print_json(&columns);
            }
            let mut table = Table::new(&["ID", "NAME", "POSITION", "WIP LIMIT"]);
            for column in &columns {
                table.row(vec![
                    column.id.clone(),
                    column.name.clone(),
                    column.position.to_string(),
                    column.wip_limit.map(|l| l.to_string()).unwrap_or_default(),
                ]);
            }
            table.print();
        }
        TasksCommand::Comment { id, content } => {
            let comment = kanban::add_comment(client, &id, &content).await?;
            println!("Added comment {}", comment.id);
        }
    }
    Ok(())
}

/// Tasks of each column, ordered by position; tasks with unknown columns come last
fn group_by_column<'a>(columns: &'a [Column], tasks: &'a [Task]) -> Vec<(Option<&'a Column>, Vec<&'a Task>)> {
    let mut ordered: Vec<&Column> = columns.iter().collect();
    ordered.sort_by_key(|c| c.position);

    let mut groups: Vec<(Option<&Column>, Vec<&Task>)> = ordered
        .into_iter()
        .map(|column| {
            let mut in_column: Vec<&Task> = tasks
                .iter()
                .filter(|t| t.column_id.as_deref() == Some(column.id.as_str()))
                .collect();
            in_column.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
            (Some(column), in_column)
        })
        .collect();

    let orphans: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            !columns
                .iter()
                .any(|c| t.column_id.as_deref() == Some(c.id.as_str()))
        })
        .collect();
    if !orphans.is_empty() {
        groups.push((None, orphans));
    }
    groups
}

fn print_board(columns: &[Column], tasks: &[Task]) {
    for (column, tasks) in group_by_column(columns, tasks) {
        let heading = column.map(|c| c.name.as_str()).unwrap_or("(no column)");
        println!("{} {}", display::bold(heading), display::muted(&format!("({})", tasks.len())));
        for task in tasks {
            let priority = task.priority.map(|p| format!(" [{}]", p)).unwrap_or_default();
            println!("  {} {}{}", display::muted(&task.id), task.title, priority);
        }
    }
}

fn print_task(task: &Task) {
    println!("{}", display::bold(&task.title));
    println!("  ID:       {}", task.id);
    println!("  Column:   {}", task.column_id.as_deref().unwrap_or("-"));
    if let Some(priority) = task.priority {
        println!("  Priority: {}", priority);
    }
    if let Some(project) = &task.project {
        println!("  Project:  {}", project.name);
    }
    if let Some(assignee) = &task.assignee {
        println!("  Assignee: {}", assignee.name);
    }
    if task.due_date.is_some() {
        println!("  Due:      {}", display::date(task.due_date));
    }
    if !task.labels.is_empty() {
        let labels: Vec<&str> = task.labels.iter().map(|l| l.name.as_str()).collect();
        println!("  Labels:   {}", labels.join(", "));
    }
    if let Some(description) = &task.description {
        println!("\n{}", description);
    }
    for comment in &task.comments {
        let author = comment.author.as_ref().map(|a| a.name.as_str()).unwrap_or("?");
        println!("\n{} {}", display::bold(author), display::muted(&display::date(comment.created_at)));
        println!("  {}", comment.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(id: &str, position: i32) -> Column {
        serde_json::from_value(json!({ "id": id, "name": id.to_uppercase(), "position": position })).unwrap()
    }

    fn task(id: &str, column: Option<&str>, position: i32) -> Task {
        serde_json::from_value(json!({
            "id": id,
            "title": format!("Task {}", id),
            "position": position,
            "columnId": column
        }))
        .unwrap()
    }

    #[test]
    fn groups_follow_column_and_task_positions() {
        let columns = vec![column("done", 1), column("todo", 0)];
        let tasks = vec![
            task("a", Some("todo"), 1),
            task("b", Some("todo"), 0),
            task("c", Some("done"), 0),
            task("d", Some("gone"), 0),
        ];

        let groups = group_by_column(&columns, &tasks);
        let names: Vec<Option<&str>> = groups.iter().map(|(c, _)| c.map(|c| c.id.as_str())).collect();
        assert_eq!(names, vec![Some("todo"), Some("done"), None]);

        let todo: Vec<&str> = groups[0].1.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(todo, vec!["b", "a"]);
        assert_eq!(groups[2].1[0].id, "d");
    }

    #[test]
    fn no_orphan_group_when_every_task_has_a_column() {
        let columns = vec![column("todo", 0)];
        let tasks = vec![task("a", Some("todo"), 0)];
        assert_eq!(group_by_column(&columns, &tasks).len(), 1);
    }
}
