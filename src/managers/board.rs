//! Optimistic task placement on the kanban board.
//!
//! A move is applied locally before the server answers. Each tentative
//! placement carries the id of the request that made it; the server's
//! answer only lands if that request is still the latest one for the task,
//! so a slow response can never overwrite a newer move.

use crate::api::{kanban, ApiClient};
use crate::error::{Error, Result};
use crate::models::{MoveTaskInput, Task, TaskMovedEvent, TaskPlacement, TasksFilter};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub column_id: String,
    pub position: i32,
}

impl From<&TaskPlacement> for Placement {
    fn from(placement: &TaskPlacement) -> Self {
        Self {
            column_id: placement.column_id.clone(),
            position: placement.position,
        }
    }
}

/// Identity of one in-flight move request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTicket {
    pub task_id: String,
    request_id: u64,
}

#[derive(Debug, Clone)]
struct Tracked {
    task: Task,
    /// Last placement the server agreed to
    confirmed: Placement,
    pending: Option<(u64, Placement)>,
}

impl Tracked {
    fn effective(&self) -> &Placement {
        self.pending
            .as_ref()
            .map(|(_, placement)| placement)
            .unwrap_or(&self.confirmed)
    }
}

#[derive(Debug, Default)]
pub struct BoardState {
    tasks: HashMap<String, Tracked>,
    next_request: u64,
}

impl BoardState {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut state = Self::default();
        for task in tasks {
            state.upsert(task);
        }
        state
    }

    /// Insert or replace a task with its server-side placement
    pub fn upsert(&mut self, task: Task) {
        let confirmed = Placement {
            column_id: task.column_id.clone().unwrap_or_default(),
            position: task.position,
        };
        let pending = self.tasks.remove(&task.id).and_then(|t| t.pending);
        self.tasks.insert(
            task.id.clone(),
            Tracked {
                task,
                confirmed,
                pending,
            },
        );
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        self.tasks.remove(task_id).map(|t| t.task)
    }

    /// Apply a tentative placement. `None` when the task is already there.
    pub fn begin_move(&mut self, task_id: &str, column_id: &str, position: i32) -> Result<Option<MoveTicket>> {
        let tracked = self.tasks.get_mut(task_id).ok_or_else(|| Error::NotFound {
            what: format!("Task {}", task_id),
        })?;

        let target = Placement {
            column_id: column_id.to_string(),
            position,
        };
        if *tracked.effective() == target {
            return Ok(None);
        }

        self.next_request += 1;
        let request_id = self.next_request;
        tracked.pending = Some((request_id, target));
        Ok(Some(MoveTicket {
            task_id: task_id.to_string(),
            request_id,
        }))
    }

    /// Adopt the server's placement if `ticket` is still the latest move
    pub fn confirm(&mut self, ticket: &MoveTicket, placement: &TaskPlacement) -> bool {
        let Some(tracked) = self.current(ticket) else {
            return false;
        };
        tracked.confirmed = Placement::from(placement);
        tracked.pending = None;
        true
    }

    /// Roll back to the last confirmed placement if `ticket` is still current
    pub fn reject(&mut self, ticket: &MoveTicket) -> bool {
        let Some(tracked) = self.current(ticket) else {
            return false;
        };
        tracked.pending = None;
        true
    }

    /// A move made elsewhere; local tentative moves still win until settled
    pub fn apply_remote(&mut self, event: &TaskMovedEvent) {
        if let Some(tracked) = self.tasks.get_mut(&event.id) {
            tracked.confirmed = Placement {
                column_id: event.column_id.clone(),
                position: event.position,
            };
        }
    }

    fn current(&mut self, ticket: &MoveTicket) -> Option<&mut Tracked> {
        self.tasks
            .get_mut(&ticket.task_id)
            .filter(|t| matches!(t.pending, Some((id, _)) if id == ticket.request_id))
    }

    pub fn placement(&self, task_id: &str) -> Option<&Placement> {
        self.tasks.get(task_id).map(Tracked::effective)
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        self.tasks.get(task_id).is_some_and(|t| t.pending.is_some())
    }

    /// Tasks of a column ordered by position; a task moved to an occupied
    /// position sorts ahead of the one already there
    pub fn column(&self, column_id: &str) -> Vec<Task> {
        let mut entries: Vec<&Tracked> = self
            .tasks
            .values()
            .filter(|t| t.effective().column_id == column_id)
            .collect();
        entries.sort_by(|a, b| {
            a.effective()
                .position
                .cmp(&b.effective().position)
                .then_with(|| b.pending.is_some().cmp(&a.pending.is_some()))
                .then_with(|| a.task.id.cmp(&b.task.id))
        });

        entries
            .into_iter()
            .map(|tracked| {
                let placement = tracked.effective();
                let mut task = tracked.task.clone();
                task.column_id = Some(placement.column_id.clone());
                task.position = placement.position;
                task
            })
            .collect()
    }
}

/// Board tasks plus the single request path for moving them
pub struct BoardManager {
    client: ApiClient,
    state: Mutex<BoardState>,
}

impl BoardManager {
    pub fn new(client: ApiClient, tasks: Vec<Task>) -> Self {
        Self {
            client,
            state: Mutex::new(BoardState::new(tasks)),
        }
    }

    pub async fn load(client: ApiClient, filter: Option<&TasksFilter>) -> Result<Self> {
        let tasks = kanban::tasks(&client, filter).await?;
        debug!(count = tasks.len(), "Loaded board tasks");
        Ok(Self::new(client, tasks))
    }

    /// Move optimistically, send one `moveTask`, then reconcile.
    /// `Ok(None)` when the task already sits at the target.
    #[instrument(skip(self))]
    pub async fn move_task(&self, task_id: &str, column_id: &str, position: i32) -> Result<Option<TaskPlacement>> {
        let Some(ticket) = self.state().begin_move(task_id, column_id, position)? else {
            debug!("Task already at target placement");
            return Ok(None);
        };

        let input = MoveTaskInput {
            task_id: task_id.to_string(),
            target_column_id: column_id.to_string(),
            new_position: position,
        };
        match kanban::move_task(&self.client, &input).await {
            Ok(placement) => {
                if !self.state().confirm(&ticket, &placement) {
                    debug!("Ignoring response to superseded move");
                }
                Ok(Some(placement))
            }
            Err(e) => {
                warn!(error = %e, "Move rejected, rolling back");
                self.state().reject(&ticket);
                Err(e)
            }
        }
    }

    pub fn column(&self, column_id: &str) -> Vec<Task> {
        self.state().column(column_id)
    }

    pub fn placement(&self, task_id: &str) -> Option<Placement> {
        self.state().placement(task_id).cloned()
    }

    pub fn apply_remote(&self, event: &TaskMovedEvent) {
        self.state().apply_remote(event);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
