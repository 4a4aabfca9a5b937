use crate::api::ApiClient;
use crate::error::ApiError;
use crate::forms::TaskSubmission;
use crate::models::{CreateTaskRequest, Task, TaskStatus, UpdateTaskRequest};
use tracing::{info, warn};

/// A mutation issued from the task screen.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOp {
    Create(CreateTaskRequest),
    Update { id: String, request: UpdateTaskRequest },
    Toggle(Task),
    Delete { id: String },
}

impl From<TaskSubmission> for TaskOp {
    fn from(submission: TaskSubmission) -> Self {
        match submission {
            TaskSubmission::Create(request) => TaskOp::Create(request),
            TaskSubmission::Update { id, request } => TaskOp::Update { id, request },
        }
    }
}

impl TaskOp {
    pub fn success_message(&self) -> &'static str {
        match self {
            TaskOp::Create(_) => "Task created",
            TaskOp::Update { .. } => "Task updated",
            TaskOp::Toggle(task) => match task.status.toggled() {
                TaskStatus::Completed => "Task marked as completed",
                TaskStatus::Pending => "Task marked as pending",
            },
            TaskOp::Delete { .. } => "Task deleted",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            TaskOp::Create(_) => "Failed to create task",
            TaskOp::Update { .. } => "Failed to update task",
            TaskOp::Toggle(_) => "Failed to change task status",
            TaskOp::Delete { .. } => "Failed to delete task",
        }
    }
}

/// Result of `run_op`: the mutation and, when it succeeded, the refetch.
#[derive(Debug)]
pub struct OpOutcome {
    pub op: TaskOp,
    pub result: Result<Result<Vec<Task>, ApiError>, ApiError>,
}

/// What applying an outcome means for the user.
#[derive(Debug, PartialEq)]
pub enum Applied {
    Done(&'static str),
    MutationFailed { context: &'static str, message: String },
    RefreshFailed { context: &'static str, message: String },
}

pub async fn fetch_tasks(api: &ApiClient) -> Result<Vec<Task>, ApiError> {
    api.list_tasks().await
}

/// Issues `op` and, only if it succeeds, refetches the whole list.
pub async fn run_op(api: &ApiClient, op: TaskOp) -> OpOutcome {
    let mutation = match &op {
        TaskOp::Create(request) => api.create_task(request).await.map(drop),
        TaskOp::Update { id, request } => api.update_task(id, request).await.map(drop),
        TaskOp::Toggle(task) => api
            .update_task(&task.id, &UpdateTaskRequest::toggle_status(task))
            .await
            .map(drop),
        TaskOp::Delete { id } => api.delete_task(id).await,
    };

    let result = match mutation {
        Ok(()) => Ok(fetch_tasks(api).await),
        Err(err) => Err(err),
    };
    OpOutcome { op, result }
}

/// Client-side copy of the user's tasks, replaced wholesale on every fetch.
#[derive(Debug, Default)]
pub struct TaskView {
    tasks: Vec<Task>,
    in_flight: usize,
    pub show_completed: bool,
}

impl TaskView {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn pending(&self) -> Vec<&Task> {
        self.partition(TaskStatus::Pending)
    }

    pub fn completed(&self) -> Vec<&Task> {
        self.partition(TaskStatus::Completed)
    }

    fn partition(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    /// True while any fetch or mutation is still outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn begin(&mut self) {
        self.in_flight += 1;
    }

    fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Replaces the list. A failed fetch empties it.
    pub fn apply_fetch(&mut self, result: Result<Vec<Task>, ApiError>) -> Result<(), ApiError> {
        self.finish();
        match result {
            Ok(tasks) => {
                info!(count = tasks.len(), "task list refreshed");
                self.tasks = tasks;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch tasks");
                self.tasks.clear();
                Err(err)
            }
        }
    }

    pub fn apply(&mut self, outcome: OpOutcome) -> Applied {
        match outcome.result {
            Err(err) => {
                self.finish();
                warn!(op = ?outcome.op, error = %err, "task mutation failed");
                Applied::MutationFailed {
                    context: outcome.op.failure_message(),
                    message: err.user_message(),
                }
            }
            Ok(fetched) => match self.apply_fetch(fetched) {
                Ok(()) => Applied::Done(outcome.op.success_message()),
                Err(err) => Applied::RefreshFailed {
                    context: "Failed to load tasks",
                    message: err.user_message(),
                },
            },
        }
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.in_flight = 0;
        self.show_completed = false;
    }
}
