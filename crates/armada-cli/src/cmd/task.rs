use crate::output::{print_json, print_table};
use anyhow::Context;
use armada_core::paths;
use armada_core::queue::{PendingTask, TaskDb, TaskState};
use clap::Subcommand;
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Enqueue a pending task
    Enqueue {
        /// Resource the task concerns
        subject: String,
        /// Task discriminator, e.g. delete-site
        task_type: String,
        /// Action the runner invokes, e.g. dispatch
        action_key: String,
        /// JSON argument map needed to resume the task
        #[arg(long)]
        payload: Option<String>,
        /// Create in not-ready (waiting on a prerequisite) instead of ready
        #[arg(long)]
        not_ready: bool,
        /// Related resource, e.g. the server a site lives on
        #[arg(long)]
        associated: Option<String>,
        /// Human-readable audit text
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List tasks, oldest first
    List {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        task_type: Option<String>,
    },
    /// Show one task
    Get { id: String },
    /// Operator override: return a task to ready
    ForceReady { id: String },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::Enqueue {
            subject,
            task_type,
            action_key,
            payload,
            not_ready,
            associated,
            description,
        } => enqueue(
            root,
            &subject,
            &task_type,
            &action_key,
            payload.as_deref(),
            not_ready,
            associated,
            &description,
            json,
        ),
        TaskSubcommand::List {
            subject,
            state,
            task_type,
        } => list(
            root,
            subject.as_deref(),
            state.as_deref(),
            task_type.as_deref(),
            json,
        ),
        TaskSubcommand::Get { id } => get(root, &id, json),
        TaskSubcommand::ForceReady { id } => force_ready(root, &id, json),
    }
}

fn open_db(root: &Path) -> anyhow::Result<TaskDb> {
    TaskDb::open(&paths::queue_db_path(root)).context("failed to open task queue")
}

fn parse_id(raw: &str) -> anyhow::Result<Uuid> {
    raw.parse::<Uuid>()
        .with_context(|| format!("malformed task id '{raw}'"))
}

#[allow(clippy::too_many_arguments)]
fn enqueue(
    root: &Path,
    subject: &str,
    task_type: &str,
    action_key: &str,
    payload: Option<&str>,
    not_ready: bool,
    associated: Option<String>,
    description: &str,
    json: bool,
) -> anyhow::Result<()> {
    let payload: serde_json::Value = match payload {
        Some(raw) => serde_json::from_str(raw).context("--payload is not valid JSON")?,
        None => serde_json::json!({}),
    };
    let initial_state = if not_ready {
        TaskState::NotReady
    } else {
        TaskState::Ready
    };

    let task = PendingTask::new(
        subject,
        task_type,
        action_key,
        payload,
        initial_state,
        associated,
        description,
    )?;
    open_db(root)?.insert(&task)?;

    if json {
        print_json(&task)?;
    } else {
        println!("Enqueued task {} ({})", task.id, task.state);
    }
    Ok(())
}

fn list(
    root: &Path,
    subject: Option<&str>,
    state: Option<&str>,
    task_type: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let state = match state {
        Some(raw) => Some(raw.parse::<TaskState>()?),
        None => None,
    };
    let tasks = open_db(root)?.find(subject, state, task_type)?;

    if json {
        print_json(&tasks)?;
    } else {
        let rows = tasks
            .iter()
            .map(|t| {
                vec![
                    t.id.to_string(),
                    t.subject_resource_id.clone(),
                    t.task_type.clone(),
                    t.state.to_string(),
                    t.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "SUBJECT", "TYPE", "STATE", "UPDATED"], rows);
    }
    Ok(())
}

fn get(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let task = open_db(root)?.get(parse_id(id)?)?;

    if json {
        print_json(&task)?;
    } else {
        println!("{} [{}]", task.id, task.state);
        println!("  subject:     {}", task.subject_resource_id);
        println!("  type:        {}", task.task_type);
        println!("  action:      {}", task.action_key);
        if let Some(associated) = &task.associated_resource_id {
            println!("  associated:  {associated}");
        }
        if !task.description.is_empty() {
            println!("  description: {}", task.description);
        }
        if let Some(message) = &task.result_message {
            println!("  result:      {message}");
        }
    }
    Ok(())
}

fn force_ready(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let task = open_db(root)?.force_ready(parse_id(id)?)?;

    if json {
        print_json(&task)?;
    } else {
        println!("Task {} forced back to ready", task.id);
    }
    Ok(())
}
