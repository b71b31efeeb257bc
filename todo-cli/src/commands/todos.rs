use anyhow::{Result, bail};
use clap::Subcommand;
use client::{TodoBoard, TodoError};
use shared::models::{Todo, TodoCreate, TodoUpdate};

use super::context::{AppContext, report_invalid};

#[derive(Subcommand, Debug)]
pub enum TodoCommand {
    /// Show every todo, newest first
    List,

    /// Add a todo
    Add {
        /// Short title (at least 2 characters)
        title: String,

        /// Optional details (up to 280 characters)
        #[arg(long, short)]
        description: Option<String>,
    },

    /// Change the title or description of a todo
    Edit {
        id: String,

        #[arg(long, short)]
        title: Option<String>,

        /// New details; an empty value removes them
        #[arg(long, short)]
        description: Option<String>,
    },

    /// Flip a todo between open and completed
    Toggle { id: String },

    /// Mark a todo completed
    Done { id: String },

    /// Delete a todo
    Rm { id: String },
}

pub async fn run(ctx: &mut AppContext, command: TodoCommand) -> Result<()> {
    if let TodoCommand::Edit {
        title: None,
        description: None,
        ..
    } = command
    {
        bail!("nothing to update; pass --title or --description");
    }
    ctx.require_session().await?;
    let mut board = TodoBoard::for_session(&ctx.session);

    let result = execute(&mut board, command).await;
    ctx.settle().await;
    result.map_err(explain)
}

async fn execute(board: &mut TodoBoard, command: TodoCommand) -> Result<(), TodoError> {
    match command {
        TodoCommand::List => {
            let todos = board.refresh().await?;
            if todos.is_empty() {
                println!("No todos yet.");
            }
            for todo in todos {
                print_todo(todo);
            }
        }
        TodoCommand::Add { title, description } => {
            let mut draft = TodoCreate::new(title);
            draft.description = description;
            print_todo(board.create(draft).await?);
        }
        TodoCommand::Edit {
            id,
            title,
            description,
        } => {
            let patch = TodoUpdate {
                title,
                description: description.map(Some),
                is_completed: None,
            };
            print_todo(board.update(&id, patch).await?);
        }
        TodoCommand::Toggle { id } => {
            board.refresh().await?;
            print_todo(board.toggle(&id).await?);
        }
        TodoCommand::Done { id } => print_todo(board.complete(&id).await?),
        TodoCommand::Rm { id } => board.remove(&id).await?,
    }
    Ok(())
}

fn explain(err: TodoError) -> anyhow::Error {
    match err {
        TodoError::Validation(errors) => report_invalid(&errors),
        TodoError::Api(api) if api.is_unauthorized() => {
            anyhow::anyhow!("session expired; run `todo login` to sign in again")
        }
        other => anyhow::Error::new(other).context("todo request failed"),
    }
}

fn print_todo(todo: &Todo) {
    let mark = if todo.is_completed { 'x' } else { ' ' };
    println!("[{mark}] {} ({})", todo.title, todo.id);
    if let Some(description) = todo.description.as_deref() {
        println!("    {description}");
    }
}
