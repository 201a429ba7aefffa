use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use taskminder::{
    appsettings::AppSettings,
    cli::{Cli, Command, EmailCommand, normalize_email, parse_deadline},
    delivery::{
        DeliveryContext, DispatchSink, EmailTransport, MessageComposer, UnconfiguredTransport,
        Web3FormsTransport, notifier_for,
    },
    scheduling::{DeadlineScheduler, watch_state},
    storage::{JsonFileReminderLedger, TaskStore, TrackerState},
    task::{DeadlineStatus, Task, TaskList},
};
use tokio_util::sync::CancellationToken;

const APP_NAME: &str = "taskminder";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let cli = Cli::parse();
    let settings = AppSettings::new().context("Could not load settings")?;
    let store = TaskStore::new(settings.storage.state_path.clone());

    match cli.command {
        Command::Run => run(&settings, &store).await,
        Command::Add { text, deadline } => {
            let deadline = deadline
                .map(|input| parse_deadline(&input, settings.timezone()?))
                .transpose()?;
            let id = store.update(|state| {
                Ok(with_task_list(state, |tasks| {
                    tasks.add(text, deadline, Utc::now()).id.clone()
                }))
            })?;
            println!("Added task {id}");
            Ok(())
        }
        Command::Done { id } => {
            let completed = store.update(|state| {
                with_task_list(state, |tasks| tasks.toggle(&id).map(|task| task.completed))
                    .map_err(anyhow::Error::from)
            })?;
            let label = if completed { "completed" } else { "pending" };
            println!("Task {id} is now {label}");
            Ok(())
        }
        Command::Delete { id } => {
            let removed = store.update(|state| {
                with_task_list(state, |tasks| tasks.remove(&id)).map_err(anyhow::Error::from)
            })?;
            println!("Deleted task {:?}", removed.text);
            Ok(())
        }
        Command::List => {
            let state = store.load()?;
            let now = Utc::now();
            for task in &state.tasks {
                print_task(task, now);
            }
            Ok(())
        }
        Command::Stats => {
            let stats = TaskList::new(store.load()?.tasks).stats();
            println!(
                "{} total, {} completed, {} pending ({}% done)",
                stats.total, stats.completed, stats.pending, stats.percentage
            );
            Ok(())
        }
        Command::Email { command } => email(command, &settings, &store).await,
    }
}

async fn run(settings: &AppSettings, store: &TaskStore) -> anyhow::Result<()> {
    let ledger = JsonFileReminderLedger::open(settings.storage.ledger_path.clone())
        .await
        .context("Could not open reminder ledger")?;
    let dispatch = DispatchSink::spawn(DeliveryContext {
        notifier: notifier_for(settings.notifications.enabled, APP_NAME),
        transport: email_transport(settings),
        composer: MessageComposer::new(settings.email.from_name.clone(), settings.timezone()?),
    });
    let scheduler = DeadlineScheduler::new(Arc::new(ledger), dispatch)
        .with_options(settings.scheduler_options()?);

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Could not listen for Ctrl-C. [error = {err}]");
        }
        ctrl_c_token.cancel();
    });

    watch_state(
        store.clone(),
        scheduler,
        Duration::from_secs(settings.storage.reload_interval_secs.max(1)),
        Arc::new(announce),
        shutdown,
    )
    .await?;

    log::info!("Shutting down");
    Ok(())
}

async fn email(command: EmailCommand, settings: &AppSettings, store: &TaskStore) -> anyhow::Result<()> {
    match command {
        EmailCommand::Add { address } => {
            let address = normalize_email(&address)?;
            let added = store.update(|state| Ok(state.emails.insert(address.clone())))?;
            if added {
                println!("Added {address}");
            } else {
                println!("{address} is already a recipient");
            }
        }
        EmailCommand::Remove { address } => {
            let address = normalize_email(&address)?;
            let removed = store.update(|state| Ok(state.emails.remove(&address)))?;
            if removed {
                println!("Removed {address}");
            } else {
                println!("{address} is not a recipient");
            }
        }
        EmailCommand::List => {
            for address in store.load()?.emails {
                println!("{address}");
            }
        }
        EmailCommand::Test { address } => {
            let address = normalize_email(&address)?;
            let composer = MessageComposer::new(settings.email.from_name.clone(), settings.timezone()?);
            email_transport(settings)
                .submit(&composer.test_email(&address, Utc::now()))
                .await
                .with_context(|| format!("Test email to {address} failed"))?;
            println!("Test email sent to {address}");
        }
    }

    Ok(())
}

fn email_transport(settings: &AppSettings) -> Arc<dyn EmailTransport> {
    match settings.access_key() {
        Some(access_key) => Arc::new(Web3FormsTransport::with_endpoint(
            settings.email.endpoint.clone(),
            access_key,
        )),
        None => {
            log::warn!("No email access key configured, email reminders will fail");
            Arc::new(UnconfiguredTransport)
        }
    }
}

fn with_task_list<T>(state: &mut TrackerState, change: impl FnOnce(&mut TaskList) -> T) -> T {
    let mut tasks = TaskList::new(std::mem::take(&mut state.tasks));
    let result = change(&mut tasks);
    state.tasks = tasks.into_tasks();
    result
}

fn announce(task: &Task) {
    log::info!("Reminder sent. [task_id = {}]", task.id);
    println!("\"{}\" is due soon!", task.text);
}

fn print_task(task: &Task, now: chrono::DateTime<Utc>) {
    let mark = if task.completed { "x" } else { " " };
    let status = match task.deadline_status(now) {
        DeadlineStatus::None => String::new(),
        DeadlineStatus::Overdue => " | overdue".to_owned(),
        DeadlineStatus::Due { remaining, urgent: true } => format!(" | {remaining} left (urgent)"),
        DeadlineStatus::Due { remaining, .. } => format!(" | {remaining} left"),
    };
    println!("[{mark}] {} | {}{status}", task.id, task.text);
}
