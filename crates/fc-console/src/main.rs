//! Flow canvas console: drive a project's pipeline graph from a terminal.
//!
//! Connection settings come from `FC_API_URL`, `FC_TOKEN`, `FC_ORG` and
//! `FC_TIMEOUT_SECS`. `FC_EMBED` may hold an embedding query string
//! (`token=..&org=..`) whose credentials override the plain variables.
//! Logging follows `RUST_LOG`.

use fc_core::NodeId;
use fc_editor::{
    CanvasAction, CanvasEngine, EditorConfig, EditorError, PreviewAction, Toast, ToastLevel,
};
use fc_remote::{
    EmbedContext, EmbedParams, HttpRemote, LockEvent, LogTail, RemoteConfig, RemoteSync,
    RunHandle, TailConfig, TailOutcome,
};
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "\
usage:
  fc-console graph <project>               print the project graph as JSON
  fc-console preview <project> <node> [page]
                                           print a page of a node's output
  fc-console sync <project>                sync source metadata and wait
  fc-console run <project> [--follow]      start a pipeline run
  fc-console logs <run-id>                 tail a run's logs";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Graph { project: String },
    Preview {
        project: String,
        node: String,
        page: u32,
    },
    Sync { project: String },
    Run { project: String, follow: bool },
    Logs { run_id: String },
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let arg = |i: usize, what: &str| {
        args.get(i)
            .filter(|s| !s.starts_with("--"))
            .cloned()
            .ok_or_else(|| format!("missing {what}"))
    };
    match args.first().map(String::as_str) {
        Some("graph") => Ok(Command::Graph {
            project: arg(1, "project")?,
        }),
        Some("preview") => {
            let page = match args.get(3) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| format!("invalid page number '{raw}'"))?,
                None => 0,
            };
            Ok(Command::Preview {
                project: arg(1, "project")?,
                node: arg(2, "node id")?,
                page,
            })
        }
        Some("sync") => Ok(Command::Sync {
            project: arg(1, "project")?,
        }),
        Some("run") => Ok(Command::Run {
            project: arg(1, "project")?,
            follow: args.iter().skip(2).any(|a| a == "--follow" || a == "-f"),
        }),
        Some("logs") => Ok(Command::Logs {
            run_id: arg(1, "run id")?,
        }),
        Some(other) => Err(format!("unknown command '{other}'")),
        None => Err("missing command".to_string()),
    }
}

fn remote_config() -> RemoteConfig {
    let mut config = RemoteConfig::from_env();
    if let Ok(query) = std::env::var("FC_EMBED") {
        let embed = EmbedContext::resolve(None, &EmbedParams::parse(&query));
        embed.apply_to(&mut config);
    }
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("fc-console: {e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match execute(command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fc-console: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> Result<ExitCode, EditorError> {
    let config = remote_config();
    let remote = Arc::new(HttpRemote::new(&config)?);
    let succeeded = dispatch(remote, command, TailConfig::from(&config)).await?;
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run one command. `Ok(false)` means it ran but did not achieve what was
/// asked (a sync that never started, a preview with nothing shown, an
/// error reported along the way).
async fn dispatch<R>(remote: Arc<R>, command: Command, tail_config: TailConfig) -> Result<bool, EditorError>
where
    R: RemoteSync + ?Sized + 'static,
{
    match command {
        Command::Graph { project } => {
            let engine = open(remote, &project).await?;
            let snapshot = engine.graph().to_snapshot();
            let json = serde_json::to_string_pretty(&snapshot).map_err(fc_remote::RemoteError::from)?;
            println!("{json}");
            Ok(true)
        }
        Command::Preview {
            project,
            node,
            page,
        } => {
            let mut engine = open(remote, &project).await?;
            let id = NodeId::intern(&node);
            if !engine.graph().contains(id) {
                return Err(EditorError::NotFound(id));
            }
            engine.dispatch_preview(PreviewAction::Preview(id));
            let mut shown = engine.preview().await;
            for _ in 0..page {
                if !shown {
                    break;
                }
                shown = engine.preview_next_page().await;
            }
            let clean = report(engine.take_toasts());
            let Some(result) = engine.preview_pane().result().filter(|_| shown) else {
                return Ok(false);
            };
            println!("{}", result.columns.join("\t"));
            for row in &result.rows {
                let cells: Vec<String> = result
                    .columns
                    .iter()
                    .map(|c| row.get(c).map(cell).unwrap_or_default())
                    .collect();
                println!("{}", cells.join("\t"));
            }
            Ok(clean)
        }
        Command::Sync { project } => {
            let mut engine = open(remote, &project).await?;
            engine.dispatch(CanvasAction::SyncSources);
            engine.process_actions().await;
            let mut clean = report(engine.take_toasts());
            if !engine.sync_lock().is_busy() {
                return Ok(false);
            }
            while engine.sync_lock().is_busy() {
                tokio::time::sleep(tail_config.poll_interval).await;
                let event = engine.observe_sync_lock().await?;
                clean &= report(engine.take_toasts());
                if let Some(LockEvent::Failed(_)) = event {
                    return Ok(false);
                }
            }
            Ok(clean)
        }
        Command::Run { project, follow } => {
            let mut engine = open(remote.clone(), &project).await?;
            engine.dispatch(CanvasAction::RunWorkflow);
            engine.process_actions().await;
            let clean = report(engine.take_toasts());
            let Some(run) = engine.last_run().cloned() else {
                return Ok(false);
            };
            println!("{}", run.run_id);
            if follow {
                follow_logs(remote, run, tail_config).await?;
            }
            Ok(clean)
        }
        Command::Logs { run_id } => {
            follow_logs(remote, RunHandle { run_id }, tail_config).await?;
            Ok(true)
        }
    }
}

async fn open<R>(remote: Arc<R>, project: &str) -> Result<CanvasEngine<R>, EditorError>
where
    R: RemoteSync + ?Sized,
{
    let mut engine = CanvasEngine::new(remote, EditorConfig::new(project));
    engine.refresh().await?;
    Ok(engine)
}

async fn follow_logs<R>(remote: Arc<R>, run: RunHandle, config: TailConfig) -> Result<(), EditorError>
where
    R: RemoteSync + ?Sized + 'static,
{
    let (tail, mut lines) = LogTail::spawn(remote, run, config);
    while let Some(line) = lines.recv().await {
        println!("{} {:>5} {}", line.timestamp, line.level, line.message);
    }
    match tail.join().await {
        Some(TailOutcome::Failed { error, .. }) => Err(error.into()),
        _ => Ok(()),
    }
}

/// Print toasts on stderr. Returns false when any of them is an error.
fn report(toasts: Vec<Toast>) -> bool {
    let mut clean = true;
    for toast in toasts {
        clean &= toast.level != ToastLevel::Error;
        eprintln!("[{:?}] {}", toast.level, toast.message);
    }
    clean
}

fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fc_core::{CanvasNode, GraphSnapshot, NodeKind, TableDescriptor};
    use fc_remote::{
        CanvasNodeResponse, CreateOperationPayload, EditOperationPayload, LockStatus, LogPage,
        RemoteError, SqlResult, TaskHandle, TaskProgress, TerminateChainPayload,
    };
    use std::time::Duration;

    /// Backend with one source table whose sync and query endpoints can be
    /// made to fail.
    #[derive(Default)]
    struct Backend {
        sync_fails: bool,
        sql_fails: bool,
    }

    fn unavailable() -> RemoteError {
        RemoteError::Status {
            status: 503,
            body: r#"{"detail": "warehouse unavailable"}"#.into(),
        }
    }

    #[async_trait]
    impl RemoteSync for Backend {
        async fn fetch_graph(&self, _project: &str) -> Result<GraphSnapshot, RemoteError> {
            let table = TableDescriptor {
                name: "orders".into(),
                display_name: "Orders".into(),
                schema: "raw".into(),
                source_name: "shop".into(),
                sql_path: String::new(),
            };
            Ok(GraphSnapshot {
                nodes: vec![CanvasNode::table(NodeId::intern("cs-orders"), NodeKind::Source, table)],
                edges: Vec::new(),
            })
        }

        async fn create_operation_node(
            &self,
            _payload: &CreateOperationPayload,
        ) -> Result<CanvasNodeResponse, RemoteError> {
            Err(unavailable())
        }

        async fn edit_operation_node(
            &self,
            _id: NodeId,
            _payload: &EditOperationPayload,
        ) -> Result<CanvasNodeResponse, RemoteError> {
            Err(unavailable())
        }

        async fn delete_node(&self, _id: NodeId) -> Result<(), RemoteError> {
            Err(unavailable())
        }

        async fn terminate_chain_and_create_model(
            &self,
            _payload: &TerminateChainPayload,
        ) -> Result<CanvasNodeResponse, RemoteError> {
            Err(unavailable())
        }

        async fn run_sql(&self, _sql: &str, _limit: u32, _offset: u32) -> Result<SqlResult, RemoteError> {
            if self.sql_fails {
                return Err(unavailable());
            }
            let mut row = serde_json::Map::new();
            row.insert("id".into(), 1.into());
            Ok(SqlResult {
                columns: vec!["id".into()],
                rows: vec![row],
            })
        }

        async fn sync_sources(&self, _project: &str) -> Result<TaskHandle, RemoteError> {
            if self.sync_fails {
                return Err(unavailable());
            }
            Ok(TaskHandle {
                task_id: "task-1".into(),
            })
        }

        async fn sync_lock_status(&self, _task: &TaskHandle) -> Result<TaskProgress, RemoteError> {
            Ok(TaskProgress {
                status: Some(LockStatus::Completed),
                message: None,
            })
        }

        async fn run_workflow(&self, _project: &str) -> Result<RunHandle, RemoteError> {
            Err(unavailable())
        }

        async fn fetch_run_logs(&self, _run: &RunHandle, _offset: usize) -> Result<LogPage, RemoteError> {
            Err(unavailable())
        }
    }

    async fn run(backend: Backend, line: &str) -> Result<bool, EditorError> {
        let command = parse_args(&args(line)).expect("valid command");
        let tail = TailConfig {
            poll_interval: Duration::from_millis(1),
            ..TailConfig::default()
        };
        dispatch(Arc::new(backend), command, tail).await
    }

    #[tokio::test]
    async fn sync_succeeds_once_the_lock_releases() {
        assert_eq!(run(Backend::default(), "sync proj-1").await.ok(), Some(true));
    }

    #[tokio::test]
    async fn sync_that_never_started_fails() {
        let backend = Backend {
            sync_fails: true,
            ..Backend::default()
        };
        assert_eq!(run(backend, "sync proj-1").await.ok(), Some(false));
    }

    #[tokio::test]
    async fn preview_prints_rows_and_succeeds() {
        assert_eq!(
            run(Backend::default(), "preview proj-1 cs-orders").await.ok(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn preview_with_a_failed_query_fails() {
        let backend = Backend {
            sql_fails: true,
            ..Backend::default()
        };
        assert_eq!(
            run(backend, "preview proj-1 cs-orders").await.ok(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn run_that_was_refused_fails() {
        assert_eq!(run(Backend::default(), "run proj-1").await.ok(), Some(false));
    }

    #[tokio::test]
    async fn preview_of_an_unknown_node_is_an_error() {
        let result = run(Backend::default(), "preview proj-1 cs-missing").await;
        assert!(matches!(result, Err(EditorError::NotFound(_))));
    }

    #[test]
    fn error_toasts_mark_the_command_as_failed() {
        assert!(report(vec![Toast::info("Syncing sources"), Toast::warning("slow")]));
        assert!(!report(vec![Toast::info("Syncing sources"), Toast::error("boom")]));
    }

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn parses_each_command() {
        assert_eq!(
            parse_args(&args("graph proj-1")),
            Ok(Command::Graph {
                project: "proj-1".into()
            })
        );
        assert_eq!(
            parse_args(&args("run proj-1 --follow")),
            Ok(Command::Run {
                project: "proj-1".into(),
                follow: true
            })
        );
        assert_eq!(
            parse_args(&args("preview proj-1 op-7 2")),
            Ok(Command::Preview {
                project: "proj-1".into(),
                node: "op-7".into(),
                page: 2
            })
        );
    }

    #[test]
    fn reports_missing_and_bad_arguments() {
        assert_eq!(parse_args(&args("")), Err("missing command".into()));
        assert_eq!(parse_args(&args("logs")), Err("missing run id".into()));
        assert_eq!(parse_args(&args("run --follow")), Err("missing project".into()));
        assert!(parse_args(&args("preview p n two")).is_err());
        assert!(parse_args(&args("deploy p")).is_err());
    }

    #[test]
    fn cells_render_without_json_quotes() {
        assert_eq!(cell(&serde_json::json!("abc")), "abc");
        assert_eq!(cell(&serde_json::json!(null)), "");
        assert_eq!(cell(&serde_json::json!(4.5)), "4.5");
    }
}
