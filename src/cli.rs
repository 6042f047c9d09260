//! Command-line interface: interactive chat, one-shot runs, and bridge inspection.

use crate::agent::{Agent, AgentEvent, Conversation, TurnOutcome};
use crate::bridge::{BridgeApi, BridgeClient};
use crate::config::Config;
use crate::provider::{ChatModel, OllamaClient};
use crate::session::{SessionHandle, with_session};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

/// Drive remote pentest tool servers from a local chat model
#[derive(Parser, Debug)]
#[command(name = "bridgeline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: <config dir>/bridgeline/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bridge base URL, e.g. http://192.168.1.100:3000
    #[arg(long, global = true, value_name = "URL")]
    pub bridge_url: Option<String>,

    /// Model name on the chat endpoint
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive conversation (default)
    Chat(ServerArgs),
    /// Run a single prompt and print the final answer
    Run(RunArgs),
    /// List the servers the bridge exposes
    Servers,
    /// Show bridge health
    Health,
    /// List the tools of a server
    Tools(ServerArgs),
}

#[derive(Parser, Debug, Default)]
pub struct ServerArgs {
    /// Backend server to open the session on
    #[arg(short, long)]
    pub server: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// The prompt to execute
    #[arg(required = true)]
    pub prompt: String,

    /// Backend server to open the session on
    #[arg(short, long)]
    pub server: Option<String>,

    /// Maximum model round-trips for this prompt
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Only print the final answer
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Config file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(url) = &self.bridge_url {
            config.bridge.url.clone_from(url);
        }
        if let Some(model) = &self.model {
            config.model.name.clone_from(model);
        }
        match &self.command {
            Some(Commands::Chat(args) | Commands::Tools(args)) => {
                if let Some(server) = &args.server {
                    config.bridge.server.clone_from(server);
                }
            }
            Some(Commands::Run(args)) => {
                if let Some(server) = &args.server {
                    config.bridge.server.clone_from(server);
                }
                if let Some(max) = args.max_iterations {
                    config.agent.max_iterations = max;
                }
            }
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }
}

/// Install the stderr subscriber. `BRIDGELINE_LOG` takes precedence over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "bridgeline=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("BRIDGELINE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Entry point used by `main`.
pub async fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    let config = match cli.resolve_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or(Commands::Chat(ServerArgs::default())) {
        Commands::Chat(_) => chat(&config).await,
        Commands::Run(args) => run_once(&config, &args.prompt, args.quiet).await,
        Commands::Servers => servers(&config).await,
        Commands::Health => health(&config).await,
        Commands::Tools(_) => tools(&config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn bridge_client(config: &Config) -> Arc<dyn BridgeApi> {
    Arc::new(BridgeClient::with_timeout(
        &config.bridge.url,
        config.request_timeout(),
    ))
}

fn build_agent(config: &Config) -> Agent {
    let model = OllamaClient::with_timeout(
        &config.model.host,
        &config.model.name,
        config.model_timeout(),
    );
    Agent::new(Arc::new(model))
        .with_max_iterations(config.agent.max_iterations)
        .with_tool_timeout(config.tool_timeout())
}

/// Bridge and model must both answer before a session is opened.
async fn preflight(config: &Config, bridge: &dyn BridgeApi, agent: &Agent) -> Result<()> {
    let health = bridge
        .health()
        .await
        .with_context(|| format!("cannot connect to bridge at {}", config.bridge.url))?;
    eprintln!("Connected to bridge ({} active sessions)", health.active_sessions);

    if !agent.model().is_available().await {
        anyhow::bail!("model endpoint not reachable at {}", config.model.host);
    }
    Ok(())
}

async fn servers(config: &Config) -> Result<ExitCode> {
    let servers = bridge_client(config).list_servers().await?;
    println!("Available servers ({}):", servers.len());
    for (i, server) in servers.iter().enumerate() {
        println!("  {}. {}: {}", i + 1, server.name, server.description);
    }
    Ok(ExitCode::SUCCESS)
}

async fn health(config: &Config) -> Result<ExitCode> {
    let health = bridge_client(config).health().await?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(ExitCode::SUCCESS)
}

async fn tools(config: &Config) -> Result<ExitCode> {
    with_session(bridge_client(config), &config.bridge.server, |session| async move {
        print_tools(&session);
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    Ok(ExitCode::SUCCESS)
}

fn print_tools(session: &SessionHandle) {
    println!("Available tools ({}):", session.tools().len());
    for tool in session.tools() {
        let description = tool.description.as_deref().unwrap_or("No description");
        println!("  • {}: {}", tool.name, truncate(description, 50));
    }
}

/// Char-safe truncation for terminal previews.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::ToolCallsRequested(n) => eprintln!("\nExecuting {n} tool(s)...\n"),
        AgentEvent::ToolCallStart { name, arguments } => {
            let args = serde_json::to_string_pretty(arguments).unwrap_or_default();
            eprintln!("  → {name}");
            for line in args.lines() {
                eprintln!("    {line}");
            }
        }
        AgentEvent::ToolCallResult {
            content, is_error, ..
        } => {
            if *is_error {
                eprintln!("    ✗ {}\n", truncate(content, 200));
            } else {
                eprintln!("    ✓ Done\n");
            }
        }
        AgentEvent::IterationCapReached(n) => {
            eprintln!("Stopped after {n} model calls without a final answer.");
        }
        AgentEvent::ModelRequest { .. } | AgentEvent::Finished(_) => {}
    }
}

/// Run one turn while draining its events.
async fn run_turn_with_events(
    agent: &Agent,
    session: &SessionHandle,
    conversation: &mut Conversation,
    input: &str,
    quiet: bool,
) -> Result<TurnOutcome, crate::agent::TurnError> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(100);

    // The sender drops with the turn, which ends the printer.
    let turn = async move { agent.run_turn(session, conversation, input, &tx).await };
    let printer = async {
        while let Some(event) = rx.recv().await {
            if !quiet {
                print_event(&event);
            }
        }
    };

    let (outcome, ()) = tokio::join!(turn, printer);
    outcome
}

/// Spawn a Ctrl-C watcher and return the token it cancels.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });
    token
}

/// Forward lines from `reader` over a channel, reading on a plain OS thread.
///
/// A blocked read there never holds up runtime shutdown after Ctrl-C.
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in reader.lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// What the prompt loop should do with a line of input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    ListTools,
    SessionInfo,
    Skip,
    Prompt(&'a str),
}

fn classify_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" | "q" => Input::Exit,
        "tools" => Input::ListTools,
        "/info" => Input::SessionInfo,
        "" => Input::Skip,
        _ => Input::Prompt(trimmed),
    }
}

async fn chat(config: &Config) -> Result<ExitCode> {
    let bridge = bridge_client(config);
    let agent = build_agent(config);
    preflight(config, bridge.as_ref(), &agent).await?;

    if let Ok(servers) = bridge.list_servers().await {
        eprintln!("Available servers ({}):", servers.len());
        for server in &servers {
            eprintln!("  • {}: {}", server.name, server.description);
        }
    }
    eprintln!("Using server: {}", config.bridge.server);

    let mut conversation = Conversation::with_system_prompt(config.system_prompt());
    let span = tracing::info_span!("conversation", id = %conversation.id());
    let interrupted = interrupt_token();

    with_session(bridge, &config.bridge.server, |session| {
        async move {
            eprintln!("Session created: {}...", session.id().short());
            print_tools(&session);
            eprintln!("\nReady! Type 'exit' to quit, 'tools' to list tools.\n");
            prompt_loop(&agent, &session, &mut conversation, &interrupted).await
        }
        .instrument(span)
    })
    .await?;

    eprintln!("\nSession closed");
    Ok(ExitCode::SUCCESS)
}

async fn prompt_loop(
    agent: &Agent,
    session: &SessionHandle,
    conversation: &mut Conversation,
    interrupted: &CancellationToken,
) -> Result<()> {
    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            () = interrupted.cancelled() => return Ok(()),
            line = lines.recv() => match line {
                Some(line) => line?,
                None => return Ok(()),
            },
        };

        let input = match classify_input(&line) {
            Input::Exit => return Ok(()),
            Input::Skip => continue,
            Input::ListTools => {
                for tool in session.tools() {
                    println!("  • {}", tool.name);
                }
                continue;
            }
            Input::SessionInfo => {
                match session.info().await {
                    Ok(info) => println!("{}", serde_json::to_string_pretty(&info)?),
                    Err(e) => eprintln!("Error: {e}"),
                }
                continue;
            }
            Input::Prompt(text) => text,
        };

        let result = tokio::select! {
            () = interrupted.cancelled() => {
                eprintln!("\nInterrupted");
                return Ok(());
            }
            result = run_turn_with_events(agent, session, conversation, input, false) => result,
        };

        match result {
            Ok(TurnOutcome::Done { text, .. }) => {
                if !text.is_empty() {
                    println!("\n{text}\n");
                }
            }
            Ok(TurnOutcome::IterationCapReached { .. }) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

async fn run_once(config: &Config, prompt: &str, quiet: bool) -> Result<ExitCode> {
    let bridge = bridge_client(config);
    let agent = build_agent(config);
    preflight(config, bridge.as_ref(), &agent).await?;

    let mut conversation = Conversation::with_system_prompt(config.system_prompt());
    let span = tracing::info_span!("conversation", id = %conversation.id());
    let interrupted = interrupt_token();

    let outcome = with_session(bridge, &config.bridge.server, |session| {
        async move {
            tokio::select! {
                () = interrupted.cancelled() => Ok(None),
                result = run_turn_with_events(&agent, &session, &mut conversation, prompt, quiet) => {
                    result.map(Some).map_err(anyhow::Error::from)
                }
            }
        }
        .instrument(span)
    })
    .await?;

    Ok(match outcome {
        Some(TurnOutcome::Done { text, .. }) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Some(TurnOutcome::IterationCapReached { .. }) => ExitCode::from(2),
        None => {
            eprintln!("Interrupted");
            ExitCode::FAILURE
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args() {
        let cli = Cli::try_parse_from(["bridgeline"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_chat_server() {
        let cli = Cli::try_parse_from(["bridgeline", "chat", "-s", "recon"]).unwrap();
        match cli.command {
            Some(Commands::Chat(args)) => assert_eq!(args.server.as_deref(), Some("recon")),
            other => panic!("Expected Chat command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "bridgeline",
            "--bridge-url",
            "http://10.0.0.2:3000",
            "run",
            "--max-iterations",
            "3",
            "-q",
            "scan 10.0.0.1",
        ])
        .unwrap();
        assert_eq!(cli.bridge_url.as_deref(), Some("http://10.0.0.2:3000"));
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.prompt, "scan 10.0.0.1");
                assert_eq!(args.max_iterations, Some(3));
                assert!(args.quiet);
            }
            other => panic!("Expected Run command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_requires_prompt() {
        assert!(Cli::try_parse_from(["bridgeline", "run"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bridgeline", "servers", "-v", "-m", "llama3.1"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.model.as_deref(), Some("llama3.1"));
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bridge]\nserver = \"pentest\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "bridgeline",
            "--config",
            path.to_str().unwrap(),
            "--bridge-url",
            "http://10.0.0.2:3000",
            "run",
            "-s",
            "recon",
            "--max-iterations",
            "4",
            "hi",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.bridge.url, "http://10.0.0.2:3000");
        assert_eq!(config.bridge.server, "recon");
        assert_eq!(config.agent.max_iterations, 4);
    }

    #[test]
    fn test_invalid_flag_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let cli = Cli::try_parse_from([
            "bridgeline",
            "--config",
            path.to_str().unwrap(),
            "--bridge-url",
            "nonsense",
            "health",
        ])
        .unwrap();
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_classify_input() {
        assert_eq!(classify_input("exit"), Input::Exit);
        assert_eq!(classify_input("  QUIT "), Input::Exit);
        assert_eq!(classify_input("q"), Input::Exit);
        assert_eq!(classify_input("Tools"), Input::ListTools);
        assert_eq!(classify_input("/info"), Input::SessionInfo);
        assert_eq!(classify_input("   "), Input::Skip);
        assert_eq!(
            classify_input(" scan 10.0.0.1 "),
            Input::Prompt("scan 10.0.0.1")
        );
    }

    #[test]
    fn test_line_reader_forwards_lines() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let lines = runtime.block_on(async {
            let mut rx = spawn_line_reader(std::io::Cursor::new("scan 10.0.0.1\nexit\n"));
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                lines.push(line.unwrap());
            }
            lines
        });
        assert_eq!(lines, ["scan 10.0.0.1", "exit"]);
    }

    #[test]
    fn test_blocked_reader_does_not_hold_runtime() {
        struct Stalled;
        impl std::io::Read for Stalled {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                loop {
                    std::thread::park();
                }
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let waited = runtime.block_on(async {
            let mut rx = spawn_line_reader(std::io::BufReader::new(Stalled));
            tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv()).await
        });
        assert!(waited.is_err());
        // Returns even though the reader thread is still blocked.
        drop(runtime);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("ééééé", 3), "ééé...");
    }
}
