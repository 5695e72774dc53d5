//! dwm-msg
//!
//! Query dwm, run its commands and follow its events over the IPC socket.

use std::net::Shutdown;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dwmipc::{Connection, ConnectionConfig, Event, EventPayload};
use dwmipc_config::{Config, ReconnectConfig};
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Longest wait between two reconnect attempts (10 seconds)
const MAX_RECONNECT_DELAY_MS: u64 = 10_000;

#[derive(Parser, Debug)]
#[command(name = "dwm-msg")]
#[command(about = "Send messages to dwm and receive its events")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = dwmipc_config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// dwm IPC socket (overrides config and $DWM_IPC_SOCKET)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a dwm command, e.g. `run-command view 2`
    RunCommand {
        name: String,
        /// Arguments, parsed as JSON where possible and passed as strings otherwise
        args: Vec<String>,
    },

    /// Print the state of every monitor
    GetMonitors,

    /// Print the configured tags
    GetTags,

    /// Print the configured layouts
    GetLayouts,

    /// Print the properties of the client managing a window
    GetClient {
        /// X window id, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_window_id)]
        window_id: u64,
    },

    /// Print events as they happen until interrupted
    Subscribe {
        /// Events such as `tag_change_event` or `layout_change`
        #[arg(required = true, value_parser = parse_event)]
        events: Vec<Event>,
    },
}

/// Where and how to connect
#[derive(Debug, Clone)]
struct Target {
    socket: PathBuf,
    connection: ConnectionConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    // Warnings from parsing are printed before the configured filter exists
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        dwmipc_config::parse_config(&config_path)
    })
    .with_context(|| format!("Failed to load {}", config_path.display()))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    let target = resolve_target(cli.socket, &config)?;
    debug!(socket = %target.socket.display(), "Using dwm socket");

    match cli.command {
        Commands::RunCommand { name, args } => {
            let args: Vec<Value> = args.iter().map(|arg| parse_command_arg(arg)).collect();
            query(target, move |con| Ok(con.run_command(&name, &args)?)).await
        }
        Commands::GetMonitors => {
            query(target, |con| Ok(serde_json::to_value(con.get_monitors()?)?)).await
        }
        Commands::GetTags => query(target, |con| Ok(serde_json::to_value(con.get_tags()?)?)).await,
        Commands::GetLayouts => {
            query(target, |con| Ok(serde_json::to_value(con.get_layouts()?)?)).await
        }
        Commands::GetClient { window_id } => {
            query(target, move |con| {
                Ok(serde_json::to_value(con.get_client(window_id)?)?)
            })
            .await
        }
        Commands::Subscribe { events } => cmd_subscribe(target, events, config.reconnect).await,
    }
}

/// Pick the socket from the command line, the config file or the environment
fn resolve_target(socket: Option<PathBuf>, config: &Config) -> Result<Target> {
    let socket = match socket.or_else(|| config.socket_path.clone()) {
        Some(socket) => socket,
        None => dwmipc::get_socket_path().context("Could not locate dwm's IPC socket")?,
    };

    Ok(Target {
        socket,
        connection: ConnectionConfig {
            max_payload_len: config.max_payload_size,
            ..ConnectionConfig::default()
        },
    })
}

/// Run one request on a fresh connection and print its reply as JSON
async fn query<F>(target: Target, request: F) -> Result<()>
where
    F: FnOnce(&mut Connection) -> Result<Value> + Send + 'static,
{
    let reply = tokio::task::spawn_blocking(move || {
        let mut con = Connection::connect_with_config(&target.socket, target.connection)
            .with_context(|| format!("Failed to connect to {}", target.socket.display()))?;
        let reply = request(&mut con);
        con.close();
        reply
    })
    .await
    .context("Request task failed")??;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

async fn cmd_subscribe(target: Target, events: Vec<Event>, policy: ReconnectConfig) -> Result<()> {
    let mut con = open_subscription(target.clone(), events.clone())
        .await
        .with_context(|| format!("Failed to subscribe on {}", target.socket.display()))?;

    loop {
        if listen_until_closed(con).await? {
            info!("Interrupted, exiting");
            return Ok(());
        }

        info!("dwm closed the connection");
        match reconnect(&target, &events, policy).await? {
            Some(next) => con = next,
            None => return Ok(()),
        }
    }
}

/// Connect and subscribe to `events`, printing each one as it arrives
async fn open_subscription(target: Target, events: Vec<Event>) -> Result<Connection> {
    let con = tokio::task::spawn_blocking(move || -> dwmipc::Result<Connection> {
        let mut con = Connection::connect_with_config(&target.socket, target.connection)?;
        for event in events {
            con.subscribe(event)?;
            con.register_handler(event, print_event)?;
        }
        Ok(con)
    })
    .await
    .context("Subscribe task failed")??;

    Ok(con)
}

fn print_event(payload: &EventPayload) {
    match serde_json::to_string_pretty(payload) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!(event = %payload.event(), error = %e, "Failed to encode event"),
    }
}

/// Listen on `con` until dwm closes it or Ctrl-C is pressed
///
/// Returns `true` if interrupted.
async fn listen_until_closed(con: Connection) -> Result<bool> {
    // A second handle on the socket lets Ctrl-C unblock the listener
    let socket = con
        .transport()
        .context("Connection is already closed")?
        .try_clone()
        .context("Failed to clone dwm socket")?;

    let mut listener = tokio::task::spawn_blocking(move || {
        let mut con = con;
        con.listen()
    });

    tokio::select! {
        result = &mut listener => {
            result.context("Event listener failed")??;
            Ok(false)
        }
        _ = tokio::signal::ctrl_c() => {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                debug!(error = %e, "Socket shutdown failed");
            }
            listener.await.context("Event listener failed")??;
            Ok(true)
        }
    }
}

/// Try to subscribe again with exponential backoff
///
/// Returns `None` when retries run out or Ctrl-C is pressed while waiting.
async fn reconnect(
    target: &Target,
    events: &[Event],
    policy: ReconnectConfig,
) -> Result<Option<Connection>> {
    let mut delay_ms = policy.initial_delay_ms;

    for attempt in 1..=policy.max_retries {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted while reconnecting");
                return Ok(None);
            }
        }

        match open_subscription(target.clone(), events.to_vec()).await {
            Ok(con) => {
                info!(attempt = attempt, "Reconnected to dwm");
                return Ok(Some(con));
            }
            Err(e) => {
                warn!(
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay_ms,
                    error = %e,
                    "Reconnect to dwm failed"
                );
            }
        }

        // Exponential backoff with cap
        delay_ms = (delay_ms * 2).min(MAX_RECONNECT_DELAY_MS);
    }

    if policy.max_retries > 0 {
        warn!(
            attempts = policy.max_retries,
            "Giving up on reconnecting to dwm"
        );
    }
    Ok(None)
}

/// A `run-command` argument as JSON, falling back to a plain string
fn parse_command_arg(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}

fn parse_window_id(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid window id '{}': {}", s, e))
}

fn parse_event(s: &str) -> Result<Event, String> {
    s.parse().map_err(|_| {
        let names: Vec<&str> = Event::ALL.iter().map(|event| event.as_str()).collect();
        format!("unknown event '{}', expected one of: {}", s, names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_args_prefer_json() {
        assert_eq!(parse_command_arg("2"), json!(2));
        assert_eq!(parse_command_arg("-0.05"), json!(-0.05));
        assert_eq!(parse_command_arg("true"), json!(true));
        assert_eq!(parse_command_arg("null"), Value::Null);
        assert_eq!(parse_command_arg("\"quoted\""), json!("quoted"));
        assert_eq!(parse_command_arg("st"), json!("st"));
    }

    #[test]
    fn test_window_id_decimal_and_hex() {
        assert_eq!(parse_window_id("6291462"), Ok(6291462));
        assert_eq!(parse_window_id("0x600006"), Ok(0x600006));
        assert_eq!(parse_window_id("0X600006"), Ok(0x600006));
        assert!(parse_window_id("window").is_err());
    }

    #[test]
    fn test_parse_event_lists_names_on_error() {
        assert_eq!(parse_event("layout_change"), Ok(Event::LayoutChange));

        let err = parse_event("selected_monitor_change_event").unwrap_err();
        assert!(err.contains("monitor_focus_change_event"), "{}", err);
    }

    #[test]
    fn test_subscribe_requires_an_event() {
        assert!(Cli::try_parse_from(["dwm-msg", "subscribe"]).is_err());

        let cli =
            Cli::try_parse_from(["dwm-msg", "subscribe", "tag_change", "client_focus_change_event"])
                .unwrap();
        match cli.command {
            Commands::Subscribe { events } => {
                assert_eq!(events, vec![Event::TagChange, Event::ClientFocusChange])
            }
            other => panic!("Expected Subscribe, got: {:?}", other),
        }
    }

    #[test]
    fn test_socket_flag_overrides_config() {
        let config = Config {
            socket_path: Some(PathBuf::from("/tmp/from-config.sock")),
            ..Config::default()
        };

        let target = resolve_target(Some(PathBuf::from("/tmp/flag.sock")), &config).unwrap();
        assert_eq!(target.socket, PathBuf::from("/tmp/flag.sock"));

        let target = resolve_target(None, &config).unwrap();
        assert_eq!(target.socket, PathBuf::from("/tmp/from-config.sock"));
        assert_eq!(target.connection.max_payload_len, config.max_payload_size);
    }

    #[tokio::test]
    async fn test_get_tags_against_scripted_dwm() {
        use std::io::{Read, Write};
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("dwm.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let dwm = std::thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            let mut header = [0u8; dwmipc::HEADER_SIZE];
            s.read_exact(&mut header).unwrap();
            let header = dwmipc::Header::decode(&header).unwrap();
            assert_eq!(header.message_type, dwmipc::MessageType::GetTags);

            let reply = dwmipc::Packet::new(
                header.message_type,
                br#"[{"bit_mask":1,"name":"1"}]"#.to_vec(),
            )
            .unwrap();
            s.write_all(&reply.to_bytes()).unwrap();
        });

        let target = Target {
            socket,
            connection: ConnectionConfig::default(),
        };
        query(target, |con| Ok(serde_json::to_value(con.get_tags()?)?))
            .await
            .unwrap();
        dwm.join().unwrap();
    }
}
