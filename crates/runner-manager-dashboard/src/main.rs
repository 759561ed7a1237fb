mod app;
mod config;
mod theme;
mod transport;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use config::{Args, Config};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};
use transport::{OutboundQueue, EVENT_QUEUE_CAPACITY, OUTBOUND_QUEUE_CAPACITY};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load(Args::parse())?;
    init_logging(&config);
    info!(
        event = "dashboard_start",
        client_id = %config.client_id,
        window = %config.window,
        max_frame_bytes = config.max_frame_bytes
    );

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let (socket_tx, mut socket_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let socket_task = tokio::spawn(transport::socket_loop(
        config.url.clone(),
        socket_tx,
        outbound_rx,
    ));
    let mut app = App::new(
        OutboundQueue::new(outbound_tx),
        config.window,
        config.max_frame_bytes,
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run(&mut terminal, &mut app, &mut socket_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    socket_task.abort();
    info!(event = "dashboard_stop");
    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    socket_rx: &mut mpsc::Receiver<transport::SocketEvent>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut redraw = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;
        tokio::select! {
            // keeps relative windows sliding while no frames arrive
            _ = redraw.tick() => {}
            maybe_socket = socket_rx.recv() => {
                match maybe_socket {
                    Some(event) => app.apply_socket_event(event),
                    None => {
                        warn!(event = "socket_loop_ended");
                        return Ok(());
                    }
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if app.handle_key(key) {
                            return Ok(());
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err).context("reading terminal input"),
                    None => return Ok(()),
                }
            }
        }
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = match config
        .log_dir
        .as_deref()
        .map(|dir| open_log_file(dir, &config.client_id))
    {
        Some(Ok(file)) => BoxMakeWriter::new(Arc::new(file)),
        Some(Err(err)) => {
            eprintln!("log_file_error: {err:#}");
            BoxMakeWriter::new(io::sink)
        }
        None if config.log_stdout => BoxMakeWriter::new(io::stdout),
        None => BoxMakeWriter::new(io::sink),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
}

fn open_log_file(dir: &Path, client_id: &str) -> Result<std::fs::File> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = log_file_path(dir, client_id);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))
}

fn log_file_path(dir: &Path, client_id: &str) -> PathBuf {
    let safe: String = client_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("runner-manager-dashboard-{safe}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn log_file_is_named_after_client_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("logs");
        let mut file = open_log_file(&nested, "rmd-42").expect("open log");
        writeln!(file, "line").expect("write");

        let path = nested.join("runner-manager-dashboard-rmd-42.log");
        assert_eq!(log_file_path(&nested, "rmd-42"), path);
        assert!(path.exists());
    }

    #[test]
    fn log_file_name_sanitizes_client_id() {
        let path = log_file_path(Path::new("/tmp"), "a/b c");
        assert_eq!(
            path,
            PathBuf::from("/tmp/runner-manager-dashboard-a_b_c.log")
        );
    }
}
