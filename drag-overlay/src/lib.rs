use anyhow::{anyhow, Context, Result};
use calloop::EventLoop;
use calloop_wayland_source::WaylandSource;
use tracing::info;
use wayland_client::{globals::registry_queue_init, Connection};

pub mod config;
pub mod drag;
pub mod lifecycle;
pub mod overlay;
pub mod payload;
pub mod renderer;
pub mod style;
pub mod text_renderer;
pub mod wayland;

use lifecycle::{ProvidesKeepAlive, AUTO_QUIT_AFTER};
use wayland::AppState;

fn init_logging() {
    let log_level = std::env::var("DRAG_LOG").unwrap_or_else(|_| "info".to_string()).to_lowercase();

    let filter = match log_level.as_str() {
        "silent" => tracing::Level::ERROR,
        "error" => tracing::Level::ERROR,
        "warning" | "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "verbose" | "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt().with_max_level(filter).init();
}

/// Shows the overlay and runs until the auto-quit timer, SIGINT, or the
/// compositor closing the surface.
pub fn run() -> Result<()> {
    init_logging();

    info!("Starting drag overlay");
    let config = config::load_config();

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland")?;
    let (globals, event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let mut event_loop: EventLoop<AppState> =
        EventLoop::try_new().context("Failed to create event loop")?;
    WaylandSource::new(conn, event_queue)
        .insert(event_loop.handle())
        .map_err(|e| anyhow!("Failed to insert Wayland source: {}", e.error))?;

    let mut state = AppState::new(&globals, &qh, &config)?;
    state.present(&qh);

    let handle = event_loop.handle();
    lifecycle::arm_timeout(&handle, AUTO_QUIT_AFTER)?;
    lifecycle::arm_interrupt(&handle)?;
    state.keep_alive().hold();

    let trigger = lifecycle::run(&mut event_loop, &mut state)?;
    if let Some(err) = state.take_failure() {
        return Err(err);
    }

    info!("Drag overlay exiting ({:?})", trigger);
    Ok(())
}
