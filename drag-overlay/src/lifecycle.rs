//! Keep-alive accounting and the two shutdown triggers (timer, SIGINT).

use anyhow::{anyhow, Result};
use calloop::signals::{Signal, Signals};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, RegistrationToken};
use std::time::Duration;
use tracing::{debug, info};

/// Unconditional shutdown delay after the overlay is presented.
pub const AUTO_QUIT_AFTER: Duration = Duration::from_millis(20_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Timeout,
    Interrupt,
    SurfaceClosed,
    Failure,
}

/// Hold counter owned by the application. The event loop keeps running
/// while at least one hold is outstanding.
#[derive(Debug, Default)]
pub struct KeepAlive {
    holds: usize,
    trigger: Option<ShutdownTrigger>,
}

impl KeepAlive {
    pub fn hold(&mut self) {
        self.holds += 1;
    }

    pub fn release(&mut self) {
        self.holds = self.holds.saturating_sub(1);
    }

    pub fn is_held(&self) -> bool {
        self.holds > 0
    }

    /// First trigger that asked for shutdown, if any.
    pub fn trigger(&self) -> Option<ShutdownTrigger> {
        self.trigger
    }

    /// Records `trigger` (first one wins) and releases the hold.
    pub fn shutdown(&mut self, trigger: ShutdownTrigger) {
        if self.trigger.is_none() {
            info!("Shutdown requested: {:?}", trigger);
            self.trigger = Some(trigger);
        } else {
            debug!("Ignoring {:?}, already shutting down", trigger);
        }
        self.release();
    }
}

pub trait ProvidesKeepAlive {
    fn keep_alive(&mut self) -> &mut KeepAlive;
}

pub fn arm_timeout<D: ProvidesKeepAlive>(
    handle: &LoopHandle<'_, D>,
    after: Duration,
) -> Result<RegistrationToken> {
    handle
        .insert_source(Timer::from_duration(after), |_, _, state| {
            state.keep_alive().shutdown(ShutdownTrigger::Timeout);
            TimeoutAction::Drop
        })
        .map_err(|e| anyhow!("Failed to arm shutdown timer: {}", e.error))
}

/// Routes SIGINT through the event loop instead of the default handler.
/// The signal is blocked on the calling thread, so call this from the
/// thread that runs the loop.
pub fn arm_interrupt<D: ProvidesKeepAlive>(handle: &LoopHandle<'_, D>) -> Result<RegistrationToken> {
    let signals = Signals::new(&[Signal::SIGINT])
        .map_err(|e| anyhow!("Failed to watch SIGINT: {}", e))?;

    handle
        .insert_source(signals, |event, _, state| {
            debug!("Received {:?}", event.signal());
            state.keep_alive().shutdown(ShutdownTrigger::Interrupt);
        })
        .map_err(|e| anyhow!("Failed to register SIGINT source: {}", e.error))
}

/// Dispatches until every hold is released. Sources still registered when
/// this returns never fire.
pub fn run<D: ProvidesKeepAlive>(
    event_loop: &mut EventLoop<'_, D>,
    state: &mut D,
) -> Result<Option<ShutdownTrigger>> {
    while state.keep_alive().is_held() {
        event_loop.dispatch(None, state)?;
    }
    Ok(state.keep_alive().trigger())
}
