use std::ops::ControlFlow;

use clap::Subcommand;
use mindwell_core::storage::Database;
use mindwell_core::timer::format_clock;
use mindwell_core::{
    AmbientNotifier, Config, Event, FloatingIndicator, Probe, SessionHost, SystemClock,
    TimerEngine, TimerMode, ViewState,
};

use crate::notifier::{StderrMessages, TerminalNotifier};

/// Host-side view state kept between invocations.
const VIEW_KEY: &str = "timer_view";

type Engine = TimerEngine<Database, SystemClock>;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume a session
    Start {
        /// Switch to this mode first (focus, break, breathing)
        #[arg(long)]
        mode: Option<TimerMode>,
        /// Run for this many minutes instead of the configured length
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// Pause and keep the remaining time
    Pause,
    /// Stop and show the full duration again
    Reset,
    /// Switch mode without starting
    Mode {
        /// focus, break or breathing
        mode: TimerMode,
    },
    /// Print current timer state as JSON
    Status,
    /// Follow the active session every second until it ends or Ctrl-C
    Watch,
}

fn load_engine(db: Database, config: &Config) -> Engine {
    let view = match db.kv_get(VIEW_KEY) {
        Ok(Some(json)) => serde_json::from_str::<ViewState>(&json)
            .map_err(|e| tracing::warn!("discarding saved timer view: {}", e))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("could not read saved timer view: {}", e);
            None
        }
    };
    TimerEngine::restore(db, SystemClock, config.timer_settings(), view)
}

fn save_engine(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(&engine.view_state())?;
    engine.store().kv_set(VIEW_KEY, &json)?;
    Ok(())
}

fn build_host(config: &Config) -> Result<SessionHost, Box<dyn std::error::Error>> {
    let ambient = AmbientNotifier::new(TerminalNotifier, config.notifications);
    let host = SessionHost::new(
        ambient,
        Database::open()?,
        StderrMessages,
        config.rewards.clone(),
    )
    .with_history(Database::open()?);
    Ok(host)
}

fn emit(host: &SessionHost, events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        println!("{}", serde_json::to_string_pretty(event)?);
        host.dispatch(event);
    }
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut engine = load_engine(Database::open()?, &config);
    let host = build_host(&config)?;

    match action {
        TimerAction::Start { mode, minutes } => {
            let mut events = engine.tick();
            if let Some(mode) = mode.filter(|m| *m != engine.mode()) {
                events.push(engine.set_mode(mode));
            }
            let started = match minutes {
                Some(minutes) => engine.start_for(minutes.saturating_mul(60)),
                None => engine.start(),
            };
            match started {
                Ok(more) => events.extend(more),
                Err(e) => {
                    save_engine(&engine)?;
                    return Err(e.into());
                }
            }
            emit(&host, &events)?;
        }
        TimerAction::Pause => {
            let events = engine.pause();
            emit(&host, &events)?;
        }
        TimerAction::Reset => {
            let mut events = engine.tick();
            events.push(engine.reset());
            emit(&host, &events)?;
        }
        TimerAction::Mode { mode } => {
            let mut events = engine.tick();
            events.push(engine.set_mode(mode));
            emit(&host, &events)?;
        }
        TimerAction::Status => {
            let events = engine.tick();
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            emit(&host, &events)?;
        }
        TimerAction::Watch => {
            let events = engine.tick();
            emit(&host, &events)?;
            if engine.is_running() {
                watch(engine, host)?;
                return Ok(());
            }
            eprintln!("no running session");
        }
    }

    save_engine(&engine)?;
    Ok(())
}

/// Run the timer view and the floating indicator side by side, each on its
/// own probe, until the session ends or the user interrupts.
fn watch(mut engine: Engine, host: SessionHost) -> Result<(), Box<dyn std::error::Error>> {
    let indicator = FloatingIndicator::new(Database::open()?, SystemClock);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let indicator_probe = Probe::spawn(Probe::PERIOD, move || {
            match indicator.probe() {
                Some(view) => eprintln!("{}  {}", view.label, view.mode.label()),
                None => return ControlFlow::Break(()),
            }
            ControlFlow::Continue(())
        });

        let timer_probe = Probe::spawn(Probe::PERIOD, move || {
            for event in engine.tick() {
                match serde_json::to_string(&event) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!("could not encode event: {}", e),
                }
                host.dispatch(&event);
            }
            if let Err(e) = save_engine(&engine) {
                tracing::warn!("could not save timer view: {}", e);
            }
            if engine.is_running() {
                tracing::debug!("{} left", format_clock(engine.remaining_secs()));
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        });

        tokio::select! {
            _ = timer_probe.join() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("watch interrupted, session keeps running");
            }
        }
        indicator_probe.cancel();
    });
    Ok(())
}
