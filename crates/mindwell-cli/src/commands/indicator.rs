use std::ops::ControlFlow;

use clap::Subcommand;
use mindwell_core::storage::Database;
use mindwell_core::{FloatingIndicator, Probe, SystemClock};

#[derive(Subcommand)]
pub enum IndicatorAction {
    /// Print the indicator once as JSON (null when hidden)
    Show,
    /// Redraw the indicator every second until it hides or Ctrl-C
    Follow,
}

pub fn run(action: IndicatorAction) -> Result<(), Box<dyn std::error::Error>> {
    let indicator = FloatingIndicator::new(Database::open()?, SystemClock);

    match action {
        IndicatorAction::Show => {
            println!("{}", serde_json::to_string_pretty(&indicator.probe())?);
        }
        IndicatorAction::Follow => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async move {
                let probe = Probe::spawn(Probe::PERIOD, move || match indicator.probe() {
                    Some(view) => {
                        println!("{}", view.label);
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                });
                tokio::select! {
                    _ = probe.join() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            });
        }
    }
    Ok(())
}
