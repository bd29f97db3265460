mod dashboard;

use crate::cli::{build_config, Cli};
use crate::controller::TestController;
use crate::model::ControllerEvent;
use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, time::Duration};
use tokio::sync::mpsc;

pub async fn run(args: Cli) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut controller = TestController::new(build_config(&args))?;
    // Initial provider detection and history fetch, concurrently.
    controller.startup().await;

    // All background tasks (simulator ticks, measurement outcomes) report
    // through this channel; the sender half kept here keeps it open across
    // runs.
    let (evt_tx, mut evt_rx) = mpsc::channel::<ControllerEvent>(256);

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    let res = loop {
        tokio::select! {
            _ = tick.tick() => {
                terminal.draw(|f| dashboard::draw(f.area(), f, &controller)).ok();
            }
            maybe_ev = events.next() => {
                let Some(Ok(ev)) = maybe_ev else { continue };
                let Event::Key(k) = ev else { continue };
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        controller.abort_run();
                        break Ok(());
                    }
                    (_, KeyCode::Char('t')) | (_, KeyCode::Enter) => {
                        // Real reentrancy guard lives in the controller; a
                        // second press during a run is a no-op.
                        controller.begin_run(&evt_tx);
                    }
                    (_, KeyCode::Char('h')) => {
                        controller.toggle_history().await;
                    }
                    (_, KeyCode::Char('s')) => {
                        if controller.current_isp().is_some() {
                            controller.open_support_modal();
                        }
                    }
                    (_, KeyCode::Esc) => {
                        controller.close_support_modal();
                    }
                    (_, KeyCode::Char('d')) => {
                        controller.dismiss_error();
                    }
                    _ => {}
                }
            }
            maybe_cev = evt_rx.recv() => {
                // Never `None`: we hold a sender for the lifetime of the loop.
                let Some(cev) = maybe_cev else { continue };
                match cev {
                    ControllerEvent::Progress { state } => controller.on_progress(state),
                    ControllerEvent::MeasurementOutcome { outcome } => {
                        controller.finish_run(outcome).await;
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}
