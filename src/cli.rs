use crate::controller::{RunState, TestController};
use crate::model::{ControllerConfig, ControllerEvent, TestPhase};
use crate::quality;
use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "speedtest-dashboard",
    version,
    about = "Dashboard client for a self-hosted speed test backend, with optional TUI"
)]
pub struct Cli {
    /// Base URL of the speed test backend
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Run one test, print the JSON result and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Run one test, print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Interval between synthetic progress ticks
    #[arg(long, default_value = "50ms")]
    pub tick_interval: humantime::Duration,

    /// Timeout for backend requests (the measurement itself can take a while)
    #[arg(long, default_value = "120s")]
    pub request_timeout: humantime::Duration,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

/// Build a `ControllerConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ControllerConfig {
    ControllerConfig {
        base_url: args.base_url.clone(),
        tick_interval: Duration::from(args.tick_interval),
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("speedtest-dashboard-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Drive one complete run to completion, optionally narrating progress
/// phases to stderr.
async fn run_once(controller: &mut TestController, narrate: bool) -> Result<()> {
    let (evt_tx, mut evt_rx) = mpsc::channel::<ControllerEvent>(256);

    if !controller.begin_run(&evt_tx) {
        anyhow::bail!("a speed test is already in progress");
    }
    drop(evt_tx);

    let mut last_phase = TestPhase::None;
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            ControllerEvent::Progress { state } => {
                controller.on_progress(state);
                if narrate && state.phase != last_phase {
                    eprintln!("== {} ==", state.phase.label());
                    last_phase = state.phase;
                }
            }
            ControllerEvent::MeasurementOutcome { outcome } => {
                controller.finish_run(outcome).await;
                break;
            }
        }
    }
    Ok(())
}

async fn run_json(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let mut controller = TestController::new(cfg)?;
    run_once(&mut controller, false).await?;

    match controller.state() {
        RunState::Succeeded { result } => {
            println!(
                "{}",
                serde_json::to_string_pretty(result).context("serialize result")?
            );
            Ok(())
        }
        RunState::Failed { reason } => Err(anyhow::anyhow!("{reason}")),
        _ => Err(anyhow::anyhow!("speed test produced no outcome")),
    }
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let mut controller = TestController::new(cfg)?;
    controller.startup().await;

    if let Some(isp) = controller.current_isp() {
        eprintln!("Connected via {}", isp.name);
    }

    run_once(&mut controller, true).await?;

    let result = match controller.state() {
        RunState::Succeeded { result } => result.clone(),
        RunState::Failed { reason } => return Err(anyhow::anyhow!("{reason}")),
        _ => return Err(anyhow::anyhow!("speed test produced no outcome")),
    };

    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "N/A".into());
    println!("Ping:     {} ms", fmt(result.ping));
    println!("Download: {} Mbps", fmt(result.download_speed));
    println!("Upload:   {} Mbps", fmt(result.upload_speed));
    if let Some(ts) = result.timestamp.as_deref() {
        println!("When:     {ts}");
    }
    if let Some(ip) = result.public_ip.as_deref() {
        println!("Public IP: {ip}");
    }

    if let Some(qa) = result.quality_assessment.as_ref() {
        let label = qa.quality.as_deref().unwrap_or("unknown");
        println!("Quality:  {}", label.to_uppercase());
        for issue in &qa.issues {
            println!("  issue: {issue}");
        }
        for rec in &qa.recommendations {
            println!("  recommendation: {rec}");
        }
        if quality::should_escalate(Some(qa)) {
            println!("Connection issues detected - consider contacting your provider.");
            if let Some(isp) = controller.current_isp() {
                if let Some(phone) = isp.support_phone.as_deref() {
                    println!("  {} support: {phone}", isp.name);
                }
                if let Some(email) = isp.support_email.as_deref() {
                    println!("  {} email:   {email}", isp.name);
                }
            }
        }
    }

    if let Some(e) = controller.history().error() {
        eprintln!("{e}");
    }

    Ok(())
}
