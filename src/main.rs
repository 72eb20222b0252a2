use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};

use roverctl::domain::models::{AppEvent, MessageSeverity, OperatingMode};
use roverctl::domain::session::{Session, SessionConfig, SessionEvent};
use roverctl::domain::settings::SettingsService;
use roverctl::infrastructure::bluetooth::BleTransport;
use roverctl::infrastructure::logging;
use roverctl::Intent;

#[tokio::main]
async fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;
    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)?;
    info!("Starting rover controller");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();

    let transport = match BleTransport::new(event_tx.clone()).await {
        Ok(transport) => transport,
        Err(e) => {
            // Absent adapter or denied permissions cannot be recovered from
            // inside the session; surface the status and exit.
            error!("{e}");
            eprintln!("{e}");
            return Ok(());
        }
    };

    let config = SessionConfig::from(settings_service.get());
    let mut session = Session::new(transport, config, event_tx.clone(), app_tx);

    spawn_console_input(event_tx);
    tokio::spawn(async move {
        while let Some(event) = app_rx.recv().await {
            render(event);
        }
    });

    println!("commands: connect | disconnect | left | right | stop | auto | manual | quit");

    // Single-consumer loop: all session mutation happens here, in arrival
    // order.
    while let Some(event) = event_rx.recv().await {
        if matches!(event, SessionEvent::Shutdown) {
            session.handle(SessionEvent::DisconnectRequested);
            break;
        }
        session.handle(event);
    }
    Ok(())
}

/// Blocking stdin reads live on a plain thread; parsed lines are marshaled
/// onto the single session queue.
fn spawn_console_input(events: mpsc::UnboundedSender<SessionEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            if stdin.read_line(&mut line).unwrap_or(0) == 0 {
                let _ = events.send(SessionEvent::Shutdown);
                return;
            }
            let event = match line.trim() {
                "connect" => SessionEvent::ConnectRequested,
                "disconnect" => SessionEvent::DisconnectRequested,
                "left" => SessionEvent::Intent(Intent::MoveLeft),
                "right" => SessionEvent::Intent(Intent::MoveRight),
                "stop" => SessionEvent::Intent(Intent::Stop),
                "auto" => SessionEvent::Intent(Intent::SetMode(OperatingMode::Auto)),
                "manual" => SessionEvent::Intent(Intent::SetMode(OperatingMode::Manual)),
                "quit" | "exit" => SessionEvent::Shutdown,
                "" => continue,
                other => {
                    println!("unknown command: {other}");
                    continue;
                }
            };
            let quitting = matches!(event, SessionEvent::Shutdown);
            if events.send(event).is_err() || quitting {
                return;
            }
        }
    });
}

fn render(event: AppEvent) {
    match event {
        AppEvent::Panel(panel) => {
            println!(
                "[{}] distance: {} | motor: {} | mode: {}",
                panel.status, panel.distance, panel.motor, panel.mode_label
            );
        }
        AppEvent::ModeChanged(mode) => println!("mode changed: {}", mode.label()),
        AppEvent::Log(message) => match message.severity {
            MessageSeverity::Warning | MessageSeverity::Error => {
                eprintln!("{}", message.message);
            }
            _ => {}
        },
    }
}
