// Headless driving example: connect to a portrait inference server, upload
// an image and sweep a slow head-turn gesture across the background region.
//
// FACEPUPPET_ENDPOINT  ws endpoint (default ws://localhost:8080/ws)
// FACEPUPPET_IMAGE     path to the portrait to upload

use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use facepuppet::{
    InteractionMode, PortraitController, SessionConfig, SessionEvent, TransportSession,
    WebSocketConnector,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let endpoint = std::env::var("FACEPUPPET_ENDPOINT")
        .unwrap_or_else(|_| "ws://localhost:8080/ws".to_string());
    let config = SessionConfig {
        endpoint: endpoint.clone(),
        ..Default::default()
    };

    let connector = WebSocketConnector::new(endpoint.clone());
    let (handle, mut events) = TransportSession::spawn(config, Box::new(connector));
    let mut controller = PortraitController::new(handle);

    info!("driving {endpoint}");

    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let mut uploaded = false;
    let mut t: f64 = 0.0;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                None => break,
                Some(SessionEvent::GaveUp { attempts }) => {
                    anyhow::bail!("gave up after {attempts} reconnect attempts");
                }
                Some(event) => controller.handle_event(event),
            },
            _ = ticker.tick() => {
                if !uploaded {
                    if let Ok(path) = std::env::var("FACEPUPPET_IMAGE") {
                        let bytes = std::fs::read(&path)
                            .with_context(|| format!("reading {path}"))?;
                        if controller.load_image(bytes).is_ok() {
                            info!("uploaded portrait from {path}");
                            uploaded = true;
                        }
                    } else {
                        uploaded = true; // nothing to upload, just sweep
                    }
                    continue;
                }
                // Slow figure-eight over the background: pure head motion.
                t += 0.05;
                let x = 0.5 + 0.35 * t.sin();
                let y = 0.5 + 0.2 * (2.0 * t).sin();
                let _ = controller.on_pointer(x, y, InteractionMode::Primary, None);
                controller.animation_tick(0.05);
            }
        }
    }

    controller.shutdown();
    Ok(())
}
