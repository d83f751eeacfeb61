//! Server heartbeat failure listener.

use liveness_engine::{MessageLevel, Telemetry};
use mongodb::event::sdam::SdamEvent;
use mongodb::event::EventHandler;
use std::sync::Arc;
use tracing::error;

/// SDAM handler that logs failed heartbeats and forwards them to telemetry.
pub fn heartbeat_failure_handler(telemetry: Arc<dyn Telemetry>) -> EventHandler<SdamEvent> {
    EventHandler::callback(move |event: SdamEvent| {
        if let SdamEvent::ServerHeartbeatFailed(failed) = event {
            let message = format!(
                "Heartbeat to {} failed after {:?}: {}",
                failed.server_address, failed.duration, failed.failure
            );
            error!("{}", message);
            telemetry.capture_message(MessageLevel::Error, &message);
        }
    })
}
