//! Notification Worker Service
//!
//! Binary entry point for the admin notification relay.

#[tokio::main]
async fn main() {
    if let Err(e) = zerg_notification_worker::run().await {
        eprintln!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}
