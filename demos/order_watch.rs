//! Watch order notifications from the command line
//!
//! Run with: cargo run --example order_watch [USERNAME PASSWORD]
//!
//! Examples:
//!   cargo run --example order_watch                   # anonymous stream
//!   cargo run --example order_watch alice secret1     # log in first
//!
//! Environment:
//!   ORDERS_API       REST base URL (default http://localhost:8080/api)
//!   ORDERS_STREAM    SSE endpoint (default http://localhost:8080/api/notifications/subscribe)
//!   RUST_LOG         log filter, e.g. `order_notify_rs=debug`
//!
//! Press Ctrl+C to stop; the subscription is cancelled and the connection
//! closed before exiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use order_notify_rs::api::DEFAULT_BASE_URL;
use order_notify_rs::client::config::DEFAULT_ENDPOINT;
use order_notify_rs::{
    ApiClient, ApiConfig, ClientConfig, Credentials, NotificationClient, SessionCredentials,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_url = std::env::var("ORDERS_API").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let stream_url =
        std::env::var("ORDERS_STREAM").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

    let session = Arc::new(SessionCredentials::new());
    let api = ApiClient::new(ApiConfig::new(api_url), Arc::clone(&session))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [username, password] = args.as_slice() {
        let auth = api.login(&Credentials::new(username, password.clone())).await?;
        println!("Logged in as {}", auth.username);

        match api.list_orders(true).await {
            Ok(orders) => {
                println!("{} active order(s)", orders.len());
                for order in orders {
                    println!("  #{} [{}] {}", order.id, order.status, order.description.unwrap_or_default());
                }
            }
            Err(e) => eprintln!("Could not list orders: {}", e),
        }
    }

    let client = NotificationClient::new(ClientConfig::new(stream_url), Arc::clone(&session))?;

    let received = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&received);
    let subscription = client.subscribe(move |event| {
        if event.is_error() {
            println!("! stream error: {}", event.error_message().unwrap_or("unknown"));
            return;
        }

        counter.fetch_add(1, Ordering::Relaxed);
        match event.order_created() {
            Some(Ok(order)) => println!(
                "+ order #{} for customer {} ({}): {}",
                order.order_id,
                order.customer_id,
                order.status,
                order.description.as_deref().unwrap_or("-"),
            ),
            Some(Err(e)) => println!("? unreadable order payload: {}", e),
            None => println!("  {}", event),
        }
    })?;

    println!("Watching {} (Ctrl+C to stop)", client.endpoint());
    tokio::signal::ctrl_c().await?;

    subscription.cancel();
    let stats = client.stats();
    println!(
        "Received {} order(s); {} connection attempt(s), {} error(s)",
        received.load(Ordering::Relaxed),
        stats.connect_attempts,
        stats.transport_errors,
    );

    Ok(())
}
