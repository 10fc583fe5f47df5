//! Food-ordering backend.
//!
//! Accounts place orders composed of menu items, settle payment from a
//! stored balance, rate and give feedback on orders, and get tag-based
//! recommendations derived from their order history.
//!
//! The invariants that matter all sit around money and order state:
//! - an account balance is never negative; every mutation goes through the
//!   conditional updates in [`ledger`], never read-then-write from handlers
//! - an order is settled exactly once; the debit and the paid flag commit
//!   together in one transaction in [`payment`]
//! - an order's estimated-ready time is its creation time plus the
//!   preparation time of its slowest item, derived in [`orders`]
//!
//! Authentication is a bearer JWT carrying the `(account id, username)`
//! pair; issued lifetime is capped at one hour ([`auth`]).

use std::time::Duration;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod feedback;
pub mod ledger;
pub mod models;
pub mod orders;
pub mod payment;
pub mod routes;
pub mod state;
pub mod tags;

#[cfg(test)]
pub(crate) mod testutil;

use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = routes::router().layer(cors).with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
