//! Kabox API Library
//!
//! HTTP handlers, middleware and application setup for the file relay.

pub mod constants;
pub mod envelope;
mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
mod telemetry;
pub mod utils;

pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use services::notifier::{Notification, Notifier, NoopNotifier, TelegramNotifier};
pub use state::AppState;
