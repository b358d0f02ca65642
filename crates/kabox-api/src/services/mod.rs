pub mod notifier;
pub mod upload;

pub use notifier::{notify, Notification, Notifier, NoopNotifier, TelegramNotifier};
pub use upload::{UploadItem, UploadService};
