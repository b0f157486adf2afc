mod notifier;
mod orchestrator;
mod progress;
mod registry;
mod transport;
mod types;

pub use notifier::{Notification, NotificationKind, Notifier};
pub use orchestrator::{UploadOrchestrator, UploadStrategy};
pub use registry::{FileRegistry, SharedRegistry};
pub use transport::{HealthStatus, HttpTransport, ShareLink, Transport};
pub use types::{FileRef, UploadItem, UploadStatus};
