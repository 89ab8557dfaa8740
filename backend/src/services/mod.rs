//! Services composing the Graph API client, object storage and metadata store

pub mod accounts;
pub mod insights;
pub mod publisher;

pub use accounts::AccountService;
pub use insights::InsightService;
pub use publisher::{MediaPublisher, PublishError, PublishImage, PublishOutcome};
