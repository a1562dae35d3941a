//! External capabilities and their built-in implementations

pub mod emby;
pub mod filename_parser;
pub mod media_server;
pub mod metadata;
pub mod notifications;
pub mod organizer;
pub mod rate_limiter;
pub mod recognizer;
pub mod tmdb;

pub use emby::EmbyClient;
pub use media_server::MediaServer;
pub use metadata::{EpisodeInfo, MetadataService, SeriesMatch};
pub use notifications::{LogNotifier, Notification, NotificationSink, Severity, WebhookNotifier};
pub use organizer::{LibraryMover, TransferMode, TransferRequest, TransferResult, TransferService};
pub use recognizer::{FilenameRecognizer, MediaKind, MediaRecognizer, RecognizedMedia};
pub use tmdb::TmdbClient;
