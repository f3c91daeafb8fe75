//! Core data model shared by every component of the session/agent
//! orchestration engine: sessions, messages, parts, snapshots, and the
//! event catalogue.

pub mod event;
pub mod part;
pub mod session;
pub mod snapshot;

pub use event::Event;
pub use event::EventKind;
pub use part::Part;
pub use part::PartKind;
pub use part::ToolCallStatus;
pub use session::Message;
pub use session::MessageId;
pub use session::MessageRole;
pub use session::ProviderMetadata;
pub use session::Session;
pub use session::SessionId;
pub use session::SessionRevert;
pub use snapshot::ChangeType;
pub use snapshot::FileDiff;
pub use snapshot::SnapshotHandle;
pub use snapshot::SnapshotInfo;
