//! Domain layer: sessions, checkpoints and progress tracking.

pub mod checkpoint;
pub mod progress;
pub mod session;

pub use checkpoint::{Checkpoint, FlowStart, FlowStatus, IoOutcome, JournalEntry, SuspensionKind};
pub use progress::{ProgressChange, ProgressTracker, Step, DONE, UNSTARTED};
pub use session::{
    FlowInfo, FlowSession, MessageBody, Payload, RunId, SessionId, SessionMessage, SessionRecord,
    UntrustworthyData,
};
