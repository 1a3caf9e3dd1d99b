//! Temporal controls: rewind history, ghost preview, loop capture and
//! playback, time acceleration

pub mod acceleration;
pub mod ghost;
pub mod history;
pub mod loop_recorder;

pub use acceleration::TimeAcceleration;
pub use ghost::GhostBranch;
pub use history::HistoryBuffer;
pub use loop_recorder::{LoopPhase, LoopRecorder};
