//! Scan orchestration: session state, per-frame pipeline and the threaded
//! scanner.

pub mod events;
pub mod machine;
pub mod scanner;
pub mod session;

pub use events::{ErrorCode, ProcessMessage, ProcessUpdate, ScanEvent, ScanObserver, ScanTitle};
pub use machine::{FrameOutcome, ScanStateMachine};
pub use scanner::{ScanStats, Scanner, SubmitOutcome};
pub use session::{Pass, ScanPhase, ScanSession};
