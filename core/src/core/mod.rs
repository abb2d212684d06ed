pub(crate) mod barrier;
pub mod control;
pub mod handoff;
pub mod scope;
pub mod stage;

// Re-export key types for easier access from other modules (and lib.rs)
pub use control::{RunReport, StageExit, StageReport, StageRole};
pub use handoff::{Delivery, HandoffReceiver, HandoffSender};
pub use scope::{CancelHandle, CancellationScope};
pub use stage::{Consumer, FnConsumer, FnProducer, FnTransform, Producer, Transform};
