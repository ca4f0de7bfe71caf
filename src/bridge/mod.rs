pub mod progress;

pub use progress::{normalize_steps, BridgeProgress, BridgeProgressTracker, GasWait, StepProgress};
