pub mod handle;
pub mod history;
pub mod registry;

pub use handle::{CapabilityHandle, CapabilityKind, InvokeTarget};
pub use history::{FunctionSummary, HistoryAction, HistoryEntry};
pub use registry::{
    AddOutcome, CapabilityRegistry, CapabilitySummary, FunctionBinding, RegistrySnapshot,
    RemoveOutcome,
};
