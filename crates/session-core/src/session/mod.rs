//! Call lifecycle: the per-call session and the registry of active calls

pub mod call;
pub mod registry;

pub use call::CallSession;
pub use registry::CallRegistry;
