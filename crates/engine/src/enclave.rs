//! Isolated execution capability.
//!
//! Risk analysis and ordering may optionally run inside a trusted
//! environment so in-flight ordering decisions cannot be observed before
//! they are finalized. This is a hardening layer, not a correctness
//! dependency: the engine behaves identically (with reduced confidentiality
//! guarantees) when no executor is injected.

use tracing::debug;

/// How the isolated environment is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationMode {
    /// No hardware isolation; confidential sections are marked but run in
    /// the host process.
    Simulation,

    /// Hardware-backed isolation (e.g. an SGX enclave).
    Hardware,
}

impl IsolationMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IsolationMode::Simulation => "simulation",
            IsolationMode::Hardware => "hardware",
        }
    }
}

/// Marker for a confidential section in progress. Dropped when the section
/// ends.
pub struct IsolationSession {
    mode: IsolationMode,
}

impl IsolationSession {
    #[must_use]
    pub const fn mode(&self) -> IsolationMode {
        self.mode
    }
}

impl Drop for IsolationSession {
    fn drop(&mut self) {
        debug!(mode = self.mode.as_str(), "leaving confidential section");
    }
}

/// Injected capability for running analysis and ordering out of sight.
pub trait IsolatedExecutor: Send + Sync {
    /// The isolation mode this executor provides.
    fn mode(&self) -> IsolationMode;

    /// Enter a confidential section.
    fn enter(&self) -> IsolationSession {
        debug!(mode = self.mode().as_str(), "entering confidential section");
        IsolationSession { mode: self.mode() }
    }
}

/// Default executor: marks confidential sections without hardware backing.
pub struct SimulationExecutor;

impl IsolatedExecutor for SimulationExecutor {
    fn mode(&self) -> IsolationMode {
        IsolationMode::Simulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_executor_reports_its_mode() {
        let executor = SimulationExecutor;
        assert_eq!(executor.mode(), IsolationMode::Simulation);
        let session = executor.enter();
        assert_eq!(session.mode(), IsolationMode::Simulation);
    }
}
