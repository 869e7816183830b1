//! Reconciliation state machine
//!
//! A reconciliation starts from the classification of the observed console
//! record and walks [`transition`] until it reaches [`Phase::Converged`].
//! Each step names the single remote action to perform.

use std::fmt;

use super::params::DesiredState;
use crate::console::ComponentState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No console record for the node
    Absent,
    /// A deployed node is known to the console
    PresentClean,
    /// The console record exists but the deployment behind it does not
    PresentCorrupt,
    Creating,
    Updating,
    Converged,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Absent => "Absent",
            Phase::PresentClean => "PresentClean",
            Phase::PresentCorrupt => "PresentCorrupt",
            Phase::Creating => "Creating",
            Phase::Updating => "Updating",
            Phase::Converged => "Converged",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Delete,
    DeleteUnmanaged,
    Create,
    Update,
    /// Admin certificates, system channel join and readiness
    Finalize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub next: Phase,
}

impl Step {
    const fn new(action: Action, next: Phase) -> Self {
        Self { action, next }
    }
}

/// Classify what the console reports for the node
pub fn classify(observed: Option<&ComponentState>) -> Phase {
    match observed {
        None => Phase::Absent,
        Some(node) if node.is_corrupt() => Phase::PresentCorrupt,
        Some(_) => Phase::PresentClean,
    }
}

/// The action to take from `phase` and the phase it leads to
pub fn transition(phase: Phase, desired: DesiredState) -> Step {
    use Action as A;
    use DesiredState::{Absent as Gone, Present as Wanted};

    match (phase, desired) {
        (Phase::Converged, _) => Step::new(A::None, Phase::Converged),
        (Phase::Absent, Gone) => Step::new(A::None, Phase::Converged),
        (Phase::PresentClean | Phase::PresentCorrupt, Gone) => {
            Step::new(A::Delete, Phase::Converged)
        }
        (Phase::PresentCorrupt, Wanted) => Step::new(A::DeleteUnmanaged, Phase::Absent),
        (Phase::Absent, Wanted) => Step::new(A::Create, Phase::Creating),
        (Phase::PresentClean, Wanted) => Step::new(A::Update, Phase::Updating),
        (Phase::Creating | Phase::Updating, Wanted) => Step::new(A::Finalize, Phase::Converged),
        // Creating and Updating are only reached while the node is wanted
        (Phase::Creating | Phase::Updating, Gone) => Step::new(A::None, Phase::Converged),
    }
}
