//! Processing stations of the standard pipeline

use crate::kind::{GridKind, OperationKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StationType {
    /// Problem formulation: supplies axioms and basis
    S1,
    /// Requirements: `C = A * B`
    S2,
    /// Objectives: `J`, `F`, `D`
    S3,
    /// Assessment: `W = A × B`
    S4,
}

impl StationType {
    /// Label stored in grid metadata
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            StationType::S1 => "problem_formulation",
            StationType::S2 => "requirements",
            StationType::S3 => "objectives",
            StationType::S4 => "assessment",
        }
    }

    /// Station an operation belongs to by default
    #[must_use]
    pub const fn for_operation(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Combine => StationType::S2,
            OperationKind::Interpret | OperationKind::Elementwise | OperationKind::Merge => {
                StationType::S3
            }
            OperationKind::Expand => StationType::S4,
        }
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Declared inputs, outputs and operations of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub kind: StationType,
    pub inputs: Vec<GridKind>,
    pub outputs: Vec<GridKind>,
    pub operations: Vec<OperationKind>,
}

impl Station {
    /// The four stations in execution order
    #[must_use]
    pub fn standard() -> Vec<Station> {
        use GridKind::{A, B, C, D, F, J, W};
        vec![
            Station {
                kind: StationType::S1,
                inputs: vec![],
                outputs: vec![A, B],
                operations: vec![],
            },
            Station {
                kind: StationType::S2,
                inputs: vec![A, B],
                outputs: vec![C],
                operations: vec![OperationKind::Combine],
            },
            Station {
                kind: StationType::S3,
                inputs: vec![A, B, C],
                outputs: vec![J, F, D],
                operations: vec![
                    OperationKind::Interpret,
                    OperationKind::Elementwise,
                    OperationKind::Merge,
                ],
            },
            Station {
                kind: StationType::S4,
                inputs: vec![A, B],
                outputs: vec![W],
                operations: vec![OperationKind::Expand],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_has_exactly_one_station() {
        let stations = Station::standard();
        for kind in OperationKind::ALL {
            let owners: Vec<_> = stations
                .iter()
                .filter(|s| s.operations.contains(&kind))
                .map(|s| s.kind)
                .collect();
            assert_eq!(owners, vec![StationType::for_operation(kind)]);
        }
    }

    #[test]
    fn outputs_are_produced_once() {
        let mut outputs: Vec<_> = Station::standard()
            .into_iter()
            .flat_map(|s| s.outputs)
            .collect();
        let total = outputs.len();
        outputs.sort();
        outputs.dedup();
        assert_eq!(outputs.len(), total);
        assert_eq!(total, GridKind::ALL.len());
    }

    #[test]
    fn labels() {
        assert_eq!(StationType::S2.to_string(), "requirements");
        assert_eq!(
            StationType::for_operation(OperationKind::Expand).label(),
            "assessment"
        );
    }
}
