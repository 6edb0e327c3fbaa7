use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid step index: {0}")]
    InvalidStepIndex(usize),

    #[error("cyclic dependency detected among steps: {0:?}")]
    CyclicDependency(Vec<usize>),

    #[error("dependency index {0} is out of range (plan has {1} steps)")]
    DependencyOutOfRange(usize, usize),

    #[error("unknown step description: {0:?}")]
    UnknownStepDescription(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
