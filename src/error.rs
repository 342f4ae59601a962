use crate::game_tree::ActionId;

/// Errors surfaced to the continuation or estimation driver.
///
/// None of these are recovered from inside the crate. An unreachable
/// information set is not an error: beliefs fall back to uniform.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("support does not match the game it was built for")]
    MismatchedSupport,

    #[error("action {0:?} is not in the support")]
    NotInSupport(ActionId),

    #[error("action {0:?} belongs to the chance player")]
    ChanceAction(ActionId),

    #[error("invalid probability: {0}")]
    InvalidProbability(f64),

    #[error("log-probability of action {0:?} is undefined (profile is not interior)")]
    NonInterior(ActionId),

    #[error("expected a vector of length {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("invalid game: {0}")]
    InvalidGame(String),

    #[error("game does not have perfect recall")]
    ImperfectRecall,

    #[error("gradient unavailable at the current point")]
    GradientUnavailable,

    #[error("non-finite value encountered during minimization")]
    NonFinite,

    #[error("internal error in minimization code: line search could not bound a step")]
    LineSearch,
}

pub type Result<T> = std::result::Result<T, Error>;
