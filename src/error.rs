use std::fmt;

use crate::OracleError;

#[derive(Debug, thiserror::Error)]
pub enum AttackError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("gave up on {stage} after {attempts} oracle queries")]
    ExhaustedSearch { stage: SearchStage, attempts: u64 },
    #[error("block {block} was not decrypted within the time limit")]
    TimedOut { block: usize },
}

/// The oracle search loop that ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    InitialPadding,
    PaddingLength,
    Byte { position: usize },
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStage::InitialPadding => write!(f, "the initial padding search"),
            SearchStage::PaddingLength => write!(f, "the padding length scan"),
            SearchStage::Byte { position } => write!(f, "the search for byte {}", position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_search_names_the_stage() {
        let err = AttackError::ExhaustedSearch {
            stage: SearchStage::Byte { position: 3 },
            attempts: 256,
        };

        assert_eq!(
            err.to_string(),
            "gave up on the search for byte 3 after 256 oracle queries"
        );
    }
}
