use std::future::Future;

use reqwest::StatusCode;

/// Something that can tell whether a probe decrypts to valid padding.
///
/// The probe is one or more blocks. Everything before the last block acts as
/// the preceding ciphertext (or IV) of the last block, and only the last
/// block's padding is judged.
///
/// Implementations must be safe to call concurrently, since blocks of a
/// message may be decrypted in parallel.
pub trait PaddingOracle: Sync {
    fn test(&self, probe: &[u8]) -> impl Future<Output = Result<bool, OracleError>> + Send;
}

impl<F> PaddingOracle for F
where
    F: Fn(&[u8]) -> Result<bool, OracleError> + Sync,
{
    fn test(&self, probe: &[u8]) -> impl Future<Output = Result<bool, OracleError>> + Send {
        std::future::ready(self(probe))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("probe of {len} bytes is not a positive multiple of the {block_size} byte block size")]
    MalformedProbe { len: usize, block_size: usize },
    #[error("oracle returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl OracleError {
    /// Whether the error is noise from the oracle harness that the search can
    /// count as an "invalid padding" answer and carry on.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::MalformedProbe { .. } => false,
            OracleError::UnexpectedStatus(_) => true,
            OracleError::Request(e) => e.is_timeout(),
        }
    }
}

pub fn check_probe_len(probe: &[u8], block_size: usize) -> Result<(), OracleError> {
    if block_size == 0 || probe.is_empty() || probe.len() % block_size != 0 {
        return Err(OracleError::MalformedProbe {
            len: probe.len(),
            block_size,
        });
    }
    Ok(())
}
