use std::time::Duration;

use crate::AttackError;

pub const BLOCK_SIZE: usize = 16;

/// Tuning for a padding oracle attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackConfig {
    /// Cipher block size in bytes.
    pub block_size: usize,
    /// Most oracle queries a single brute-force search may make before
    /// giving up with [`AttackError::ExhaustedSearch`].
    pub max_attempts: u64,
    /// How many blocks to decrypt at once. 1 is sequential.
    pub concurrency: usize,
    /// Upper bound on the time spent decrypting any one block.
    pub block_timeout: Option<Duration>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            max_attempts: 1 << 16,
            concurrency: 1,
            block_timeout: None,
        }
    }
}

impl AttackConfig {
    pub fn validate(&self) -> Result<(), AttackError> {
        // Padding lengths must fit in a byte.
        if !(1..=255).contains(&self.block_size) {
            return Err(AttackError::MalformedInput(format!(
                "block size must be between 1 and 255, got {}",
                self.block_size
            )));
        }
        if self.max_attempts == 0 {
            return Err(AttackError::MalformedInput(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(AttackError::MalformedInput(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
