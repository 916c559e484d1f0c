// Byte vector primitives used to build oracle probes.
use rand::RngCore;

pub fn xor_bytes(buf_a: &[u8], buf_b: &[u8]) -> Result<Vec<u8>, String> {
    if buf_a.len() != buf_b.len() {
        return Err(format!(
            "buffers are not of equal length ({} != {})",
            buf_a.len(),
            buf_b.len()
        ));
    }
    Ok(buf_a.iter().zip(buf_b.iter()).map(|(a, b)| a ^ b).collect())
}

/// Add one to `bytes`, read as a big-endian unsigned integer.
///
/// Overflow wraps to all zeros.
pub fn increment(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    for byte in out.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
    out
}

/// Copy of `bytes` with the byte at `index` incremented modulo 256.
pub fn tweak(bytes: &[u8], index: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out[index] = out[index].wrapping_add(1);
    out
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut out);
    out
}
