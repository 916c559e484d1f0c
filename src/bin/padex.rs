use padding_oracle::{aes_cbc::flag_message, logging, server, CbcOracle};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};

/// Padding oracle exploit exercise.
#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the encrypted message with the flag in base64 format
    Create {
        /// AES key (16, 24 or 32 bytes) in base64 format
        key: String,
        /// 16 byte initialization vector in base64 format
        iv: String,
        /// Flag string for the user
        flag: String,
    },
    /// Run the vulnerable oracle
    Run {
        /// AES key (16, 24 or 32 bytes) in base64 format
        key: String,
        /// 16 byte initialization vector in base64 format
        iv: String,
        /// Hostname of the web server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port of the web server
        #[arg(long, default_value_t = 12345)]
        port: u16,
    },
}

fn make_oracle(key: &str, iv: &str) -> Result<CbcOracle, Box<dyn std::error::Error>> {
    let key = STANDARD.decode(key.trim())?;
    let iv = STANDARD.decode(iv.trim())?;
    Ok(CbcOracle::new(&key, &iv)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    match Cli::parse().command {
        Command::Create { key, iv, flag } => {
            let oracle = make_oracle(&key, &iv)?;
            let ciphertext = oracle.encrypt(&flag_message(&flag));
            println!("{}", STANDARD.encode(ciphertext));
        }
        Command::Run {
            key,
            iv,
            host,
            port,
        } => {
            let oracle = make_oracle(&key, &iv)?;
            let config = server::ServerConfig { host, port };
            server::serve(config.address(), oracle).await?;
        }
    }
    Ok(())
}
