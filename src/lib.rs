pub mod aes_cbc;
mod block;
pub mod bytes;
mod config;
mod error;
pub mod http;
pub mod logging;
mod message;
pub mod oracle;
pub mod server;

pub use aes_cbc::{CbcOracle, CipherError};
pub use block::BlockDecryptor;
pub use config::{AttackConfig, BLOCK_SIZE};
pub use error::{AttackError, SearchStage};
pub use http::HttpOracle;
pub use message::MessageDecryptor;
pub use oracle::{OracleError, PaddingOracle};
