use cipherkv_aead::Strategy;
use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "cipherkv",
    about = "Password-based authenticated encryption with externally stored metadata",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt text and print the ciphertext as hex.
    Encrypt {
        text: String,
        /// Overrides the configured or CRYPTO_PASSWORD default.
        #[arg(long)]
        password: Option<String>,
        /// Metadata backend: remote or file.
        #[arg(long)]
        store: Option<Strategy>,
    },
    /// Decrypt a hex ciphertext produced by `encrypt`.
    Decrypt {
        ciphertext: String,
        #[arg(long)]
        password: Option<String>,
        /// Remove the stored nonce and tag after loading them.
        #[arg(long)]
        delete: bool,
        #[arg(long)]
        store: Option<Strategy>,
    },
    /// Encrypt, decrypt and delete a probe value against the selected backend.
    Health {
        #[arg(long)]
        store: Option<Strategy>,
    },
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
