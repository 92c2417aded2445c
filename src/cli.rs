use clap::{Parser, Subcommand};

/// Barcode service: short-lived single-use codes backed by Redis
#[derive(Parser)]
#[command(name = "barcode", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to BARCODE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep barcodes in process memory instead of Redis (development only)
        #[arg(long)]
        memory: bool,
    },

    /// Run a single barcode operation against the configured Redis
    Code {
        #[command(subcommand)]
        command: CodeCommands,
    },
}

#[derive(Subcommand)]
pub enum CodeCommands {
    /// Issue a new barcode
    Generate {
        #[arg(long)]
        user_id: String,
    },
    /// Show a barcode and its current status
    Get { code: String },
    /// Mark a barcode as used
    Redeem { code: String },
    /// Check whether a barcode is still valid
    Check { code: String },
}
