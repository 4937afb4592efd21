use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Portfolio flow engine: chain ordering, zap-in minimums, and step-by-step
/// transaction flow charts for multi-chain DeFi portfolios.
#[derive(Parser)]
#[command(name = "zap-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ChartFormat {
    Json,
    Ascii,
    Dot,
}

impl ChartFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartFormat::Json => "json",
            ChartFormat::Ascii => "ascii",
            ChartFormat::Dot => "dot",
        }
    }
}

/// Token options shared by `flowchart` and `simulate`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TokenArgs {
    /// Input token as "symbol-address-decimals" (zapIn)
    #[arg(long)]
    pub token: Option<String>,

    /// Output token symbol (zapOut, claimAndSwap)
    #[arg(long)]
    pub output_token: Option<String>,

    /// Output token address (zapOut, claimAndSwap)
    #[arg(long)]
    pub output_token_address: Option<String>,

    /// Intermediate token for rebalances, as "symbol-address-decimals"
    #[arg(long)]
    pub middle_token: Option<String>,

    /// Chain the wallet is currently on
    #[arg(long, default_value = "arbitrum")]
    pub chain: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schemas for portfolio definitions and flow charts
    Schema,

    /// Output an example portfolio definition JSON to stdout
    Example,

    /// Validate a portfolio definition JSON file
    Validate {
        /// Path to the portfolio JSON file
        file: PathBuf,
    },

    /// Sort chains for a multi-chain action and print the next one
    Order {
        /// Chains taking part in the action
        #[arg(long, value_delimiter = ',')]
        chains: Vec<String>,

        /// Chains whose leg has already completed
        #[arg(long, value_delimiter = ',')]
        done: Vec<String>,

        /// Chain the wallet is currently on
        #[arg(long)]
        current: Option<String>,
    },

    /// Print the minimum zap-in amount for a token
    Minimum {
        /// Path to the portfolio JSON file
        file: PathBuf,

        /// Token as "symbol-address-decimals"
        #[arg(long)]
        token: String,

        /// Only deposit on the current chain (no bridging)
        #[arg(long)]
        skip_bridge: bool,

        /// Chain the wallet is currently on
        #[arg(long, default_value = "arbitrum")]
        chain: String,
    },

    /// Build the flow chart for an action
    Flowchart {
        /// Path to the portfolio JSON file
        file: PathBuf,

        /// zapIn, zapOut, claimAndSwap, transfer, stake, rebalance,
        /// crossChainRebalance, or localRebalance
        #[arg(long)]
        action: String,

        #[command(flatten)]
        tokens: TokenArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: ChartFormat,

        /// Output file path (default: stdout for json/ascii/dot, required for svg/png)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Run an action end to end against a dry-run wallet
    Simulate {
        /// Path to the portfolio JSON file
        file: PathBuf,

        /// zapIn, zapOut, claimAndSwap, transfer, stake, or rebalance
        #[arg(long)]
        action: String,

        #[command(flatten)]
        tokens: TokenArgs,

        /// Amount of the input token (zapIn)
        #[arg(long, default_value = "0")]
        amount: f64,

        /// Transfer recipient (transfer)
        #[arg(long)]
        recipient: Option<String>,

        /// Wallet address to simulate as
        #[arg(long, default_value = "0x0000000000000000000000000000000000000001")]
        address: String,

        /// Snapshot/session cache directory (default: platform cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Write the outcome as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
