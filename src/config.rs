use clap::Parser;
use url::Url;

/// Runtime parameters of a node
#[derive(Debug, Clone, Parser)]
#[command(name = "minichain", about = "A minimal proof-of-work ledger node")]
pub struct NodeConfig {
    /// Port the HTTP interface listens on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Bootstrap node used to resolve this node's address and pull initial
    /// state; a node that resolves to this same address is the network
    /// origin
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub bootstrap_url: Url,

    /// Leading zero bytes required of a block hash
    #[arg(long, default_value_t = 1)]
    pub difficulty: usize,

    /// Maximum number of transactions per block, reward included
    #[arg(long, default_value_t = 10)]
    pub max_transactions_per_block: usize,

    /// Amount credited by each mining reward
    #[arg(long, default_value_t = 50)]
    pub reward_amount: u64,

    /// Address credited with this node's mining rewards; a fresh wallet is
    /// generated (and its key logged) when omitted
    #[arg(long)]
    pub reward_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::parse_from(["minichain"]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.bootstrap_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.difficulty, 1);
        assert_eq!(config.max_transactions_per_block, 10);
        assert_eq!(config.reward_amount, 50);
        assert!(config.reward_address.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = NodeConfig::parse_from([
            "minichain",
            "--port",
            "9000",
            "--bootstrap-url",
            "http://10.0.0.1:8080",
            "--difficulty",
            "2",
            "--max-transactions-per-block",
            "4",
            "--reward-amount",
            "25",
        ]);

        assert_eq!(config.port, 9000);
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.max_transactions_per_block, 4);
        assert_eq!(config.reward_amount, 25);
    }
}
