//! chaindht node binary.
//!
//! Starts a node backed by a DHT block store and libp2p networking, or, with
//! `-n`, a local in-process cluster for demos and manual testing.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use chaindht_net::{DhtHandlers, DhtNode, DhtTransport, MockCluster, NetworkConfig};
use chaindht_node::config::SendSpec;
use chaindht_node::{Node, NodeConfig};
use chaindht_wallet::store::load_or_create_wallets;

/// chaindht node — an experimental cryptocurrency that stores blocks in a
/// DHT instead of gossiping them.
#[derive(Parser, Debug)]
#[command(name = "chaindht-node", version, about = "chaindht node")]
struct Args {
    /// Bootstrap peer address to dial on startup.
    #[arg(short = 'c', value_name = "ip:port")]
    bootstrap: Option<String>,

    /// Address to listen on.
    #[arg(short = 'l', value_name = "addr:port", default_value = "0.0.0.0:3000")]
    listen: String,

    /// Data directory for wallets, chain headers, and unspent outputs.
    #[arg(short = 'f', value_name = "folder")]
    folder: Option<PathBuf>,

    /// Run the miner.
    #[arg(short = 'm')]
    mine: bool,

    /// Print known wallet addresses and exit.
    #[arg(short = 'w')]
    print_wallets: bool,

    /// Print periodic stats instead of a live status line.
    #[arg(short = 's')]
    stats: bool,

    /// Disable the live status line.
    #[arg(short = 'g')]
    no_gui: bool,

    /// Send a one-shot payment as `amount:destination` and exit.
    #[arg(short = 'S', value_name = "amount:dest")]
    send: Option<String>,

    /// Run a local in-process cluster of this many nodes instead of one.
    #[arg(short = 'n', default_value_t = 1)]
    cluster: u32,

    /// Verbosity, 0 (quietest) through 5 (loudest).
    #[arg(short = 'v', default_value_t = 0)]
    verbosity: u8,
}

impl Args {
    fn into_node_config(self) -> anyhow::Result<NodeConfig> {
        let default_data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("chaindht");
        let data_dir = self.folder.unwrap_or(default_data_dir);

        let (listen_addr, listen_port) =
            self.listen.rsplit_once(':').ok_or_else(|| anyhow::anyhow!("listen address must be addr:port, got {}", self.listen))?;
        let listen_port: u16 = listen_port.parse()?;

        let bootstrap_peer = match self.bootstrap {
            Some(addr) => {
                let (ip, port) = addr.rsplit_once(':').ok_or_else(|| anyhow::anyhow!("bootstrap address must be ip:port, got {addr}"))?;
                let port: u16 = port.parse()?;
                Some(format!("/ip4/{ip}/tcp/{port}"))
            }
            None => None,
        };

        let send = match self.send {
            Some(raw) => Some(SendSpec::parse(&raw).ok_or_else(|| anyhow::anyhow!("send must be amount:dest, got {raw}"))?),
            None => None,
        };

        Ok(NodeConfig {
            data_dir,
            network: NetworkConfig { listen_addr: listen_addr.to_string(), listen_port, bootstrap_peer, ..NetworkConfig::default() },
            mine: self.mine,
            print_wallets: self.print_wallets,
            stats_mode: self.stats,
            no_gui: self.no_gui,
            send,
            cluster_size: self.cluster.max(1),
            verbosity: self.verbosity,
        })
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match args.into_node_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid arguments: {e}");
            process::exit(1);
        }
    };

    init_logging(config.log_level());

    if let Err(e) = run(config).await {
        error!("{e}");
        process::exit(1);
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::filter::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    if config.print_wallets {
        let wallets = load_or_create_wallets(&config.data_dir)?;
        for wallet in &wallets {
            println!("{}", wallet.pub_pem);
        }
        return Ok(());
    }

    let nodes = if config.cluster_size > 1 {
        start_cluster(&config).await?
    } else {
        vec![start_single_node(&config).await?]
    };

    info!(nodes = nodes.len(), mine = config.mine, "chaindht node running");

    let primary = &nodes[0];

    if let Some(send) = config.send.clone() {
        let hash = primary.send(send.amount, &send.destination).await?;
        info!(tx = %hash, "sent");
        tokio::time::sleep(Duration::from_secs(5)).await;
        return Ok(());
    }

    if config.stats_mode {
        run_stats_loop(&nodes).await;
    } else if !config.no_gui {
        run_status_loop(&nodes).await;
    } else {
        wait_for_shutdown().await;
    }

    for node in &nodes {
        node.request_stop();
    }
    Ok(())
}

/// Start a single node backed by a real libp2p DHT transport.
async fn start_single_node(config: &NodeConfig) -> anyhow::Result<Arc<Node>> {
    let wallets = load_or_create_wallets(&config.data_dir)?;
    let wallet = wallets.into_iter().next().expect("load_or_create_wallets always returns at least one wallet");

    let node = Node::new(config.clone(), wallet);
    let handlers: Arc<dyn DhtHandlers> = Arc::clone(&node) as Arc<dyn DhtHandlers>;
    let transport = DhtNode::start(config.network.clone(), handlers).await?;
    node.attach_transport(Arc::new(transport) as Arc<dyn DhtTransport>)?;
    node.spawn_background_tasks();
    Ok(node)
}

/// Start `config.cluster_size` nodes sharing one in-process mock DHT, each
/// with its own wallet directory under `<data_dir>/node-<n>`. Intended for
/// local demos, not production deployment.
async fn start_cluster(config: &NodeConfig) -> anyhow::Result<Vec<Arc<Node>>> {
    let cluster = MockCluster::new();
    let mut nodes = Vec::with_capacity(config.cluster_size as usize);

    for i in 0..config.cluster_size {
        let member_config = NodeConfig { data_dir: config.data_dir.join(format!("node-{i}")), ..config.clone() };
        let wallets = load_or_create_wallets(&member_config.data_dir)?;
        let wallet = wallets.into_iter().next().expect("load_or_create_wallets always returns at least one wallet");

        let node = Node::new(member_config, wallet);
        let handlers: Arc<dyn DhtHandlers> = Arc::clone(&node) as Arc<dyn DhtHandlers>;
        let transport = cluster.join(handlers);
        node.attach_transport(Arc::new(transport) as Arc<dyn DhtTransport>)?;
        node.spawn_background_tasks();
        nodes.push(node);
    }

    Ok(nodes)
}

async fn wait_for_shutdown() {
    info!("running (ctrl+c to stop)");
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl+c, shutting down");
}

/// `-s`: print a detailed stats snapshot for every node every 5 seconds
/// until interrupted.
async fn run_stats_loop(nodes: &[Arc<Node>]) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for node in nodes {
                    let snap = node.snapshot();
                    println!(
                        "height={} balance={} pending={} hash_rate={:?} avg_hash_rate={:.1} found={} synced={} peers={}",
                        snap.engine.blocks_height,
                        snap.balance,
                        snap.engine.waiting_transaction_count,
                        snap.current_hash_rate,
                        snap.average_hash_rate,
                        snap.found_blocks,
                        snap.synced,
                        snap.connected_peers,
                    );
                    if let Some(last) = node.history().last() {
                        println!("  last activity: {} ({:+})", last.label, last.value);
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

/// Default foreground mode without `-g`/`-s`: a compact one-line status per
/// node every 2 seconds, standing in for a graphical dashboard.
async fn run_status_loop(nodes: &[Arc<Node>]) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for (i, node) in nodes.iter().enumerate() {
                    let snap = node.snapshot();
                    println!(
                        "[node {i}] height {} balance {} synced {} peers {}",
                        snap.engine.blocks_height, snap.balance, snap.synced, snap.connected_peers
                    );
                }
            }
            _ = &mut shutdown => break,
        }
    }
}
