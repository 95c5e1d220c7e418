use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "netchoice")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,
    #[arg(
        long = "data-dir",
        global = true,
        help = "Folder holding running node records"
    )]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "parse", about = "Resolve a network choice without connecting")]
    Parse {
        #[arg(help = "ecosystem:network:provider, a URL, an IPC path or pid://<pid>")]
        choice: String,
    },
    #[command(name = "list", about = "List known ecosystems and networks")]
    List {
        #[arg(long = "ecosystem", help = "Only show this ecosystem")]
        ecosystem: Option<String>,
    },
    #[command(name = "connect", about = "Connect and print the chain ID")]
    Connect {
        #[arg(help = "ecosystem:network:provider, a URL, an IPC path or pid://<pid>")]
        choice: String,
    },
    #[command(name = "nodes", about = "List recorded running nodes")]
    Nodes,
    #[command(name = "register-node", about = "Record a running node process")]
    RegisterNode {
        #[arg(long = "pid", help = "Process ID of the node")]
        pid: u32,
        #[arg(long = "ecosystem", default_value = "ethereum")]
        ecosystem: String,
        #[arg(long = "network", default_value = "local")]
        network: String,
        #[arg(long = "provider", default_value = "node")]
        provider: String,
        #[arg(long = "endpoint", help = "HTTP(S) URL or IPC path the node listens on")]
        endpoint: String,
    },
    #[command(name = "unregister-node", about = "Forget a recorded node process")]
    UnregisterNode {
        #[arg(help = "Process ID of the node")]
        pid: u32,
    },
    #[command(
        name = "cleanup-nodes",
        about = "Remove records of node processes that have exited"
    )]
    CleanupNodes,
}
