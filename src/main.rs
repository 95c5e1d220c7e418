use clap::Parser;
use log::{error, LevelFilter};
use netchoice::{
    Command, Config, Endpoint, NetworkManager, NodeProcess, Opt, RunningNodes,
};
use std::process;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(opt: &Opt) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::new(),
    };
    if let Some(folder) = &opt.data_dir {
        config.data_folder = Some(folder.clone());
    }
    Ok(config)
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&opt)?;

    match opt.command {
        Command::Parse { choice } => {
            let manager = NetworkManager::from_config(config)?;
            let resolved = manager.resolve_str(&choice)?;
            println!("network_choice: {}", resolved.network_choice());
            println!("ecosystem:      {}", resolved.ecosystem);
            println!("network:        {}", resolved.network.name);
            println!("provider:       {}", resolved.provider);
            if let Some(chain_id) = resolved.network.chain_id {
                println!("chain_id:       {chain_id}");
            }
            if let Some(endpoint) = &resolved.endpoint {
                println!("endpoint:       {endpoint}");
            }
            if let Some(process) = &resolved.process {
                println!("pid:            {}", process.pid);
            }
        }
        Command::List { ecosystem } => {
            let manager = NetworkManager::from_config(config)?;
            let registry = manager.registry();
            let ecosystems: Vec<_> = match &ecosystem {
                Some(name) => vec![registry.get_ecosystem(name)?],
                None => registry.ecosystems().collect(),
            };
            for ecosystem in ecosystems {
                println!("{} (default: {})", ecosystem.name, ecosystem.default_network);
                for network in ecosystem.networks() {
                    let providers = manager.providers().names_for(network);
                    let chain_id = network
                        .chain_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {:<20} chain {:<10} providers: {}",
                        network.name,
                        chain_id,
                        if providers.is_empty() {
                            "(none)".to_string()
                        } else {
                            providers.join(", ")
                        }
                    );
                }
            }
        }
        Command::Connect { choice } => {
            let manager = NetworkManager::from_config(config)?;
            let mut provider = manager.parse_network_choice(&choice)?;
            let chain_id = provider.chain_id()?;
            println!("{} chain_id={chain_id}", provider.network_choice());
        }
        Command::Nodes => {
            let nodes = RunningNodes::open(&config.data_folder())?;
            if nodes.is_empty() {
                println!("No running nodes recorded");
            }
            for process in nodes.processes() {
                println!("{:>8}  {}", process.pid, process.network_choice());
            }
        }
        Command::RegisterNode {
            pid,
            ecosystem,
            network,
            provider,
            endpoint,
        } => {
            let mut nodes = RunningNodes::open(&config.data_folder())?;
            let process = NodeProcess {
                pid,
                ecosystem,
                network,
                provider,
                endpoint: Endpoint::parse(&endpoint)?,
            };
            let network_choice = process.network_choice();
            nodes.register(process)?;
            println!("Registered pid://{pid} ({network_choice})");
        }
        Command::UnregisterNode { pid } => {
            let mut nodes = RunningNodes::open(&config.data_folder())?;
            match nodes.unregister(pid)? {
                Some(process) => println!("Removed {}", process.network_choice()),
                None => println!("No record for PID {pid}"),
            }
        }
        Command::CleanupNodes => {
            let mut nodes = RunningNodes::open(&config.data_folder())?;
            let removed = nodes.cache_cleanup()?;
            println!("Removed {} dead node record(s)", removed.len());
        }
    }
    Ok(())
}
