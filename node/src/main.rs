use client::transport::TcpTransport;
use common::Config;
use logger::Logger;
use node::bootstrap;
use node::interceptor::AccessTokenInterceptor;
use node::{InMemoryStore, StorageNode};
use std::sync::Arc;
use std::time::Duration;

struct Args {
    conf: Option<String>,
    bootstrapper: Option<String>,
    identity_index: u32,
    disable_delete: bool,
    listen: String,
}

fn parse_args() -> Args {
    let raw: Vec<String> = std::env::args().collect();
    let mut args = Args {
        conf: None,
        bootstrapper: None,
        identity_index: 0,
        disable_delete: false,
        listen: "127.0.0.1:7000".to_string(),
    };

    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--conf" => {
                i += 1;
                args.conf = raw.get(i).cloned();
            }
            "--bootstrapper" => {
                i += 1;
                args.bootstrapper = raw.get(i).cloned();
            }
            "--identity" => {
                i += 1;
                args.identity_index = raw.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
            }
            "--listen" => {
                i += 1;
                if let Some(addr) = raw.get(i) {
                    args.listen = addr.clone();
                }
            }
            "--disable-delete" => {
                args.disable_delete = true;
            }
            _ => {}
        }
        i += 1;
    }
    args
}

fn main() {
    let args = parse_args();
    let logger = Logger::new("node.log");
    let transport = Arc::new(TcpTransport::new(Duration::from_secs(5)));

    let config = match &args.conf {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config from {path}: {e}");
                std::process::exit(1);
            }
        },
        None => {
            let Some(bootstrapper) = &args.bootstrapper else {
                eprintln!("neither --conf nor --bootstrapper was provided");
                std::process::exit(1);
            };
            match bootstrap::provision(
                bootstrapper,
                args.identity_index,
                &args.listen,
                Arc::clone(&transport) as Arc<dyn client::transport::PeerTransport>,
            ) {
                Ok(mut config) => {
                    config.disable_delete = args.disable_delete;
                    if let Err(e) = config.save("node.conf.json") {
                        eprintln!("failed to persist provisioned config: {e}");
                    }
                    config
                }
                Err(e) => {
                    eprintln!("bootstrap provisioning failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    };

    let node_id = config.identity.peer_id().to_string();
    let local_store = Arc::new(InMemoryStore::new());
    let file_store = Arc::new(InMemoryStore::new());

    let mut server = StorageNode::new(node_id.clone(), local_store, file_store, logger.clone())
        .with_disable_delete(config.disable_delete || args.disable_delete);

    if let Some(identity_list) = &config.identity_list {
        let tokens: Vec<String> = identity_list
            .iter()
            .map(|identity| identity.peer_id().to_string())
            .collect();
        server = server.with_interceptor(Box::new(AccessTokenInterceptor::new(tokens)));
    }

    let listen_addr = config
        .addresses
        .swarm
        .first()
        .cloned()
        .unwrap_or(args.listen);

    match server.serve(&listen_addr) {
        Ok(addr) => {
            println!("node {node_id} listening on {addr}");
        }
        Err(e) => {
            eprintln!("failed to start node: {e}");
            std::process::exit(1);
        }
    }

    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
