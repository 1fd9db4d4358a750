use client::cluster_client::ClusterClient;
use client::transport::TcpTransport;
use client::wire::Query;
use common::Config;
use logger::Logger;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

fn usage() -> ! {
    eprintln!(
        "usage: filedag-cli --conf <path> <put|get|has|size|delete|query> [args...]\n\
         \n\
         put KEY VALUE\n\
         get KEY\n\
         has KEY\n\
         size KEY\n\
         delete KEY\n\
         query [PREFIX]"
    );
    std::process::exit(2);
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().collect();

    let mut conf_path = None;
    let mut rest = Vec::new();
    let mut i = 1;
    while i < raw.len() {
        if raw[i] == "--conf" {
            i += 1;
            conf_path = raw.get(i).cloned();
        } else {
            rest.push(raw[i].clone());
        }
        i += 1;
    }

    let Some(conf_path) = conf_path else {
        usage();
    };
    if rest.is_empty() {
        usage();
    }

    let config = match Config::from_file(&conf_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config from {conf_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let transport = Arc::new(TcpTransport::new(Duration::from_secs(5)));
    let logger = Logger::null();
    let client = match ClusterClient::new(&config, transport, logger) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to build cluster client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = rest[0].as_str();
    let result = match command {
        "put" if rest.len() == 3 => client.put(&rest[1], rest[2].clone().into_bytes()).map(|_| ()),
        "get" if rest.len() == 2 => client.get(&rest[1]).map(|v| {
            println!("{}", String::from_utf8_lossy(&v));
        }),
        "has" if rest.len() == 2 => client.has(&rest[1]).map(|exists| {
            println!("{exists}");
        }),
        "size" if rest.len() == 2 => client.get_size(&rest[1]).map(|size| {
            println!("{size}");
        }),
        "delete" if rest.len() == 2 => client.delete(&rest[1]),
        "query" => {
            let prefix = rest.get(1).cloned().unwrap_or_default();
            let query = Query {
                prefix,
                ..Query::default()
            };
            let mut count = 0;
            let mut outcome = Ok(());
            for entry in client.query(query) {
                match entry {
                    Ok(entry) => {
                        println!("{}\t{}", entry.key, String::from_utf8_lossy(&entry.value));
                        count += 1;
                    }
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }
            outcome.map(|_| {
                eprintln!("{count} entries");
            })
        }
        _ => usage(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
