#[cfg(test)]
mod tests {
    use crate::utils::*;
    use client::transport::TcpTransport;
    use client::wire::Query;
    use common::ClusterErrorKind;
    use node::bootstrap;
    use node::share::ShareService;
    use node::InMemoryStore;
    use node::StorageNode;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_01_three_node_put_get_has_size_delete() {
        let (mut handles, config) = cluster_of(3);
        let client = client_for(&config);

        let dataset = fixed_dataset();
        for (key, value) in &dataset {
            client.put(key, value.clone()).unwrap();
        }
        for (key, value) in &dataset {
            assert!(client.has(key).unwrap(), "expected has({key}) to be true");
            assert_eq!(client.get_size(key).unwrap() as usize, value.len());
            assert_eq!(&client.get(key).unwrap(), value);
        }
        for (key, _) in &dataset {
            client.delete(key).unwrap();
            assert!(!client.has(key).unwrap(), "expected has({key}) to be false after delete");
        }

        for handle in &mut handles {
            handle.close();
        }
    }

    #[test]
    fn test_02_cluster_query_fan_out_returns_every_key() {
        let (mut handles, config) = cluster_of(3);
        let client = client_for(&config);

        let dataset = fixed_dataset();
        for (key, value) in &dataset {
            client.put(key, value.clone()).unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        for entry in client.query(Query::default()) {
            let entry = entry.unwrap();
            assert!(entry.key.starts_with('/'), "expected a normalized key, got {}", entry.key);
            let normalized_key = entry.key.trim_start_matches('/').to_string();
            let expected = dataset
                .iter()
                .find(|(key, _)| *key == normalized_key)
                .unwrap_or_else(|| panic!("query returned unexpected key {normalized_key}"));
            assert_eq!(entry.value, expected.1);
            seen.insert(normalized_key);
        }
        assert_eq!(seen.len(), dataset.len());

        for handle in &mut handles {
            handle.close();
        }
    }

    #[test]
    fn test_03_early_query_cancellation_closes_every_producer_quickly() {
        let (mut handles, config) = cluster_of(3);
        let client = client_for(&config);

        let dataset = fixed_dataset();
        for (key, value) in &dataset {
            client.put(key, value.clone()).unwrap();
        }

        let started = Instant::now();
        let mut query = client.query(Query::default());
        let first = query.next();
        assert!(first.is_some());
        drop(query);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "closing the query iterator took too long"
        );

        for handle in &mut handles {
            handle.close();
        }
    }

    #[test]
    fn test_04_put_against_a_silent_peer_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_thread = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(3));
            drop(stream);
        });

        let descriptor = common::NodeDescriptor {
            id: "node-silent".to_string(),
            slots: common::SlotRange::new(0, 0),
            addresses: vec![addr.to_string()],
        };
        let table = common::SlotTable::build(vec![descriptor]).unwrap();
        let config = common::Config {
            identity: common::Identity::generate(),
            addresses: common::Addresses { swarm: vec![] },
            conf_path: None,
            nodes: table.nodes().to_vec(),
            disable_delete: false,
            read_only_client: false,
            bootstrap_node: None,
            identity_list: None,
            local_store_config: None,
        };
        let client = client_for_with_timeout(&config, Duration::from_secs(1));

        let started = Instant::now();
        let result = client.put("some-key", b"value".to_vec());
        let elapsed = started.elapsed();

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind, ClusterErrorKind::Timeout);
        assert!(elapsed < Duration::from_secs(2), "timeout took too long: {elapsed:?}");

        let _ = accept_thread.join();
    }

    #[test]
    fn test_05_disable_delete_makes_delete_a_no_op() {
        let mut handles = vec![NodeHandle::spawn_with_disable_delete("node-0")];
        let config = config_for(&handles);
        let client = client_for(&config);

        client.put("durable-key", b"original".to_vec()).unwrap();
        client.delete("durable-key").unwrap();

        assert!(client.has("durable-key").unwrap());
        assert_eq!(client.get("durable-key").unwrap(), b"original".to_vec());

        for handle in &mut handles {
            handle.close();
        }
    }

    #[test]
    fn test_06_bootstrap_handshake_forms_expected_slot_table() {
        let bootstrap_node = NodeHandle::spawn("bootstrap-node");
        let second_identity = common::Identity::generate();
        let third_identity = common::Identity::generate();

        let descriptors = vec![
            common::NodeDescriptor {
                id: bootstrap_node.id.clone(),
                slots: common::SlotRange::new(0, 0),
                addresses: vec![bootstrap_node.addr.clone()],
            },
            common::NodeDescriptor {
                id: "pending-second".to_string(),
                slots: common::SlotRange::new(0, 0),
                addresses: vec!["127.0.0.1:1".to_string()],
            },
            common::NodeDescriptor {
                id: "pending-third".to_string(),
                slots: common::SlotRange::new(0, 0),
                addresses: vec!["127.0.0.1:1".to_string()],
            },
        ];
        let table = common::SlotTable::build(descriptors).unwrap();
        let identity_list = vec![
            bootstrap_node_identity(),
            second_identity.clone(),
            third_identity.clone(),
        ];

        let mut share = ShareService::new(table.nodes().to_vec(), identity_list, logger::Logger::null());
        let share_addr = share.serve("127.0.0.1:0").unwrap();

        let transport: Arc<dyn client::transport::PeerTransport> =
            Arc::new(TcpTransport::new(Duration::from_secs(5)));

        let second_config = bootstrap::provision(
            &share_addr.to_string(),
            1,
            "127.0.0.1:0",
            Arc::clone(&transport),
        )
        .unwrap();
        let third_config = bootstrap::provision(
            &share_addr.to_string(),
            2,
            "127.0.0.1:0",
            Arc::clone(&transport),
        )
        .unwrap();

        assert_eq!(second_config.identity.peer_id(), second_identity.peer_id());
        assert_eq!(third_config.identity.peer_id(), third_identity.peer_id());
        assert_eq!(second_config.nodes.len(), 3);
        assert_eq!(third_config.nodes.len(), 3);

        let mut second_server = StorageNode::new(
            second_config.identity.peer_id().to_string(),
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            logger::Logger::null(),
        );
        let mut third_server = StorageNode::new(
            third_config.identity.peer_id().to_string(),
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            logger::Logger::null(),
        );
        let second_addr = second_server.serve("127.0.0.1:0").unwrap();
        let third_addr = third_server.serve("127.0.0.1:0").unwrap();

        let mut nodes = table.nodes().to_vec();
        nodes[1].addresses = vec![second_addr.to_string()];
        nodes[2].addresses = vec![third_addr.to_string()];

        let config = common::Config {
            identity: common::Identity::generate(),
            addresses: common::Addresses { swarm: vec![] },
            conf_path: None,
            nodes,
            disable_delete: false,
            read_only_client: false,
            bootstrap_node: None,
            identity_list: None,
            local_store_config: None,
        };
        let client = client_for(&config);
        assert_eq!(client.nodes_count(), 3);
        client.put("bootstrap-smoke-key", b"ok".to_vec()).unwrap();
        assert_eq!(client.get("bootstrap-smoke-key").unwrap(), b"ok".to_vec());

        share.close();
        second_server.close();
        third_server.close();
        drop(bootstrap_node);
    }

    fn bootstrap_node_identity() -> common::Identity {
        common::Identity::generate()
    }
}
