//! Connection manager construction, health monitoring and shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use leasehold_lock::{
    ConnectError, ConnectionManager, ConnectionTopology, ManagerSettings, StoreError,
};
use leasehold_state::{ConnectionConfig, StoreConnector};
use leasehold_state_memory::{MemoryBackend, MemoryConnector};

use common::{fast_settings, init_tracing, manager_with};

// -- Construction Tests --

mod construction {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn failed_initial_connect_is_not_retried() {
        let connector = Arc::new(MemoryConnector::default());
        connector.refuse_next(1);

        let err = ConnectionManager::with_connector(
            ConnectionConfig::default(),
            fast_settings(),
            Arc::clone(&connector) as Arc<dyn StoreConnector>,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConnectError::Connect(StoreError::Connection(_))));
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_topology_config_fails_without_connecting() {
        let connector = Arc::new(MemoryConnector::default());
        let config = ConnectionConfig {
            topology: ConnectionTopology::Sentinel,
            master_group_name: None,
            ..ConnectionConfig::default()
        };

        let err = ConnectionManager::with_connector(
            config,
            fast_settings(),
            Arc::clone(&connector) as Arc<dyn StoreConnector>,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConnectError::Config(_)));
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sentinel_gets_a_distinct_secondary() {
        let connector = Arc::new(MemoryConnector::default());
        let config = ConnectionConfig {
            topology: ConnectionTopology::Sentinel,
            master_group_name: Some("mymaster".into()),
            ..ConnectionConfig::default()
        };
        let manager = manager_with(&connector, config).await;

        let primary = manager.primary().unwrap();
        let secondary = manager.secondary().unwrap();
        assert!(!Arc::ptr_eq(&primary, &secondary));
        assert_eq!(manager.topology(), ConnectionTopology::Sentinel);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cluster_and_master_slave_share_one_handle() {
        for topology in [ConnectionTopology::Cluster, ConnectionTopology::MasterSlave] {
            let connector = Arc::new(MemoryConnector::default());
            let config = ConnectionConfig {
                topology,
                ..ConnectionConfig::default()
            };
            let manager = manager_with(&connector, config).await;

            let primary = manager.primary().unwrap();
            let secondary = manager.secondary().unwrap();
            assert!(Arc::ptr_eq(&primary, &secondary), "{topology}");
            manager.shutdown().await;
        }
    }
}

// -- Health Monitor Tests --

mod health {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn healthy_store_is_probed_without_reconnecting() {
        let connector = Arc::new(MemoryConnector::default());
        let manager = manager_with(&connector, ConnectionConfig::default()).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(manager.is_healthy());
        assert_eq!(connector.attempts(), 1);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnection_is_bounded_then_recovers_on_the_next_cycle() {
        init_tracing();
        let backend = MemoryBackend::new();
        let connector = Arc::new(MemoryConnector::new(backend.clone()));
        let manager = manager_with(&connector, ConnectionConfig::default()).await;
        assert_eq!(connector.attempts(), 1);

        // Probe at 1s fails; three attempts 100ms apart finish at 1.2s.
        backend.set_online(false);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(connector.attempts(), 4);
        assert!(!manager.is_healthy());

        // The next probe, one interval after the sequence ended, succeeds.
        backend.set_online(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.attempts(), 5);
        assert!(manager.is_healthy());
        manager.primary().unwrap().ping().await.unwrap();
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refused_reconnects_keep_retrying_within_one_sequence() {
        let connector = Arc::new(MemoryConnector::default());
        let manager = manager_with(&connector, ConnectionConfig::default()).await;

        manager.primary().unwrap().close().await;
        connector.refuse_next(2);
        assert!(manager.reconnect().await);

        assert_eq!(connector.attempts(), 4);
        assert!(manager.is_healthy());
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn custom_settings_are_kept() {
        let connector = Arc::new(MemoryConnector::default());
        let settings = ManagerSettings {
            max_retries: 7,
            ..fast_settings()
        };
        let manager = ConnectionManager::with_connector(
            ConnectionConfig::default(),
            settings,
            Arc::clone(&connector) as Arc<dyn StoreConnector>,
        )
        .await
        .unwrap();

        assert_eq!(manager.settings().max_retries, 7);
        assert_eq!(manager.config().port, 6379);
        manager.shutdown().await;
    }
}

// -- Shutdown Tests --

mod shutdown {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_handles_and_is_idempotent() {
        let connector = Arc::new(MemoryConnector::default());
        let manager = manager_with(&connector, ConnectionConfig::default()).await;
        let held = manager.primary().unwrap();

        manager.shutdown().await;
        manager.shutdown().await;

        assert!(matches!(manager.primary(), Err(StoreError::Closed)));
        assert!(matches!(manager.secondary(), Err(StoreError::Closed)));
        assert!(matches!(held.ping().await, Err(StoreError::Closed)));
        assert!(!manager.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_a_distinct_secondary() {
        let connector = Arc::new(MemoryConnector::default());
        let config = ConnectionConfig {
            topology: ConnectionTopology::Sentinel,
            master_group_name: Some("mymaster".into()),
            ..ConnectionConfig::default()
        };
        let manager = manager_with(&connector, config).await;
        let secondary = manager.secondary().unwrap();

        manager.shutdown().await;
        assert!(matches!(secondary.ping().await, Err(StoreError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_reconnection_sequence() {
        let backend = MemoryBackend::new();
        let connector = Arc::new(MemoryConnector::new(backend.clone()));
        let settings = ManagerSettings {
            max_retries: 100,
            retry_interval: Duration::from_secs(3),
            ..fast_settings()
        };
        let manager = ConnectionManager::with_connector(
            ConnectionConfig::default(),
            settings,
            Arc::clone(&connector) as Arc<dyn StoreConnector>,
        )
        .await
        .unwrap();

        backend.set_online(false);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let before = connector.attempts();
        assert!(before >= 2);

        manager.shutdown().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts(), before);
    }
}
