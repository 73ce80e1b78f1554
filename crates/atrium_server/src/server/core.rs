//! Core sync server implementation.
//!
//! This module contains the main `SyncServer` struct and its
//! implementation, providing the central orchestration of all server
//! components: connection management, room aggregation, quality
//! estimation, and the periodic flush and heartbeat cycles.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    heartbeat::HeartbeatService,
    messaging::MessageRouter,
    quality::QualityEstimator,
    rooms::RoomRegistry,
    scheduler::BroadcastScheduler,
    server::handlers::handle_connection,
    stats::SyncStats,
};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{error, info, warn};

/// The core sync server structure.
///
/// `SyncServer` owns every component explicitly - no process-wide
/// singletons or ambient timers. All periodic tasks are spawned at start
/// and stop on the shutdown signal; dropping the server after shutdown
/// releases everything.
///
/// # Architecture
///
/// * **Connection Manager** - WebSocket lifecycle and outbound fanout
/// * **Room Registry** - per-room last-write-wins buffers, one lock each
/// * **Quality Estimator** - heartbeat RTT/loss per connection
/// * **Broadcast Scheduler** - adaptive-cadence flush cycle
/// * **Heartbeat Service** - probe emission and loss sweeping
pub struct SyncServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Manager for client connections and messaging
    connection_manager: Arc<ConnectionManager>,

    /// Registry of live rooms and their buffers
    rooms: Arc<RoomRegistry>,

    /// Per-connection network quality measurements
    quality: Arc<QualityEstimator>,

    /// Workload counters
    stats: Arc<RwLock<SyncStats>>,

    /// Typed dispatch for inbound client messages
    router: Arc<MessageRouter>,

    /// Adaptive flush cycle
    scheduler: Arc<BroadcastScheduler>,

    /// Probe emission and sweeping
    heartbeat: Arc<HeartbeatService>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl SyncServer {
    /// Creates a new sync server with the specified configuration.
    ///
    /// Initializes all components; the server is ready to start after
    /// construction.
    pub fn new(config: ServerConfig) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let rooms = Arc::new(RoomRegistry::new(config.sync.max_entities_per_room));
        let quality = Arc::new(QualityEstimator::new(
            config.heartbeat.window,
            config.heartbeat.interval(),
        ));
        let stats = Arc::new(RwLock::new(SyncStats::default()));
        let router = Arc::new(MessageRouter::new(
            connection_manager.clone(),
            rooms.clone(),
            quality.clone(),
            stats.clone(),
        ));
        let scheduler = Arc::new(BroadcastScheduler::new(
            rooms.clone(),
            quality.clone(),
            connection_manager.clone(),
            stats.clone(),
            config.sync.max_sample_age(),
        ));
        let heartbeat = Arc::new(HeartbeatService::new(
            connection_manager.clone(),
            quality.clone(),
            stats.clone(),
        ));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            connection_manager,
            rooms,
            quality,
            stats,
            router,
            scheduler,
            heartbeat,
            shutdown_sender,
        }
    }

    /// Starts the sync server and begins accepting connections.
    ///
    /// # Startup Sequence
    ///
    /// 1. Spawn the flush cycle at the configured base tick
    /// 2. Spawn the heartbeat cycle at the configured interval
    /// 3. Bind the TCP listener and run the accept loop until shutdown
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a
    /// `ServerError` if there was a failure during startup or operation.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting sync server on {}", self.config.bind_address);

        self.spawn_flush_cycle();
        self.spawn_heartbeat_cycle();

        let listener = tokio::net::TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind listener: {e}")))?;
        info!("✅ Listening on {}", self.config.bind_address);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.connection_manager.connection_count().await
                                >= self.config.max_connections
                            {
                                warn!("🚫 Rejecting connection from {}: at capacity", addr);
                                drop(stream);
                                continue;
                            }
                            let connection_manager = self.connection_manager.clone();
                            let router = self.router.clone();

                            // Spawn individual connection handler
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, addr, connection_manager, router)
                                        .await
                                {
                                    error!("Connection error: {:?}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            break;
                        }
                    }
                }
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Spawns the periodic flush cycle.
    ///
    /// The base tick only bounds cadence granularity: each cycle checks
    /// every room against its adaptive interval and skips rooms that are
    /// not due.
    fn spawn_flush_cycle(&self) {
        let scheduler = self.scheduler.clone();
        let mut shutdown = self.shutdown_sender.subscribe();
        let tick = self.config.sync.flush_tick();

        tokio::spawn(async move {
            let mut ticker = interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => scheduler.run_cycle().await,
                    _ = shutdown.recv() => {
                        info!("🕒 Flush cycle stopping - shutdown initiated");
                        break;
                    }
                }
            }
        });
    }

    /// Spawns the periodic heartbeat cycle.
    fn spawn_heartbeat_cycle(&self) {
        let heartbeat = self.heartbeat.clone();
        let mut shutdown = self.shutdown_sender.subscribe();
        let tick = self.config.heartbeat.interval();

        tokio::spawn(async move {
            let mut ticker = interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => heartbeat.run_cycle().await,
                    _ = shutdown.recv() => {
                        info!("💓 Heartbeat cycle stopping - shutdown initiated");
                        break;
                    }
                }
            }
        });
    }

    /// Initiates server shutdown.
    ///
    /// Signals the accept loop and all periodic cycles to stop.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Snapshot of the current workload counters.
    pub async fn stats(&self) -> SyncStats {
        self.stats.read().await.clone()
    }

    /// Number of currently live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Number of currently tracked connections.
    pub async fn connection_count(&self) -> usize {
        self.connection_manager.connection_count().await
    }

    /// Gets the connection manager (exposed for integration tests).
    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Gets the message router (exposed for integration tests).
    pub fn router(&self) -> Arc<MessageRouter> {
        self.router.clone()
    }

    /// Gets the quality estimator.
    pub fn quality(&self) -> Arc<QualityEstimator> {
        self.quality.clone()
    }

    /// Gets the broadcast scheduler.
    pub fn scheduler(&self) -> Arc<BroadcastScheduler> {
        self.scheduler.clone()
    }

    /// Gets the heartbeat service.
    pub fn heartbeat(&self) -> Arc<HeartbeatService> {
        self.heartbeat.clone()
    }
}
