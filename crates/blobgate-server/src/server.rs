//! The mio event loop: accepts client connections on the main blob-serving
//! listener, drives each decoded request through a [`Pipeline`], and answers
//! `/metrics`, `/health`, `/ready` on a separate sidecar listener (§2, §5).
//!
//! One `mio::Poll` is shared by both listeners and every connection; one
//! thread drives it. `Pipeline::handle` itself blocks this thread until the
//! dispatched router operation reaches a terminal state (see
//! `blobgate_frontend::pipeline`'s `drive_to_terminal`), so this is a
//! single-connection-at-a-time frontend rather than a fully concurrent one —
//! acceptable for the reference deployment this crate targets; a production
//! deployment would shard connections across several such loops, one per
//! core, each with its own `Pipeline`/`RouterCore`/`TcpReplicaTransport`.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info, warn};

use blobgate_cluster::{ClusterView, Partition, StaticClusterView};
use blobgate_directory::{AccountDirectory, InMemoryAccountDirectory};
use blobgate_frontend::http::ParsedRequest;
use blobgate_frontend::{
    DirectResponseHandler, FinishedResponse, HttpParseError, IdentityIdConverter, Pipeline,
    ResponseChannel, ResponseSubmitter,
};
use blobgate_router::RouterCore;
use blobgate_security::{ApiKeyPolicy, CallerIdentity, DefaultSecurityGate};
use blobgate_transport::TcpReplicaTransport;
use blobgate_types::{
    Account, Container, DatacenterId, DatanodeId, HeaderMap, PartitionId, PipelineErrorCode,
    ReplicaId, Status, SystemClock,
};

use crate::config::ServerConfig;
use crate::connection::{Connection, DecodedRequest};
use crate::error::{ServerError, ServerResult};
use crate::health::HealthChecker;
use crate::http::{HttpSidecar, HTTP_LISTENER_TOKEN};

/// Token for the main blob-serving listener, kept apart from both connection
/// tokens (allocated starting at `FIRST_CONNECTION_TOKEN`) and the sidecar's
/// `HTTP_LISTENER_TOKEN`.
const LISTENER_TOKEN: Token = Token(0);
const FIRST_CONNECTION_TOKEN: usize = 1;

/// A handle callers (signal handlers, tests, an embedding process) use to
/// ask a running [`Server`] to stop its event loop at the next poll tick.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Registers `SIGINT`/`SIGTERM` to set this handle's flag directly,
    /// without a dedicated signal-handling thread (signal-hook's `flag`
    /// module writes the flag from within the signal handler itself).
    #[cfg(unix)]
    pub fn install_signal_handlers(&self) -> std::io::Result<()> {
        signal_hook::flag::register(signal_hook::consts::SIGINT, self.flag.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, self.flag.clone())?;
        Ok(())
    }
}

/// Owns the listener sockets, the in-progress connections, and the
/// [`Pipeline`] every decoded request is driven through.
pub struct Server {
    config: ServerConfig,
    poll: Poll,
    events: Events,
    listener: TcpListener,
    http_sidecar: HttpSidecar,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    pipeline: Pipeline<TcpReplicaTransport>,
    cluster: Arc<dyn ClusterView>,
    health: HealthChecker,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Wires up every collaborator from `config` and binds both listeners.
    /// Fails fast (§6 "out of scope" collaborators are still required to
    /// exist at startup, just not implemented by this crate beyond the
    /// fixed-topology / in-memory forms used here).
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let cluster: Arc<dyn ClusterView> = Arc::new(build_cluster_view(&config)?);
        let directory: Arc<dyn AccountDirectory> = Arc::new(build_account_directory(&config));
        let security = Arc::new(build_security_gate(&config));
        let id_converter = Arc::new(IdentityIdConverter);

        let clock = Arc::new(SystemClock);
        let router = RouterCore::new(
            cluster.clone(),
            clock,
            config.router.clone(),
            DatacenterId(config.cluster.datacenter),
        );
        let transport = TcpReplicaTransport::new()?;

        let mut pipeline = Pipeline::new(
            router,
            transport,
            cluster.clone(),
            directory,
            security,
            id_converter,
            Arc::new(DirectResponseHandler),
        );
        pipeline.start();

        let poll = Poll::new()?;

        let listen_addr: SocketAddr = config
            .listen
            .addr
            .parse()
            .map_err(|_| ServerError::InvalidConfig(format!("invalid listen address: {}", config.listen.addr)))?;
        let mut listener = TcpListener::bind(listen_addr).map_err(|source| ServerError::BindFailed {
            addr: listen_addr,
            source,
        })?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        info!(addr = %listen_addr, "blobgate listening");

        let metrics_addr: SocketAddr = config
            .metrics
            .addr
            .parse()
            .map_err(|_| ServerError::InvalidConfig(format!("invalid metrics address: {}", config.metrics.addr)))?;
        let http_sidecar = HttpSidecar::bind(metrics_addr, &poll)?;

        Ok(Self {
            config,
            poll,
            events: Events::with_capacity(1024),
            listener,
            http_sidecar,
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION_TOKEN,
            pipeline,
            cluster,
            health: HealthChecker::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A clonable handle that can ask this server to stop, from another
    /// thread (a signal handler, typically).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: self.shutdown.clone(),
        }
    }

    /// Runs the event loop until a [`ShutdownHandle`] requests a stop.
    /// Blocking; returns once the loop has drained and deregistered every
    /// connection.
    pub fn run(mut self) -> ServerResult<()> {
        self.health.mark_ready();

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.poll.poll(&mut self.events, Some(Duration::from_millis(200))) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ServerError::Io(e)),
            }

            let ready: Vec<(Token, bool, bool)> = self
                .events
                .iter()
                .map(|event| (event.token(), event.is_readable(), event.is_writable()))
                .collect();

            for (token, readable, writable) in ready {
                if token == LISTENER_TOKEN {
                    self.accept_connections();
                    continue;
                }
                if token == HTTP_LISTENER_TOKEN {
                    self.http_sidecar.handle_accept(&self.health);
                    continue;
                }
                if writable {
                    self.handle_writable(token);
                }
                if readable && self.connections.contains_key(&token) {
                    self.handle_readable(token);
                }
            }

            self.close_idle_connections();
        }

        info!("shutdown requested, draining connections");
        self.health.mark_not_ready();
        for (_, mut conn) in self.connections.drain() {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    if self.connections.len() >= self.config.connection.max_connections {
                        warn!(%addr, "max connections reached, dropping new connection");
                        continue;
                    }
                    let token = self.next_connection_token();
                    if let Err(e) = self
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(%addr, error = %e, "failed to register connection");
                        continue;
                    }
                    debug!(%addr, "accepted connection");
                    self.connections.insert(
                        token,
                        Connection::new(token, stream, self.config.connection.buffer_size),
                    );
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(error = %e, "accept error");
                    break;
                }
            }
        }
    }

    fn next_connection_token(&mut self) -> Token {
        loop {
            let candidate = Token(self.next_token);
            self.next_token = self.next_token.wrapping_add(1).max(FIRST_CONNECTION_TOKEN);
            if candidate != LISTENER_TOKEN
                && candidate != HTTP_LISTENER_TOKEN
                && !self.connections.contains_key(&candidate)
            {
                return candidate;
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let decoded = {
            let Some(conn) = self.connections.get_mut(&token) else {
                return;
            };
            match conn.read() {
                Ok(true) => {}
                Ok(false) => conn.closing = true,
                Err(e) => {
                    debug!(?token, error = %e, "connection read error");
                    conn.closing = true;
                }
            }
            conn.touch();
            conn.try_decode_request()
        };

        if let Some(decoded) = decoded {
            self.dispatch(token, decoded);
        }

        self.sync_interest(token);
    }

    fn handle_writable(&mut self, token: Token) {
        let outcome = match self.connections.get_mut(&token) {
            Some(conn) => conn.write(),
            None => return,
        };
        match outcome {
            Ok(_) => {}
            Err(e) => {
                debug!(?token, error = %e, "connection write error");
                self.remove_connection(token);
                return;
            }
        }
        self.sync_interest(token);
    }

    /// Decodes into a terminal response and queues it for writing. Every
    /// response closes the connection (§ `Connection::queue_response`'s
    /// "no keep-alive"), so this always marks `closing`.
    fn dispatch(&mut self, token: Token, decoded: DecodedRequest) {
        match decoded {
            DecodedRequest::Malformed(e) => {
                debug!(?token, error = %e, "malformed request");
                let response = ResponseSubmitter::error(malformed_error_code(e), false);
                if let Some(conn) = self.connections.get_mut(&token) {
                    conn.queue_response(&response);
                    conn.closing = true;
                }
            }
            DecodedRequest::Complete(ParsedRequest::Peers(query)) => {
                let peers = self.cluster.peers_of(&query.name, query.port);
                let response = peers_response(&peers);
                if let Some(conn) = self.connections.get_mut(&token) {
                    conn.queue_response(&response);
                    conn.closing = true;
                }
            }
            DecodedRequest::Complete(ParsedRequest::Blob(request)) => {
                if let Some(conn) = self.connections.get_mut(&token) {
                    let mut channel = ConnectionResponseChannel { conn };
                    let pipeline = &mut self.pipeline;
                    // §7: a panic anywhere in the stage sequence is caught at
                    // this single driver-loop boundary rather than taking the
                    // whole process down, and mapped to InternalError.
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        pipeline.handle(request, &mut channel);
                    }));
                    if outcome.is_err() {
                        error!(?token, "pipeline panicked while handling request");
                        channel.complete(ResponseSubmitter::error(PipelineErrorCode::InternalError, false));
                    }
                }
            }
        }
    }

    fn sync_interest(&mut self, token: Token) {
        let Some(conn) = self.connections.get(&token) else {
            return;
        };
        if conn.closing && conn.write_buf.is_empty() {
            self.remove_connection(token);
            return;
        }
        let interest = conn.interest();
        if let Some(conn) = self.connections.get_mut(&token) {
            if let Err(e) = self.poll.registry().reregister(&mut conn.stream, token, interest) {
                debug!(?token, error = %e, "failed to reregister connection interest");
            }
        }
    }

    fn remove_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
    }

    fn close_idle_connections(&mut self) {
        let timeout = Duration::from_secs(self.config.connection.idle_timeout_secs);
        let idle: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.is_idle(timeout))
            .map(|(token, _)| *token)
            .collect();
        for token in idle {
            debug!(?token, "closing idle connection");
            self.remove_connection(token);
        }
    }
}

/// Writes a pipeline's terminal response straight into one connection's
/// write buffer (§4.1's `ResponseChannel`, concretely implemented).
struct ConnectionResponseChannel<'a> {
    conn: &'a mut Connection,
}

impl<'a> ResponseChannel for ConnectionResponseChannel<'a> {
    fn complete(&mut self, response: FinishedResponse) {
        self.conn.queue_response(&response);
        self.conn.closing = true;
    }
}

fn malformed_error_code(e: HttpParseError) -> PipelineErrorCode {
    match e {
        HttpParseError::UnsupportedMethod => PipelineErrorCode::UnsupportedHttpMethod,
        HttpParseError::PeersMissingArgs => PipelineErrorCode::MissingArgs,
        HttpParseError::MalformedRequestLine | HttpParseError::MalformedHeaderLine => {
            PipelineErrorCode::BadRequest
        }
    }
}

fn peers_response(peers: &[DatanodeId]) -> FinishedResponse {
    let body = serde_json::json!({
        "peers": peers.iter().map(DatanodeId::to_string).collect::<Vec<_>>(),
    })
    .to_string();
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "application/json");
    ResponseSubmitter::success(200, headers, body.into_bytes())
}

/// Builds a [`StaticClusterView`] from the fixed topology in `config`
/// (§9 "Open question" territory of a different kind — here the source of
/// truth genuinely is the config file, since discovering it from a gossip
/// membership service is out of scope for this crate, §1).
fn build_cluster_view(config: &ServerConfig) -> ServerResult<StaticClusterView> {
    let mut partitions = Vec::with_capacity(config.cluster.partitions.len());
    for p in &config.cluster.partitions {
        if p.replicas.is_empty() {
            return Err(ServerError::InvalidConfig(format!(
                "partition {} has no replicas configured",
                p.id
            )));
        }
        let id = PartitionId(p.id);
        let replicas = p
            .replicas
            .iter()
            .map(|r| ReplicaId {
                partition: id,
                datanode: DatanodeId {
                    host: r.host.clone(),
                    port: r.port,
                },
            })
            .collect();
        partitions.push(Partition {
            id,
            replicas,
            writable: p.writable,
        });
    }
    Ok(StaticClusterView::new(partitions, vec![DatacenterId(config.cluster.datacenter)]))
}

/// Builds the in-memory account directory from `config.accounts`, always
/// including the distinguished unknown account/container (§3).
fn build_account_directory(config: &ServerConfig) -> InMemoryAccountDirectory {
    let mut directory = InMemoryAccountDirectory::new();
    for account_config in &config.accounts {
        let account = Account {
            id: account_config.id,
            name: account_config.name.clone(),
            status: Status::Active,
            default_public_container_id: account_config.default_public_container_id,
            default_private_container_id: account_config.default_private_container_id,
        };
        let containers = account_config
            .containers
            .iter()
            .map(|c| Container {
                id: c.id,
                name: c.name.clone(),
                status: Status::Active,
                private: c.private,
                parent_account_id: account_config.id,
            })
            .collect();
        directory = directory.with_account(account, containers);
    }
    directory
}

fn build_security_gate(config: &ServerConfig) -> DefaultSecurityGate {
    let mut policy = ApiKeyPolicy::new();
    for key in &config.security.api_keys {
        let mut identity = CallerIdentity::new(key.caller_id.clone());
        if key.privileged {
            identity = identity.privileged();
        }
        policy = policy.with_key(key.token.clone(), identity);
    }
    for method in &config.security.require_auth_for {
        if let Some(method) = blobgate_types::HttpMethod::parse(method) {
            policy = policy.require_auth_for(method);
        } else {
            warn!(method, "ignoring unknown HTTP method in security.require_auth_for");
        }
    }
    DefaultSecurityGate::new(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountConfig, ClusterConfig, ContainerConfig, PartitionConfig, ReplicaPlacement};

    #[test]
    fn build_cluster_view_from_config() {
        let mut config = ServerConfig::default();
        config.cluster = ClusterConfig {
            datacenter: 1,
            partitions: vec![PartitionConfig {
                id: 0,
                replicas: vec![
                    ReplicaPlacement { host: "dn-0".to_string(), port: 6000 },
                    ReplicaPlacement { host: "dn-1".to_string(), port: 6000 },
                ],
                writable: true,
            }],
        };
        let view = build_cluster_view(&config).unwrap();
        assert_eq!(view.replicas_for(PartitionId(0)).unwrap().len(), 2);
        assert_eq!(view.writable_partitions(), &[PartitionId(0)]);
    }

    #[test]
    fn build_cluster_view_rejects_empty_replicas() {
        let mut config = ServerConfig::default();
        config.cluster = ClusterConfig {
            datacenter: 0,
            partitions: vec![PartitionConfig { id: 0, replicas: vec![], writable: true }],
        };
        assert!(build_cluster_view(&config).is_err());
    }

    #[test]
    fn build_account_directory_includes_unknown_and_configured_accounts() {
        let mut config = ServerConfig::default();
        config.accounts = vec![AccountConfig {
            id: 7,
            name: "media".to_string(),
            default_public_container_id: Some(1),
            default_private_container_id: None,
            containers: vec![ContainerConfig { id: 1, name: "default-public".to_string(), private: false }],
        }];
        let directory = build_account_directory(&config);
        assert!(directory.account_by_name(blobgate_types::account::UNKNOWN_ACCOUNT_NAME).is_some());
        let account = directory.account_by_name("media").unwrap();
        assert_eq!(account.id, 7);
        assert!(directory.container_by_name(7, "default-public").is_some());
    }

    #[test]
    fn build_security_gate_registers_keys_and_required_methods() {
        let mut config = ServerConfig::default();
        config.security.api_keys = vec![crate::config::ApiKeyConfig {
            token: "tok".to_string(),
            caller_id: "svc".to_string(),
            privileged: true,
        }];
        config.security.require_auth_for = vec!["POST".to_string()];
        let gate = build_security_gate(&config);
        assert!(gate.pre_process(&blobgate_security::SecurityRequest {
            method: blobgate_types::HttpMethod::Post,
            headers: &HeaderMap::new(),
            account: None,
            container: None,
        })
        .is_err());
    }
}
