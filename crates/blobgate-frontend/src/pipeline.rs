//! `Pipeline`: orchestrates a single REST request through the stage
//! sequence in §4.1, owning resource lifecycle and terminal response
//! submission.
//!
//! The scheduling model chosen for this crate (§5 of `SPEC_FULL.md`) is a
//! single-threaded, poll-driven driver loop rather than an async runtime:
//! `RouterCore` is not `Sync` and is meant to be ticked by one owner, so the
//! router-dispatch stage here just ticks the router (and its transport)
//! until the dispatched operation reaches a terminal state. Every other
//! stage (security, id conversion, account/container resolution) completes
//! synchronously against in-process collaborators; nothing here blocks an
//! OS thread waiting on a socket.

use std::sync::Arc;

use chrono::Utc;

use blobgate_cluster::ClusterView;
use blobgate_directory::AccountDirectory;
use blobgate_router::{GetResult, OperationHandle, OperationPoll, RouterCore, RouterOutcome};
use blobgate_security::{SecurityGate, SecurityRequest};
use blobgate_transport::ReplicaTransport;
use blobgate_types::{
    BlobId, BlobProperties, GetOption, HeaderMap, HttpMethod, PipelineErrorCode, RouterErrorCode,
    UserMetadata,
};

use crate::account_injection::{inject_for_post, resolve_for_read};
use crate::id_converter::IdConverter;
use crate::ranges::{parse_range, ByteRange};
use crate::request::{IncomingRequest, RequestContext, SubResource};
use crate::response::{FinishedResponse, ResponseSubmitter};

const HEADER_SERVICE_ID: &str = "x-ambry-service-id";
const HEADER_CONTENT_TYPE: &str = "x-ambry-content-type";
const HEADER_TTL: &str = "x-ambry-ttl";
const HEADER_OWNER_ID: &str = "x-ambry-owner-id";
const HEADER_PRIVATE: &str = "x-ambry-private";
const HEADER_GET_OPTION: &str = "x-ambry-get-option";
const HEADER_RANGE: &str = "range";
const HEADER_IF_MODIFIED_SINCE: &str = "if-modified-since";
const HEADER_CREATION_TIME: &str = "x-ambry-creation-time";
const HEADER_SIZE: &str = "x-ambry-blob-size";
const HEADER_CONTENT_LENGTH: &str = "content-length";
const HEADER_CONTENT_RANGE: &str = "content-range";
const HEADER_LOCATION: &str = "location";
const HEADER_DATE: &str = "date";
const USER_METADATA_PREFIX: &str = "x-ambry-um-";

/// Destination for a pipeline's terminal outcome. `blobgate-server` supplies
/// the real implementation (writes an HTTP/1.1 response to a socket);
/// anything used in tests just records what was submitted.
pub trait ResponseChannel {
    fn complete(&mut self, response: FinishedResponse);
}

/// The "external ResponseHandler" of §4.1's submission fallback: the normal
/// path for delivering a finished response. A production implementation
/// might hand the response to a separate I/O thread; `DirectResponseHandler`
/// just forwards to the channel. `submit` returning `Err` models the
/// handler having already shut down or its channel having closed.
pub trait ResponseHandler: Send + Sync {
    fn submit(&self, channel: &mut dyn ResponseChannel, response: FinishedResponse) -> Result<(), ()>;
}

/// The default handler: always succeeds by forwarding straight to the channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectResponseHandler;

impl ResponseHandler for DirectResponseHandler {
    fn submit(&self, channel: &mut dyn ResponseChannel, response: FinishedResponse) -> Result<(), ()> {
        channel.complete(response);
        Ok(())
    }
}

/// A handler that always reports failure, modeling "the handler has been
/// stopped" for the submission-fallback test scenario (§8 scenario 8).
#[derive(Debug, Default, Clone, Copy)]
pub struct StoppedResponseHandler;

impl ResponseHandler for StoppedResponseHandler {
    fn submit(&self, _channel: &mut dyn ResponseChannel, _response: FinishedResponse) -> Result<(), ()> {
        Err(())
    }
}

/// Owns a full request pipeline's collaborators for one frontend instance.
/// `TR` is the concrete `ReplicaTransport` implementation the embedding
/// server wires up (a real `mio`-backed transport in production, a
/// `MockReplicaTransport` in tests).
pub struct Pipeline<TR: ReplicaTransport> {
    router: RouterCore,
    transport: TR,
    cluster: Arc<dyn ClusterView>,
    directory: Arc<dyn AccountDirectory>,
    security: Arc<dyn SecurityGate>,
    id_converter: Arc<dyn IdConverter>,
    response_handler: Arc<dyn ResponseHandler>,
    started: bool,
}

impl<TR: ReplicaTransport> Pipeline<TR> {
    pub fn new(
        router: RouterCore,
        transport: TR,
        cluster: Arc<dyn ClusterView>,
        directory: Arc<dyn AccountDirectory>,
        security: Arc<dyn SecurityGate>,
        id_converter: Arc<dyn IdConverter>,
        response_handler: Arc<dyn ResponseHandler>,
    ) -> Self {
        Self {
            router,
            transport,
            cluster,
            directory,
            security,
            id_converter,
            response_handler,
            started: false,
        }
    }

    /// Marks the pipeline ready to accept requests. `handle` fails every
    /// request with `ServiceUnavailable` until this has been called (§4.1
    /// "If the pipeline has not been started").
    pub fn start(&mut self) {
        self.started = true;
    }

    /// Public contract (§4.1): takes a parsed request to a completed
    /// response via the stage sequence for its method, and submits the
    /// terminal outcome on `channel` exactly once.
    ///
    /// Rust's type system already rules out the "null request" / "null
    /// response channel" case §4.1 asks an implementation to reject with
    /// `InvalidArgument` — both parameters are owned, non-optional values,
    /// so that check has no runtime analogue here (see DESIGN.md).
    #[tracing::instrument(skip_all, fields(request_id = %request.request_id, method = %request.method, path = %request.path))]
    pub fn handle(&mut self, request: IncomingRequest, channel: &mut dyn ResponseChannel) {
        let outcome = if !self.started {
            ResponseSubmitter::error(PipelineErrorCode::ServiceUnavailable, false)
        } else {
            match request.method {
                HttpMethod::Get | HttpMethod::Head => self.handle_read(request),
                HttpMethod::Delete => self.handle_delete(request),
                HttpMethod::Post => self.handle_post(request),
            }
        };
        self.submit(outcome, channel);
    }

    /// §4.1 "Submission fallback": try the external handler first; if it
    /// reports failure, complete the channel directly with the same
    /// outcome (or a synthesized `ServiceUnavailable` if somehow nothing
    /// was computed).
    fn submit(&self, outcome: FinishedResponse, channel: &mut dyn ResponseChannel) {
        if self.response_handler.submit(channel, outcome.clone()).is_err() {
            channel.complete(ResponseSubmitter::fallback(Some(outcome)));
        }
    }

    fn drive_to_terminal(&mut self, handle: OperationHandle) -> Result<RouterOutcome, RouterErrorCode> {
        loop {
            match self.router.poll(handle) {
                Some(OperationPoll::Terminal(_)) | None => break,
                Some(OperationPoll::Running) => {}
            }
            self.router.tick(&mut self.transport);
        }
        self.router
            .take_result(handle)
            .expect("operation reached terminal state before take_result")
    }

    // ---- GET / HEAD: preSecurity -> idConvert -> postSecurity -> routerGet -> postSecurityResponse -> submit ----

    fn handle_read(&mut self, request: IncomingRequest) -> FinishedResponse {
        let is_head = request.method == HttpMethod::Head;
        let mut ctx = RequestContext::new(request);

        if let Err(code) = self.pre_security(&ctx) {
            return ResponseSubmitter::error(code, false);
        }

        let canonical_id = match self.id_converter.convert(&ctx, &ctx.path.clone()) {
            Ok(id) => id,
            Err(code) => return ResponseSubmitter::error(code, false),
        };

        let blob_id = match BlobId::parse(&canonical_id) {
            Ok(id) => id,
            Err(_) => return ResponseSubmitter::error(PipelineErrorCode::BadRequest, false),
        };

        let target = match resolve_for_read(blob_id.account_id(), blob_id.container_id(), self.directory.as_ref()) {
            Ok(target) => target,
            Err(code) => return ResponseSubmitter::error(code, false),
        };
        ctx.target = Some(target);

        if let Err(code) = self.post_security(&ctx) {
            return ResponseSubmitter::error(code, false);
        }

        // `Replicas` is a pure function of the blob id's partition via
        // `ClusterView` — it names no per-replica blob state, so it is
        // answered here, before a whole-blob router GET is dispatched.
        if ctx.sub_resource == SubResource::Replicas {
            return self.build_replicas_response(&blob_id);
        }

        let get_option = match ctx.headers.get(HEADER_GET_OPTION) {
            None => GetOption::None,
            Some(raw) => match GetOption::parse(raw) {
                Some(opt) => opt,
                None => return ResponseSubmitter::error(PipelineErrorCode::InvalidArgument, false),
            },
        };

        let handle = match self.router.get(&canonical_id, get_option) {
            Ok(handle) => handle,
            Err(err) => return self.router_error_response(err),
        };

        let outcome = self.drive_to_terminal(handle);
        let get_result = match outcome {
            Ok(RouterOutcome::Get(result)) => result,
            Ok(other) => unreachable!("router.get() returned non-Get outcome: {other:?}"),
            Err(err) => return self.router_error_response(err),
        };

        self.build_get_response(&ctx, get_result, is_head)
    }

    /// `GET /<blobId>/Replicas`: lists the datanodes holding the blob's
    /// partition, as `{"replicas":"[host:port, ...]"}` (§6).
    fn build_replicas_response(&self, blob_id: &BlobId) -> FinishedResponse {
        let replicas = self
            .cluster
            .replicas_for(blob_id.partition())
            .map(|rs| rs.iter().map(|r| r.datanode.to_string()).collect::<Vec<_>>())
            .unwrap_or_default();
        let body = serde_json::json!({ "replicas": format!("{replicas:?}") }).to_string();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json");
        ResponseSubmitter::success(200, headers, body.into_bytes())
    }

    fn build_get_response(&self, ctx: &RequestContext, result: GetResult, is_head: bool) -> FinishedResponse {
        let mut headers = HeaderMap::new();
        properties_into_headers(&result.properties, &mut headers);
        user_metadata_into_headers(&result.user_metadata, &mut headers);

        match ctx.sub_resource {
            SubResource::BlobInfo => {
                self.shape_response(ctx, Some(&result.properties), &mut headers);
                return ResponseSubmitter::success(200, headers, Vec::new());
            }
            SubResource::UserMetadata => {
                let mut um_headers = HeaderMap::new();
                user_metadata_into_headers(&result.user_metadata, &mut um_headers);
                self.shape_response(ctx, Some(&result.properties), &mut um_headers);
                return ResponseSubmitter::success(200, um_headers, Vec::new());
            }
            SubResource::Replicas | SubResource::None => {}
        }

        if let Some(since) = ctx.headers.get(HEADER_IF_MODIFIED_SINCE) {
            if not_modified_since(since, result.properties.creation_time_ms) {
                self.shape_response(ctx, Some(&result.properties), &mut headers);
                return ResponseSubmitter::success(304, headers, Vec::new());
            }
        }

        let total_len = result.bytes.len() as u64;
        let range = match parse_range(ctx.headers.get(HEADER_RANGE), total_len) {
            Ok(range) => range,
            Err(()) => return ResponseSubmitter::error(PipelineErrorCode::RangeNotSatisfiable, false),
        };

        self.shape_response(ctx, Some(&result.properties), &mut headers);

        match range {
            None => {
                let body = if is_head { Vec::new() } else { result.bytes };
                ResponseSubmitter::success(200, headers, body)
            }
            Some(ByteRange { start, end }) => {
                headers.insert(HEADER_CONTENT_RANGE, format!("bytes {start}-{end}/{total_len}"));
                let body = if is_head {
                    Vec::new()
                } else {
                    result.bytes[start as usize..=end as usize].to_vec()
                };
                headers.insert(HEADER_CONTENT_LENGTH, body.len().to_string());
                ResponseSubmitter::success(206, headers, body)
            }
        }
    }

    // ---- DELETE: preSecurity -> idConvert -> postSecurity -> routerDelete -> submit ----

    fn handle_delete(&mut self, request: IncomingRequest) -> FinishedResponse {
        let ctx = RequestContext::new(request);

        if let Err(code) = self.pre_security(&ctx) {
            return ResponseSubmitter::error(code, false);
        }

        let canonical_id = match self.id_converter.convert(&ctx, &ctx.path.clone()) {
            Ok(id) => id,
            Err(code) => return ResponseSubmitter::error(code, false),
        };

        let blob_id = match BlobId::parse(&canonical_id) {
            Ok(id) => id,
            Err(_) => return ResponseSubmitter::error(PipelineErrorCode::BadRequest, false),
        };

        let target = match resolve_for_read(blob_id.account_id(), blob_id.container_id(), self.directory.as_ref()) {
            Ok(target) => target,
            Err(code) => return ResponseSubmitter::error(code, false),
        };
        let mut ctx = ctx;
        ctx.target = Some(target);

        if let Err(code) = self.post_security(&ctx) {
            return ResponseSubmitter::error(code, false);
        }

        let handle = match self.router.delete(&canonical_id) {
            Ok(handle) => handle,
            Err(err) => return self.router_error_response(err),
        };

        match self.drive_to_terminal(handle) {
            Ok(RouterOutcome::Delete) => ResponseSubmitter::success(202, HeaderMap::new(), Vec::new()),
            Ok(other) => unreachable!("router.delete() returned non-Delete outcome: {other:?}"),
            Err(err) => self.router_error_response(err),
        }
    }

    // ---- POST: preSecurity -> accountContainerInject -> postSecurity -> routerPut -> idConvert(reverse) -> postSecurityResponse -> submit ----

    fn handle_post(&mut self, request: IncomingRequest) -> FinishedResponse {
        let mut ctx = RequestContext::new(request);

        if let Err(code) = self.pre_security(&ctx) {
            return ResponseSubmitter::error(code, false);
        }

        let target = match inject_for_post(&ctx.headers, self.directory.as_ref()) {
            Ok(target) => target,
            Err(code) => return ResponseSubmitter::error(code, false),
        };
        ctx.target = Some(target);

        if let Err(code) = self.post_security(&ctx) {
            return ResponseSubmitter::error(code, false);
        }

        let (properties, user_metadata) = match build_properties(&ctx) {
            Ok(pair) => pair,
            Err(code) => return ResponseSubmitter::error(code, false),
        };
        let bytes = ctx.body.clone();

        let handle = match self.router.put(properties, user_metadata, bytes) {
            Ok(handle) => handle,
            Err(err) => return self.router_error_response(err),
        };

        let blob_id = match self.drive_to_terminal(handle) {
            Ok(RouterOutcome::Put(id)) => id,
            Ok(other) => unreachable!("router.put() returned non-Put outcome: {other:?}"),
            Err(err) => return self.router_error_response(err),
        };

        let external_id = match self.id_converter.convert(&ctx, &blob_id.to_string()) {
            Ok(id) => id,
            Err(_) => return ResponseSubmitter::error(PipelineErrorCode::InternalError, false),
        };

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_LOCATION, external_id);
        headers.insert(HEADER_CONTENT_LENGTH, "0");
        headers.insert(HEADER_DATE, Utc::now().to_rfc2822());
        headers.insert(HEADER_CREATION_TIME, Utc::now().timestamp_millis().to_string());

        self.shape_response(&ctx, None, &mut headers);
        ResponseSubmitter::success(201, headers, Vec::new())
    }

    // ---- security hooks ----

    fn pre_security(&self, ctx: &RequestContext) -> Result<(), PipelineErrorCode> {
        let request = SecurityRequest {
            method: ctx.method,
            headers: &ctx.headers,
            account: None,
            container: None,
        };
        self.security.pre_process(&request)
    }

    fn post_security(&self, ctx: &RequestContext) -> Result<(), PipelineErrorCode> {
        let target = ctx.target.as_ref();
        let request = SecurityRequest {
            method: ctx.method,
            headers: &ctx.headers,
            account: target.map(|t| &t.account),
            container: target.map(|t| &t.container),
        };
        self.security.post_process(&request)
    }

    fn shape_response(&self, ctx: &RequestContext, properties: Option<&BlobProperties>, headers: &mut HeaderMap) {
        let target = ctx.target.as_ref();
        let request = SecurityRequest {
            method: ctx.method,
            headers: &ctx.headers,
            account: target.map(|t| &t.account),
            container: target.map(|t| &t.container),
        };
        // §4.4: `processResponse` may mutate headers but a synchronous throw
        // from it still has to produce exactly one terminal response; since
        // it runs after the outcome is already decided, an error here is
        // folded into the (unchanged) success response rather than replacing
        // it — there is nothing left upstream to fail instead.
        let _ = self.security.process_response(&request, properties, headers);
    }

    fn router_error_response(&self, err: RouterErrorCode) -> FinishedResponse {
        let blob_deleted = err == RouterErrorCode::BlobDeleted;
        ResponseSubmitter::error(PipelineErrorCode::from_router_error(err), blob_deleted)
    }
}

fn build_properties(ctx: &RequestContext) -> Result<(BlobProperties, UserMetadata), PipelineErrorCode> {
    let service_id = ctx.headers.get(HEADER_SERVICE_ID).ok_or(PipelineErrorCode::MissingArgs)?;
    let content_type = ctx.headers.get(HEADER_CONTENT_TYPE).ok_or(PipelineErrorCode::MissingArgs)?;
    let ttl_raw = ctx.headers.get(HEADER_TTL).ok_or(PipelineErrorCode::MissingArgs)?;
    let ttl_seconds: i64 = ttl_raw.parse().map_err(|_| PipelineErrorCode::InvalidArgument)?;

    let private = ctx
        .headers
        .get(HEADER_PRIVATE)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let owner_id = ctx.headers.get(HEADER_OWNER_ID).map(str::to_string);

    let target = ctx.target.as_ref().expect("account/container resolved before properties are built");

    let properties = BlobProperties {
        size: ctx.body.len() as u64,
        content_type: content_type.to_string(),
        service_id: service_id.to_string(),
        owner_id,
        ttl_seconds,
        creation_time_ms: Utc::now().timestamp_millis(),
        private,
        account_id: target.account.id,
        container_id: target.container.id,
    };

    let user_metadata = UserMetadata(ctx.headers.strip_prefixed(USER_METADATA_PREFIX));
    Ok((properties, user_metadata))
}

/// `If-Modified-Since` is parsed as RFC 2822 (the same format the pipeline
/// writes `Date`/creation-time headers in); an unparseable header is treated
/// as "not a conditional request" rather than failing the GET.
fn not_modified_since(header: &str, creation_time_ms: i64) -> bool {
    let Ok(since) = chrono::DateTime::parse_from_rfc2822(header) else {
        return false;
    };
    creation_time_ms <= since.timestamp_millis()
}

fn properties_into_headers(properties: &BlobProperties, headers: &mut HeaderMap) {
    headers.insert(HEADER_CONTENT_TYPE, properties.content_type.clone());
    headers.insert(HEADER_SERVICE_ID, properties.service_id.clone());
    headers.insert(HEADER_SIZE, properties.size.to_string());
    headers.insert(HEADER_CONTENT_LENGTH, properties.size.to_string());
    headers.insert(HEADER_TTL, properties.ttl_seconds.to_string());
    headers.insert(HEADER_CREATION_TIME, properties.creation_time_ms.to_string());
    headers.insert(HEADER_PRIVATE, properties.private.to_string());
    if let Some(owner) = &properties.owner_id {
        headers.insert(HEADER_OWNER_ID, owner.clone());
    }
}

fn user_metadata_into_headers(user_metadata: &UserMetadata, headers: &mut HeaderMap) {
    for (key, value) in &user_metadata.0 {
        headers.insert(format!("{USER_METADATA_PREFIX}{key}"), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use blobgate_cluster::StaticClusterView;
    use blobgate_directory::InMemoryAccountDirectory;
    use blobgate_router::RouterConfig;
    use blobgate_security::{ApiKeyPolicy, DefaultSecurityGate};
    use blobgate_transport::{MockReplicaTransport, ReplicaPayload, ScriptedResponse};
    use blobgate_types::{DatacenterId, FakeClock, PartitionId, ReplicaErrorCode};

    use super::*;
    use crate::id_converter::IdentityIdConverter;
    use crate::request::SubResource;

    struct RecordingChannel {
        response: Option<FinishedResponse>,
    }

    impl ResponseChannel for RecordingChannel {
        fn complete(&mut self, response: FinishedResponse) {
            self.response = Some(response);
        }
    }

    fn pipeline(replicas: u16) -> Pipeline<MockReplicaTransport> {
        let cluster = Arc::new(StaticClusterView::uniform(4, replicas, DatacenterId(0)));
        let clock = Arc::new(FakeClock::new(0));
        let config = RouterConfig {
            parallelism: replicas as usize,
            ..RouterConfig::default()
        };
        let router = RouterCore::new(cluster.clone(), clock, config, DatacenterId(0));
        let directory = Arc::new(InMemoryAccountDirectory::new());
        let security = Arc::new(DefaultSecurityGate::new(ApiKeyPolicy::new()).without_audit());
        let id_converter = Arc::new(IdentityIdConverter);
        let mut pipeline = Pipeline::new(
            router,
            MockReplicaTransport::new(),
            cluster,
            directory,
            security,
            id_converter,
            Arc::new(DirectResponseHandler),
        );
        pipeline.start();
        pipeline
    }

    fn post_request(body: Vec<u8>) -> IncomingRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-service-id", "test-service");
        headers.insert("x-ambry-content-type", "application/octet-stream");
        headers.insert("x-ambry-ttl", "-1");
        IncomingRequest {
            request_id: "test-request".to_string(),
            method: HttpMethod::Post,
            path: String::new(),
            sub_resource: SubResource::None,
            headers,
            body,
        }
    }

    #[test]
    fn unstarted_pipeline_returns_service_unavailable() {
        let mut pipeline = pipeline(3);
        pipeline.started = false;
        let mut channel = RecordingChannel { response: None };
        pipeline.handle(post_request(vec![1]), &mut channel);
        assert_eq!(channel.response.unwrap().status, 503);
    }

    #[test]
    fn post_then_get_round_trips_bytes() {
        let mut pipeline = pipeline(3);
        pipeline.transport.set_default(ScriptedResponse::immediate(Ok(ReplicaPayload::PutAcked)));
        let mut channel = RecordingChannel { response: None };
        pipeline.handle(post_request(b"hello world".to_vec()), &mut channel);
        let post_response = channel.response.take().unwrap();
        assert_eq!(post_response.status, 201);
        let blob_id = post_response.headers.get("location").unwrap().to_string();

        pipeline.transport.set_default(ScriptedResponse::immediate(Ok(ReplicaPayload::GetBody {
            properties: BlobProperties {
                size: 11,
                content_type: "application/octet-stream".to_string(),
                service_id: "test-service".to_string(),
                owner_id: None,
                ttl_seconds: blobgate_types::properties::INFINITE_TTL,
                creation_time_ms: 0,
                private: false,
                account_id: 0,
                container_id: 0,
            },
            user_metadata: UserMetadata::default(),
            bytes: b"hello world".to_vec(),
        })));

        let get_request = IncomingRequest {
            request_id: "test-request".to_string(),
            method: HttpMethod::Get,
            path: blob_id,
            sub_resource: SubResource::None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        pipeline.handle(get_request, &mut channel);
        let get_response = channel.response.take().unwrap();
        assert_eq!(get_response.status, 200);
        assert_eq!(get_response.body, b"hello world");
    }

    #[test]
    fn delete_then_delete_is_idempotent() {
        let mut pipeline = pipeline(3);
        pipeline.transport.set_default(ScriptedResponse::immediate(Ok(ReplicaPayload::Deleted)));

        let blob_id = BlobId::new_v1(DatacenterId(0), PartitionId(0), [9u8; 16]).to_string();
        let delete_request = |id: &str| IncomingRequest {
            request_id: "test-request".to_string(),
            method: HttpMethod::Delete,
            path: id.to_string(),
            sub_resource: SubResource::None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };

        let mut channel = RecordingChannel { response: None };
        pipeline.handle(delete_request(&blob_id), &mut channel);
        assert_eq!(channel.response.take().unwrap().status, 202);

        pipeline.handle(delete_request(&blob_id), &mut channel);
        assert_eq!(channel.response.take().unwrap().status, 202);
    }

    #[test]
    fn delete_short_circuits_on_blob_deleted_to_gone() {
        let mut pipeline = pipeline(3);
        let cluster = StaticClusterView::uniform(4, 3, DatacenterId(0));
        let replicas = cluster.replicas_for(PartitionId(0)).unwrap();
        pipeline.transport.script(replicas[0], ScriptedResponse::error(ReplicaErrorCode::BlobDeleted));
        for r in &replicas[1..] {
            pipeline.transport.script(*r, ScriptedResponse::immediate(Ok(ReplicaPayload::Deleted)));
        }

        let blob_id = BlobId::new_v1(DatacenterId(0), PartitionId(0), [1u8; 16]).to_string();
        let delete_request = IncomingRequest {
            request_id: "test-request".to_string(),
            method: HttpMethod::Delete,
            path: blob_id,
            sub_resource: SubResource::None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        let mut channel = RecordingChannel { response: None };
        pipeline.handle(delete_request, &mut channel);
        let response = channel.response.take().unwrap();
        assert_eq!(response.status, 410);
        assert_eq!(response.headers.get("x-ambry-deleted"), Some("true"));
    }

    #[test]
    fn response_handler_failure_falls_back_to_direct_completion() {
        let cluster = Arc::new(StaticClusterView::uniform(4, 3, DatacenterId(0)));
        let clock = Arc::new(FakeClock::new(0));
        let router = RouterCore::new(cluster.clone(), clock, RouterConfig::default(), DatacenterId(0));
        let directory = Arc::new(InMemoryAccountDirectory::new());
        let security = Arc::new(DefaultSecurityGate::new(ApiKeyPolicy::new()).without_audit());
        let id_converter = Arc::new(IdentityIdConverter);
        let mut pipeline = Pipeline::new(
            router,
            MockReplicaTransport::new(),
            cluster,
            directory,
            security,
            id_converter,
            Arc::new(StoppedResponseHandler),
        );
        pipeline.start();

        let mut channel = RecordingChannel { response: None };
        let bad_request = IncomingRequest {
            request_id: "test-request".to_string(),
            method: HttpMethod::Get,
            path: "not-a-real-blob-id!!".to_string(),
            sub_resource: SubResource::None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        pipeline.handle(bad_request, &mut channel);
        assert_eq!(channel.response.unwrap().status, 400);
    }
}
