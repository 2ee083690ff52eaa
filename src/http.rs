//! HTTP API for the social feed
//!
//! Caller identity arrives in the `X-User-Id` header, set by the upstream
//! auth gateway. Every route except `/health` requires it.
//!
//! ## Posts
//! - `POST /groups/{gid}/posts` - Create a post
//! - `GET /groups/{gid}/posts?page&size` - Group feed, newest first
//! - `GET /groups/{gid}/members/{mid}/posts?page&size` - One member's posts
//! - `GET /posts/{pid}` - Single post
//! - `DELETE /posts/{pid}` - Soft-delete a post
//!
//! ## Engagement
//! - `POST /posts/{pid}/like` - Toggle the caller's like
//! - `POST /posts/{pid}/comments` - Add a comment
//! - `GET /posts/{pid}/comments?page&size` - Comments, oldest first
//! - `DELETE /comments/{cid}` - Soft-delete a comment
//!
//! ## Challenges
//! - `GET /groups/{gid}/challenges?eventId&includeCounts&activeOnly`
//! - `POST /groups/{gid}/challenges`
//! - `PUT /groups/{gid}/challenges/{id}`
//! - `DELETE /groups/{gid}/challenges/{id}`
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST -H "X-User-Id: $USER" -H "Content-Type: application/json" \
//!      -d '{"contentText":"Hi #firstdance","visibility":"PUBLIC"}' \
//!      http://localhost:8095/groups/$GROUP/posts
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FeedError;
use crate::services::response::{
    bad_request, error_response, from_create_result, from_delete_result, from_result,
    method_not_allowed, not_found, ok, unauthorized,
};
use crate::services::{ChallengeQuery, Services};
use crate::views::{AddCommentInputView, ChallengeInputView, CreatePostInputView};

/// Header carrying the authenticated caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

type HttpResponse = Response<Full<Bytes>>;

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeListQuery {
    event_id: Option<Uuid>,
    include_counts: Option<bool>,
    active_only: Option<bool>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), FeedError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    pub async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<HttpResponse, hyper::Error> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();
        debug!(method = %method, path = %path, "Incoming request");

        let query = req.uri().query().unwrap_or("").to_string();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        if let (&Method::GET, ["health"]) = (&method, segments.as_slice()) {
            return Ok(self.handle_health().await);
        }

        let caller = match caller_id(&req) {
            Some(id) => id,
            None => return Ok(unauthorized("Missing or invalid X-User-Id header")),
        };

        let response = match (method, segments.as_slice()) {
            // Posts
            (Method::POST, ["groups", gid, "posts"]) => {
                let gid = *gid;
                self.create_post(req, caller, gid).await
            }
            (Method::GET, ["groups", gid, "posts"]) => {
                self.list_group_feed(&query, caller, gid).await
            }
            (Method::GET, ["groups", gid, "members", mid, "posts"]) => {
                self.list_member_posts(&query, caller, gid, mid).await
            }
            (Method::GET, ["posts", pid]) => {
                let (services, pid) = (self.services.clone(), pid.to_string());
                from_result(blocking(move || services.feed.get_post(caller, &pid)).await)
            }
            (Method::DELETE, ["posts", pid]) => {
                let (services, pid) = (self.services.clone(), pid.to_string());
                from_delete_result(blocking(move || services.posts.delete(caller, &pid)).await)
            }

            // Engagement
            (Method::POST, ["posts", pid, "like"]) => {
                let (services, pid) = (self.services.clone(), pid.to_string());
                from_result(blocking(move || services.posts.toggle_like(caller, &pid)).await)
            }
            (Method::POST, ["posts", pid, "comments"]) => {
                let pid = pid.to_string();
                self.add_comment(req, caller, pid).await
            }
            (Method::GET, ["posts", pid, "comments"]) => {
                self.list_post_comments(&query, caller, pid).await
            }
            (Method::DELETE, ["comments", cid]) => {
                let (services, cid) = (self.services.clone(), cid.to_string());
                from_delete_result(
                    blocking(move || services.posts.delete_comment(caller, &cid)).await,
                )
            }

            // Challenges
            (Method::GET, ["groups", gid, "challenges"]) => {
                self.list_challenges(&query, caller, gid).await
            }
            (Method::POST, ["groups", gid, "challenges"]) => {
                let gid = *gid;
                self.create_challenge(req, caller, gid).await
            }
            (Method::PUT, ["groups", gid, "challenges", id]) => {
                let (gid, id) = (*gid, id.to_string());
                self.update_challenge(req, caller, gid, id).await
            }
            (Method::DELETE, ["groups", gid, "challenges", id]) => match parse_group(gid) {
                Ok(group_id) => {
                    let (services, id) = (self.services.clone(), id.to_string());
                    from_delete_result(
                        blocking(move || services.challenges.delete(caller, group_id, &id)).await,
                    )
                }
                Err(resp) => resp,
            },

            (_, ["groups", ..]) | (_, ["posts", ..]) | (_, ["comments", ..]) => {
                method_not_allowed()
            }
            _ => not_found("Route not found"),
        };

        Ok(response)
    }

    /// Health check endpoint
    async fn handle_health(&self) -> HttpResponse {
        let services = self.services.clone();
        match blocking(move || services.db.stats()).await {
            Ok(stats) => ok(&serde_json::json!({
                "status": "ok",
                "posts": stats.post_count,
                "comments": stats.comment_count,
                "likes": stats.like_count,
                "challenges": stats.challenge_count,
            })),
            Err(e) => error_response(e),
        }
    }

    // =========================================================================
    // Post handlers
    // =========================================================================

    async fn create_post(&self, req: Request<Incoming>, caller: Uuid, gid: &str) -> HttpResponse {
        let group_id = match parse_group(gid) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let input: CreatePostInputView = match read_json(req).await {
            Ok(input) => input,
            Err(e) => return error_response(e),
        };

        let services = self.services.clone();
        from_create_result(
            blocking(move || services.posts.create(caller, group_id, input.into())).await,
        )
    }

    async fn list_group_feed(&self, query: &str, caller: Uuid, gid: &str) -> HttpResponse {
        let group_id = match parse_group(gid) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let query: PageQuery = match parse_query(query) {
            Ok(q) => q,
            Err(resp) => return resp,
        };

        let services = self.services.clone();
        from_result(
            blocking(move || {
                services
                    .feed
                    .list_group_feed(caller, group_id, query.page, query.size)
            })
            .await,
        )
    }

    async fn list_member_posts(
        &self,
        query: &str,
        caller: Uuid,
        gid: &str,
        mid: &str,
    ) -> HttpResponse {
        let group_id = match parse_group(gid) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let member_id = match Uuid::parse_str(mid) {
            Ok(id) => id,
            Err(_) => return bad_request("Member id must be a UUID"),
        };
        let query: PageQuery = match parse_query(query) {
            Ok(q) => q,
            Err(resp) => return resp,
        };

        let services = self.services.clone();
        from_result(
            blocking(move || {
                services
                    .feed
                    .list_member_posts(caller, group_id, member_id, query.page, query.size)
            })
            .await,
        )
    }

    // =========================================================================
    // Comment handlers
    // =========================================================================

    async fn add_comment(&self, req: Request<Incoming>, caller: Uuid, pid: String) -> HttpResponse {
        let input: AddCommentInputView = match read_json(req).await {
            Ok(input) => input,
            Err(e) => return error_response(e),
        };

        let services = self.services.clone();
        from_create_result(
            blocking(move || services.posts.add_comment(caller, &pid, &input.content_text)).await,
        )
    }

    async fn list_post_comments(&self, query: &str, caller: Uuid, pid: &str) -> HttpResponse {
        let query: PageQuery = match parse_query(query) {
            Ok(q) => q,
            Err(resp) => return resp,
        };

        let (services, pid) = (self.services.clone(), pid.to_string());
        from_result(
            blocking(move || services.feed.list_post_comments(caller, &pid, query.page, query.size))
                .await,
        )
    }

    // =========================================================================
    // Challenge handlers
    // =========================================================================

    async fn list_challenges(&self, query: &str, caller: Uuid, gid: &str) -> HttpResponse {
        let group_id = match parse_group(gid) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let query: ChallengeListQuery = match parse_query(query) {
            Ok(q) => q,
            Err(resp) => return resp,
        };
        let query = ChallengeQuery {
            event_id: query.event_id,
            include_counts: query.include_counts.unwrap_or(false),
            active_only: query.active_only.unwrap_or(true),
        };

        let services = self.services.clone();
        from_result(blocking(move || services.challenges.list(caller, group_id, query)).await)
    }

    async fn create_challenge(
        &self,
        req: Request<Incoming>,
        caller: Uuid,
        gid: &str,
    ) -> HttpResponse {
        let group_id = match parse_group(gid) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let input: ChallengeInputView = match read_json(req).await {
            Ok(input) => input,
            Err(e) => return error_response(e),
        };

        let services = self.services.clone();
        from_create_result(
            blocking(move || services.challenges.create(caller, group_id, input.into())).await,
        )
    }

    async fn update_challenge(
        &self,
        req: Request<Incoming>,
        caller: Uuid,
        gid: &str,
        id: String,
    ) -> HttpResponse {
        let group_id = match parse_group(gid) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let input: ChallengeInputView = match read_json(req).await {
            Ok(input) => input,
            Err(e) => return error_response(e),
        };

        let services = self.services.clone();
        from_result(
            blocking(move || services.challenges.update(caller, group_id, &id, input.into())).await,
        )
    }
}

/// Run a synchronous service call off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, FeedError>
where
    F: FnOnce() -> Result<T, FeedError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FeedError::Internal(format!("Service task failed: {}", e)))?
}

fn caller_id<B>(req: &Request<B>) -> Option<Uuid> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

fn parse_group(raw: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| bad_request("Group id must be a UUID"))
}

fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, HttpResponse> {
    serde_urlencoded::from_str(query)
        .map_err(|e| bad_request(&format!("Invalid query string: {}", e)))
}

async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, FeedError> {
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| FeedError::Validation(format!("Failed to read body: {}", e)))?
        .to_bytes();
    Ok(serde_json::from_slice(&body)?)
}
