use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::app::AppContext;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Address of the caller as the application sees it.
///
/// With `proxy` enabled the first `X-Forwarded-For` entry is the client and
/// the TCP peer is only used when the header is absent. An entry that is not
/// an address yields `None`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, proxy: bool) -> Option<IpAddr> {
    if proxy {
        if let Some(forwarded) = headers.get(FORWARDED_FOR) {
            let first = forwarded.to_str().ok()?.split(',').next()?.trim();
            return first
                .parse::<IpAddr>()
                .or_else(|_| first.parse::<SocketAddr>().map(|addr| addr.ip()))
                .ok();
        }
    }
    peer.map(|addr| addr.ip())
}

/// Let only loopback callers through.
///
/// Anyone else gets the router's default not-found answer, so the endpoint
/// looks absent from the outside.
pub async fn loopback_only(
    State(ctx): State<AppContext>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(request.headers(), peer, ctx.proxy());

    match client {
        Some(ip) if ip.to_canonical().is_loopback() => Ok(next.run(request).await),
        _ => {
            tracing::debug!(
                peer = ?peer,
                client = ?client,
                path = %request.uri().path(),
                "Ignoring admin request from non-loopback client"
            );
            Err(StatusCode::NOT_FOUND)
        }
    }
}
