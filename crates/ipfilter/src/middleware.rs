//! axum middleware running an [`IpFilter`] in front of a router.
//!
//! ```ignore
//! let filter = IpFilter::new(RuleSet::load("rules.toml")?);
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(filter, ipfilter_layer));
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use std::net::SocketAddr;

use {
    axum::{
        extract::{ConnectInfo, Request, State},
        http::{StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    tracing::{debug, warn},
};

use crate::{
    BlockPage, ClientRequest, FORWARDED_FOR_HEADER, IpFilter,
    block::{BlockStatus, INTERNAL_ERROR_STATUS},
};

/// Filter the request, forwarding it to `next` only when allowed.
///
/// Blocked requests get the block page with `200`, or `403` without one.
/// Evaluation or block page failures answer `500`.
pub async fn ipfilter_layer(
    State(filter): State<IpFilter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let remote = addr.to_string();
    // Non-ASCII bytes must not hide the header; bad entries are skipped later.
    let forwarded_for = request
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    let client = ClientRequest::new(request.uri().path(), &remote)
        .with_forwarded_for(forwarded_for.as_deref());

    let blocked = match filter.evaluate(&client) {
        Ok(decision) if decision.allow => None,
        Ok(decision) => {
            debug!(%addr, scope = ?decision.scope, "request blocked");
            Some(decision.block_page.cloned())
        },
        Err(e) => {
            warn!(%addr, error = %e, "ipfilter failed, refusing request");
            return internal_error().into_response();
        },
    };

    match blocked {
        None => next.run(request).await,
        Some(page) => blocked_response(page).await,
    }
}

async fn blocked_response(page: Option<BlockPage>) -> Response {
    let Some(page) = page else {
        return status(BlockStatus::Forbidden).into_response();
    };

    match tokio::fs::read(page.path()).await {
        Ok(body) => (
            status(BlockStatus::PageServed),
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            let err = page.streaming_failed(e);
            warn!(error = %err, "block page unavailable");
            internal_error().into_response()
        },
    }
}

fn status(block: BlockStatus) -> StatusCode {
    StatusCode::from_u16(block.status_code()).unwrap_or(StatusCode::FORBIDDEN)
}

fn internal_error() -> StatusCode {
    StatusCode::from_u16(INTERNAL_ERROR_STATUS).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
