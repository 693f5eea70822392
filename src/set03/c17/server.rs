// A padding oracle served over HTTP.
//
//   GET /encrypt                             -> 200 "<ciphertext hex>:<iv hex>"
//   GET /validate?ciphertext=<hex>&iv=<hex>  -> 200 valid padding
//                                               403 invalid padding
//                                               400 malformed request
use crate::PaddingOracle;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info};

use std::{collections::HashMap, sync::Arc};

pub type SharedOracle = Arc<dyn PaddingOracle + Send + Sync>;

pub fn router(oracle: SharedOracle) -> Router {
    Router::new()
        .route("/encrypt", get(handle_encrypt))
        .route("/validate", get(handle_validate))
        .with_state(oracle)
}

/// Serve `oracle` on `listener` until the server fails.
pub async fn serve(listener: TcpListener, oracle: SharedOracle) -> std::io::Result<()> {
    axum::serve(listener, router(oracle)).await
}

/// Bind `address` and serve `oracle` in the background, returning the base
/// URL of the server.
pub async fn spawn_server(
    address: impl ToSocketAddrs,
    oracle: SharedOracle,
) -> std::io::Result<String> {
    let listener = TcpListener::bind(address).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = serve(listener, oracle).await {
            error!("padding oracle server stopped: {e}");
        }
    });
    info!(%addr, "padding oracle listening");
    Ok(format!("http://{}", addr))
}

async fn handle_encrypt(State(oracle): State<SharedOracle>) -> Response {
    match oracle.encrypt() {
        Ok((ciphertext, iv)) => (
            StatusCode::OK,
            format!("{}:{}", hex::encode(ciphertext), hex::encode(iv)),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn handle_validate(
    State(oracle): State<SharedOracle>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let ciphertext = match hex_param(&params, "ciphertext") {
        Ok(c) => c,
        Err(response) => return response,
    };
    let iv = match hex_param(&params, "iv") {
        Ok(iv) => iv,
        Err(response) => return response,
    };

    match oracle.validate(&ciphertext, &iv) {
        Ok(true) => (StatusCode::OK, "valid padding").into_response(),
        Ok(false) => (StatusCode::FORBIDDEN, "invalid padding").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

fn hex_param(params: &HashMap<String, String>, name: &str) -> Result<Vec<u8>, Response> {
    let value = params.get(name).ok_or_else(|| {
        (StatusCode::BAD_REQUEST, format!("Missing '{name}' parameter")).into_response()
    })?;
    hex::decode(value).map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Illegal '{name}' parameter: {e}")).into_response()
    })
}
