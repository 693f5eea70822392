use cryptopals_oracles::{server, AesCbcPaddingOracle};

use std::sync::Arc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "padding oracle listening");
    server::serve(listener, Arc::new(AesCbcPaddingOracle::new())).await
}
