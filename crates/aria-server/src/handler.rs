//! Per-connection request loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use aria_auth::UserStore;

use crate::router::Router;

/// Serve one client: read newline-delimited requests until EOF, answering
/// each with exactly one line. A request that fails to parse still gets
/// its error line; only an I/O failure or the client closing ends the
/// loop.
pub async fn handle_conn<S: UserStore>(
    stream: TcpStream,
    router: Arc<Router<S>>,
    peer: SocketAddr,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = router.dispatch(line.trim()).await;
        write_half.write_all(reply.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
    }

    debug!(peer = %peer, "client closed connection");
    Ok(())
}
