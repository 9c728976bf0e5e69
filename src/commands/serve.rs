//! The `serve` command: HTTP/WebSocket façade with the monitor alongside.

use crate::cli::ServeArgs;
use crate::context::LockDirContext;
use crate::error::{Result, ViseError};
use crate::identity;
use crate::locks::LockStore;
use crate::monitor::{FileMonitor, ProcessScanner, DEFAULT_STOP_WAIT};
use crate::server::{self, ServerContext};
use std::time::Duration;

pub fn cmd_serve(ctx: &LockDirContext, args: ServeArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let store = LockStore::new(&ctx.lock_dir, &config);

    let host = args.host.unwrap_or_else(|| config.serve_host.clone());
    let port = args.port.unwrap_or(config.serve_port);

    // The monitor runs alongside the server, so API clients see
    // auto-detected locks too.
    let mut monitor = FileMonitor::new(
        store.clone(),
        ProcessScanner::new(&config),
        Duration::from_millis(config.check_interval_ms),
        identity::owner_user(),
        identity::owner_host(),
    );
    monitor.start();

    let server_ctx = ServerContext::new(store);
    println!("Serving lock API on http://{}:{}", host, port);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ViseError::Io(format!("failed to start async runtime: {}", e)))?;
    let result = runtime.block_on(server::serve(server_ctx, &host, port));

    monitor.stop(DEFAULT_STOP_WAIT);
    result
}
