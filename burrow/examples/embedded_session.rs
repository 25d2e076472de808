//! Example: Embedded Burrow session
//!
//! Forwards local ports to private instances from inside your own program.
//!
//! # Usage
//!
//! ```bash
//! BURROW_API_TOKEN=... cargo run --example embedded_session -- \
//!     8443:nginx:8080 db.internal:5432
//! ```

use anyhow::Context;
use burrow::common::ControlPlaneConfig;
use burrow::Session;
use std::env;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,burrow_core=debug")
        .init();

    let forwards: Vec<String> = env::args().skip(1).collect();

    let session = Session::builder()
        .forwards(forwards)
        .api(ControlPlaneConfig {
            api_token: env::var("BURROW_API_TOKEN").ok(),
            project: env::var("BURROW_PROJECT").ok(),
            ..Default::default()
        })
        .build()
        .context("invalid session configuration")?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ctrl_c.cancel(),
            Err(e) => eprintln!("cannot listen for Ctrl+C: {e}"),
        }
    });

    session
        .run_with(shutdown, |info| {
            println!("Proxy {} ready at {}", info.instance_id, info.fqdn);
            for forward in &info.forwards {
                println!("  {forward}");
            }
            println!("Press Ctrl+C to stop");
        })
        .await
        .context("session failed")
}
