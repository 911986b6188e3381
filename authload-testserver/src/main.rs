use std::net::SocketAddr;

use authload_testserver::{TestServerBehavior, TestServerStats, TokenPlacement};
use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut behavior = TestServerBehavior::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--signup-limit" => {
                let n = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--signup-limit requires a number"))?;
                behavior.signup_accept_limit = Some(n.parse()?);
            }
            "--fail-logins" => behavior.fail_logins = true,
            "--fail-chain" => behavior.fail_chain = true,
            "--token-in-header" => behavior.token_placement = TokenPlacement::Header,
            "-h" | "--help" => {
                eprintln!(
                    "authload-testserver\n\nUSAGE:\n  authload-testserver [--bind 127.0.0.1:0] [--signup-limit N] [--fail-logins] [--fail-chain] [--token-in-header]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = authload_testserver::router(TestServerStats::default(), behavior);

    println!("HTTP_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
