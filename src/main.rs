use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    uiresolve_cli::cli::run().await
}
