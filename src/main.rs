#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autoplay_cli::cli::run().await
}
