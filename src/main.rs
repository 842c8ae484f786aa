#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = provera_rust::run().await {
        eprintln!("provera-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
