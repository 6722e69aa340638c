#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = eduboard::run().await {
        eprintln!("eduboard fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
