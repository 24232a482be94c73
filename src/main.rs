#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = pedagogical_radar::run().await {
        eprintln!("pedagogical-radar fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
