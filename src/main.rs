#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studysyncd::start_server().await
}
