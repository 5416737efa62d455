#[tokio::main]
async fn main() {
    if let Err(e) = roomchat_lib::run().await {
        tracing::error!("Fatal: {e}");
        eprintln!("roomchat: {e}");
        std::process::exit(1);
    }
}
