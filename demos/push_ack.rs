use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();
    println!("🦀 Testing acknowledged pushes\n");

    let url = std::env::var("PHOENIX_URL")
        .unwrap_or_else(|_| "ws://localhost:4000/socket/websocket".to_string());

    let client = PhoenixClient::new(
        &url,
        PhoenixClientOptions {
            heartbeat_interval: Some(30_000),
            ..Default::default()
        },
    )?;

    client.connect().await?;
    println!("✅ Connected!\n");

    let channel = client.channel("general:lobby", Default::default()).await?;
    channel.subscribe().await?;
    println!("✅ Joined channel: {}\n", channel.topic());

    channel
        .push(
            "shout",
            serde_json::json!({"type": "inn", "data": "7707083893"}),
        )
        .receive("ok", |response| {
            println!("📨 Push acknowledged with 'ok': {response}")
        })
        .receive("error", |response| {
            println!("❌ Push acknowledged with 'error': {response}")
        })
        .receive("timeout", |_| println!("⏰ Push timed out"))
        .send()
        .await?;

    tokio::time::sleep(tokio::time::Duration::from_secs(15)).await;

    println!("\n✅ Disconnecting...");
    client.disconnect().await?;
    println!("✅ Disconnected!\n");

    Ok(())
}
