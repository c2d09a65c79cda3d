use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};
use std::time::Duration;

/// Watch the client ride out a network interruption: kill your network while
/// this runs and bring it back a few seconds later.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🦀 Testing reconnection\n");

    let url = std::env::var("PHOENIX_URL").expect("PHOENIX_URL must be set in .env");

    println!("📡 Connecting to: {}\n", url);

    let client = PhoenixClient::new(&url, PhoenixClientOptions::default())?;

    println!("✅ Test 1: Initial connection...");
    client.connect().await?;
    assert!(client.is_connected().await, "Should be connected");
    println!("✅ Connected successfully!\n");

    let channel = client.channel("general:lobby", Default::default()).await?;
    let mut shouts = channel.on("shout").await;
    channel.subscribe().await?;

    tokio::spawn(async move {
        while let Some(payload) = shouts.recv().await {
            println!("📨 {payload}");
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("✅ Test 2: Manual disconnect (should NOT auto-reconnect)...");
    client.disconnect().await?;
    assert!(!client.is_connected().await, "Should be disconnected");

    tokio::time::sleep(Duration::from_secs(5)).await;
    if client.is_connected().await {
        return Err("Should NOT reconnect after manual disconnect".into());
    }
    println!("✅ Correctly stayed disconnected after manual disconnect!\n");

    println!("✅ Test 3: Reconnect and monitor...");
    client.connect().await?;
    assert!(client.is_connected().await, "Should be connected again");
    println!("✅ Reconnected, channel rejoins automatically\n");

    println!("⏳ Keeping the connection alive for 60 seconds.");
    println!("   Interrupt your network to watch backoff-reconnect and rejoin.\n");

    for i in 1..=60 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = if client.is_connected().await {
            "🟢 Connected"
        } else {
            "🔴 Disconnected"
        };
        print!("\r⏱  Second {}/60 - Status: {}", i, status);
        std::io::Write::flush(&mut std::io::stdout())?;
    }
    println!("\n\n🎉 Reconnection run completed");

    Ok(())
}
