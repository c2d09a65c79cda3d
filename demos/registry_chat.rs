use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};
use serde_json::json;

fn type_name(kind: &str) -> &str {
    match kind {
        "inn" => "ИНН",
        "kpp" => "КПП",
        "ogrn" => "ОГРН",
        other => other,
    }
}

/// Chat-style registry validation: shout an identifier into the lobby, the
/// server replies to everyone with the validation verdict.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let url = std::env::var("PHOENIX_URL")
        .unwrap_or_else(|_| "ws://localhost:4000/socket/websocket".to_string());

    println!("🦀 Registry validation chat\n");

    let client = PhoenixClient::new(&url, PhoenixClientOptions::default())?;
    client.connect().await?;
    println!("✅ Connected to {}\n", url);

    let channel = client.channel("general:lobby", Default::default()).await?;
    let mut shouts = channel.on("shout").await;
    channel.subscribe().await?;
    println!("✅ Joined {}\n", channel.topic());

    tokio::spawn(async move {
        while let Some(payload) = shouts.recv().await {
            let kind = payload["type"].as_str().unwrap_or("?");
            let data = payload["data"].as_str().unwrap_or("");
            let verdict = if payload["result"].as_bool().unwrap_or(false) {
                "корректен"
            } else {
                "некорректен"
            };
            println!(
                "[{}] {} {} {}",
                payload["datetime"].as_str().unwrap_or("-"),
                type_name(kind),
                data,
                verdict
            );
        }
    });

    for (kind, value) in [
        ("inn", "7707083893"),
        ("kpp", "773601001"),
        ("ogrn", "1027700132195"),
    ] {
        channel
            .push("shout", json!({"type": kind, "data": value}))
            .send()
            .await?;
    }

    println!("⏳ Listening for shouts for 30 seconds...\n");
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;

    println!("\n✅ Disconnecting...");
    client.disconnect().await?;
    Ok(())
}
