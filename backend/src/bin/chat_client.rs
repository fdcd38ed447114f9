use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

const SYMPTOMS: [&str; 4] = ["I have chest pain", "fever since morning", "feeling dizzy", "xyz"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = std::env::args().nth(1).unwrap_or_else(|| "ws://127.0.0.1:8080/ws".to_string());
    let url = Url::parse(&base)?;

    println!("🔌 Connecting to VitalDesk chat at {}...", url);
    let (ws_stream, _) = connect_async(url.to_string()).await?;
    let (mut write, mut read) = ws_stream.split();
    println!("✅ Connected!");

    for text in SYMPTOMS {
        let frame = json!({ "type": "message", "text": text });
        write.send(Message::Text(frame.to_string().into())).await?;
        println!("🗨️ Sent: {}", text);

        // Drain events until the bot goes quiet for a moment.
        while let Ok(Some(msg)) = timeout(Duration::from_millis(1500), read.next()).await {
            if let Message::Text(event) = msg? {
                println!("   ⬅️ {}", event);
            }
        }
        sleep(Duration::from_millis(200)).await;
    }

    write.send(Message::Close(None)).await?;
    println!("🛑 Chat finished.");
    Ok(())
}
