use futures_util::{SinkExt, StreamExt};
use shared::{frames, opcode, StringCodec};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

const PROTOCOL_VERSION: u32 = 8;

fn describe(bytes: &[u8]) -> String {
    match bytes.first().copied() {
        Some(opcode::CLEAR_ALL) => "ClearAll".to_string(),
        Some(opcode::SET_BORDER) => format!("SetBorder ({} bytes)", bytes.len()),
        Some(opcode::CHAT_MESSAGE) => {
            // [op][flags][r][g][b][name\0][text\0]
            let body = bytes.get(5..).unwrap_or_default();
            let text: Vec<String> = body
                .split(|b| *b == 0)
                .filter(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect();
            format!("Chat {:?}", text)
        }
        Some(opcode::SERVER_STAT) => {
            let json = bytes.get(1..bytes.len().saturating_sub(1)).unwrap_or_default();
            format!("ServerStat {}", String::from_utf8_lossy(json))
        }
        Some(other) => format!("opcode 0x{:02X} ({} bytes)", other, bytes.len()),
        None => "empty frame".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8080".to_string());

    println!("Connecting to {}", url);
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut source) = ws.split();

    // Print whatever the server sends
    let reader = tokio::spawn(async move {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Binary(bytes)) => println!("<- {}", describe(&bytes)),
                Ok(Message::Close(frame)) => {
                    println!("<- close {:?}", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    println!("Read error: {}", e);
                    break;
                }
            }
        }
    });

    println!("Sending handshake (protocol {})", PROTOCOL_VERSION);
    sink.send(Message::Binary(frames::protocol(PROTOCOL_VERSION)?)).await?;
    sink.send(Message::Binary(frames::handshake_key(0)?)).await?;

    let codec = StringCodec::for_protocol(PROTOCOL_VERSION as i32);
    sink.send(Message::Binary(frames::join("<r>tester", codec))).await?;

    // Circle the cursor for a few seconds
    for i in 0..20 {
        let angle = i as f64 / 20.0 * std::f64::consts::TAU;
        let x = (angle.cos() * 500.0) as i32;
        let y = (angle.sin() * 500.0) as i32;
        sink.send(Message::Binary(frames::mouse_i32(x, y)?)).await?;
        if i % 5 == 4 {
            sink.send(Message::Binary(frames::key(opcode::SPLIT))).await?;
        }
        sleep(Duration::from_millis(200)).await;
    }

    sink.send(Message::Binary(frames::chat(0, "hello from test_client", codec)))
        .await?;
    sleep(Duration::from_secs(2)).await;
    sink.send(Message::Binary(frames::key(opcode::STAT))).await?;
    sleep(Duration::from_millis(500)).await;

    println!("Closing connection");
    sink.send(Message::Close(None)).await?;
    if timeout(Duration::from_secs(2), reader).await.is_err() {
        println!("Server did not close in time");
    }

    println!("Test client finished");
    Ok(())
}
