use actuator_shared::{codec, protocol};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", protocol::CONTROL_PORT));

    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Unable to connect to {}", addr))?;
    println!("Connected to actuator node at {}", addr);
    print_usage();

    let (reader, mut writer) = stream.into_split();
    let mut incoming = tokio::spawn(print_incoming(reader));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!("stdin closed, disconnecting");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                writer.write_all(line.as_bytes()).await?;
            }
            _ = &mut incoming => {
                println!("Node closed the connection");
                return Ok(());
            }
        }
    }

    writer.shutdown().await?;
    incoming.abort();
    Ok(())
}

fn print_usage() {
    println!("Commands:");
    println!("  L  blink the next LED");
    println!("  F  motor forward");
    println!("  R  motor reverse");
    println!("  S  motor stop");
    println!("Button presses on the node are shown as they arrive.");
}

/// Print each line the node pushes until it closes the connection
async fn print_incoming(mut reader: OwnedReadHalf) {
    let mut decoder = codec::LineDecoder::new();
    let mut buf = vec![0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                decoder.extend(&buf[..n]);

                loop {
                    match decoder.decode_next() {
                        Ok(Some(line)) => println!("[received] {}", line),
                        Ok(None) => break,
                        Err(e) => {
                            eprintln!("Discarding malformed input: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}
