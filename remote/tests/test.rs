use std::collections::HashMap;
use std::time::Duration;

use tcproxy_core::{AddressHeader, EncryptionTable, StreamConnection};
use tcproxy_remote::dispatcher::Dispatcher;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// A tunneled session through the dispatcher's listener reaches a real
/// target and echoes bytes back, end to end.
#[tokio::test]
async fn dispatcher_relays_a_tunneled_session_to_its_target() {
    let echo_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let echo_addr = echo_listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = echo_listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        }
    });

    let dispatcher = Dispatcher::new(false, Duration::from_secs(5));
    let mut map = HashMap::new();
    map.insert(19388u16, "swordfish".to_string());
    dispatcher.apply(&map).await.unwrap();

    let table = EncryptionTable::new("swordfish");
    let header = AddressHeader::Domain {
        host: echo_addr.ip().to_string(),
        port: echo_addr.port(),
    };

    let stream = TcpStream::connect(("127.0.0.1", 19388)).await.unwrap();
    let mut client = StreamConnection::new(stream, std::sync::Arc::new(table));
    client.write_all(&header.encode()).await.unwrap();
    client.write_all(b"ping through the tunnel\r\n").await.unwrap();
    client.flush().await.unwrap();

    let mut line = String::new();
    BufReader::new(client).read_line(&mut line).await.unwrap();
    assert_eq!(line, "ping through the tunnel\r\n");
}
