use std::sync::Arc;

use tcproxy_core::{AddressHeader, EncryptionTable, StreamConnection};
use tcproxy_local::pool::{ServerEntry, ServerPool};
use tcproxy_local::{session, socks5};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A SOCKS5 client's CONNECT request is answered with the fixed success
/// reply, then the raw address and the client's payload arrive at the
/// "remote" decrypted and byte-identical.
#[tokio::test]
async fn happy_path_local_session() {
    let remote_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = remote_listener.local_addr().unwrap();
    let table = Arc::new(EncryptionTable::new("foobar!"));

    let remote_table = table.clone();
    let remote_task = tokio::spawn(async move {
        let (stream, _) = remote_listener.accept().await.unwrap();
        let mut tunnel = StreamConnection::new(stream, remote_table);
        let header = AddressHeader::decode(&mut tunnel).await.unwrap();
        let mut payload = [0u8; 5];
        tunnel.read_exact(&mut payload).await.unwrap();
        (header, payload)
    });

    let pool = Arc::new(
        ServerPool::new(vec![ServerEntry {
            addr: remote_addr.to_string(),
            table,
        }])
        .unwrap(),
    );

    let local_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = local_listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (client, _) = local_listener.accept().await.unwrap();
        session::handle(client, pool).await;
    });

    let mut client = TcpStream::connect(local_addr).await.unwrap();
    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut method_reply = [0u8; 2];
    client.read_exact(&mut method_reply).await.unwrap();
    assert_eq!(method_reply, [0x05, 0x00]);

    let request = [0x05, 0x01, 0x00, 0x01, 93, 184, 216, 34, 0x01, 0xBB];
    client.write_all(&request).await.unwrap();
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, socks5::SUCCESS_REPLY);

    client.write_all(b"hello").await.unwrap();

    let (header, payload) = remote_task.await.unwrap();
    assert_eq!(
        header,
        AddressHeader::Ipv4 {
            addr: [93, 184, 216, 34],
            port: 0x01BB,
        }
    );
    assert_eq!(&payload, b"hello");
}
