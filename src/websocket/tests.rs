//! Tests for the WebSocket handshake, frame codec and session.

#[cfg(test)]
mod websocket_tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

    use crate::parser::{parse_request, Connection};
    use crate::server::{HttpResponse, HttpServer, ServerConfig};
    use crate::websocket::{
        compute_accept_key, handshake, read_frame, websocket, Frame, OpCode, WebSocketHandlers,
        WebSocketSession, WsError,
    };

    const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    /// Build a masked client frame.
    fn client_frame(fin: bool, opcode: u8, payload: &[u8]) -> Vec<u8> {
        let fin_bit: u8 = if fin { 0x80 } else { 0x00 };
        let mut out = vec![fin_bit | opcode];
        let len = payload.len();
        if len < 126 {
            out.push(0x80 | len as u8);
        } else if len <= u16::MAX as usize {
            out.push(0x80 | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(0x80 | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
        out.extend_from_slice(&MASK);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ MASK[i % 4]));
        out
    }

    /// Read one unmasked server frame, returning (first byte, payload).
    async fn server_frame<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> (u8, Vec<u8>) {
        let mut header = [0u8; 2];
        reader.read_exact(&mut header).await.unwrap();
        assert_eq!(header[1] & 0x80, 0, "server frames are never masked");
        let len = match header[1] & 0x7F {
            126 => reader.read_u16().await.unwrap() as usize,
            127 => reader.read_u64().await.unwrap() as usize,
            short => short as usize,
        };
        let mut payload = vec![0; len];
        reader.read_exact(&mut payload).await.unwrap();
        (header[0], payload)
    }

    fn echo_handlers() -> WebSocketHandlers {
        WebSocketHandlers::new()
            .on_text(|session, text| {
                Box::pin(async move {
                    let _ = session.write_text(&text).await;
                })
            })
            .on_binary(|session, data| {
                Box::pin(async move {
                    let _ = session.write_binary(&data).await;
                })
            })
    }

    fn spawn_session(handlers: WebSocketHandlers) -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = duplex(64 * 1024);
        let session = WebSocketSession::new(Box::new(Connection::new(server, 1024)));
        (client, tokio::spawn(session.run(handlers)))
    }

    #[test]
    fn test_accept_key_matches_rfc_example() {
        assert_eq!(compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_frame_encoding_lengths() {
        let short = Frame::new(OpCode::Text, "hello").encode();
        assert_eq!(&short[..2], &[0x81, 5]);
        assert_eq!(&short[2..], b"hello");

        let medium = Frame::new(OpCode::Binary, vec![0u8; 200]).encode();
        assert_eq!(&medium[..4], &[0x82, 126, 0, 200]);
        assert_eq!(medium.len(), 204);

        let large = Frame::new(OpCode::Binary, vec![0u8; 70_000]).encode();
        assert_eq!(large[1], 127);
        assert_eq!(&large[2..10], &70_000u64.to_be_bytes());
        assert_eq!(large.len(), 70_010);

        let mut partial = Frame::new(OpCode::Text, "a");
        partial.fin = false;
        assert_eq!(partial.encode()[0], 0x01);
    }

    #[tokio::test]
    async fn test_read_masked_frames() {
        let (mut client, server) = duplex(256 * 1024);
        let mut connection = Connection::new(server, 1024);

        let big = vec![7u8; 70_000];
        client.write_all(&client_frame(true, 0x1, b"hello")).await.unwrap();
        client.write_all(&client_frame(true, 0x2, &big)).await.unwrap();

        let frame = read_frame(&mut connection, 1 << 20).await.unwrap();
        assert_eq!(frame, Frame::new(OpCode::Text, "hello"));

        let frame = read_frame(&mut connection, 1 << 20).await.unwrap();
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload, big);
    }

    #[tokio::test]
    async fn test_read_frame_rejections() {
        let (mut client, server) = duplex(1024);
        let mut connection = Connection::new(server, 1024);

        client.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();
        assert!(matches!(read_frame(&mut connection, 1024).await, Err(WsError::UnmaskedFrame)));

        let (mut client, server) = duplex(1024);
        let mut connection = Connection::new(server, 1024);
        client.write_all(&client_frame(true, 0x2, &[0u8; 64])).await.unwrap();
        assert!(matches!(
            read_frame(&mut connection, 16).await,
            Err(WsError::PayloadTooLarge { size: 64, max: 16 })
        ));

        let (mut client, server) = duplex(1024);
        let mut connection = Connection::new(server, 1024);
        client.write_all(&client_frame(false, 0x9, b"ping")).await.unwrap();
        assert!(matches!(read_frame(&mut connection, 1024).await, Err(WsError::ProtocolViolation(_))));

        let (mut client, server) = duplex(1024);
        let mut connection = Connection::new(server, 1024);
        client.write_all(&client_frame(true, 0x3, b"")).await.unwrap();
        assert!(matches!(read_frame(&mut connection, 1024).await, Err(WsError::InvalidOpcode(0x3))));
    }

    #[test]
    fn test_handshake_validation() {
        let valid = parse_request(
            b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: keep-alive, Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .unwrap();
        let response = handshake(&valid, WebSocketHandlers::new());
        assert_eq!(response.status_code(), 101);
        assert_eq!(response.header("sec-websocket-accept"), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert_eq!(response.header("upgrade"), Some("websocket"));

        let token_list = parse_request(
            b"GET /ws HTTP/1.1\r\nUpgrade: WebSocket, h2c\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .unwrap();
        assert_eq!(handshake(&token_list, WebSocketHandlers::new()).status_code(), 101);

        let wrong_protocol = parse_request(
            b"GET /ws HTTP/1.1\r\nUpgrade: h2c\r\nConnection: Upgrade\r\nSec-WebSocket-Key: abc\r\n\r\n",
        )
        .unwrap();
        assert_eq!(handshake(&wrong_protocol, WebSocketHandlers::new()).status_code(), 400);

        let no_upgrade = parse_request(b"GET /ws HTTP/1.1\r\nSec-WebSocket-Key: abc\r\n\r\n").unwrap();
        assert_eq!(handshake(&no_upgrade, WebSocketHandlers::new()).status_code(), 400);

        let no_key =
            parse_request(b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n").unwrap();
        let response = handshake(&no_key, WebSocketHandlers::new());
        assert_eq!(response.status_code(), 400);
        assert!(matches!(response, HttpResponse::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_session_echo_ping_and_close() {
        let connected = Arc::new(AtomicBool::new(false));
        let disconnected = Arc::new(AtomicBool::new(false));
        let (on_connect, on_disconnect) = (connected.clone(), disconnected.clone());

        let handlers = echo_handlers()
            .on_connected(move |_session| {
                on_connect.store(true, Ordering::SeqCst);
                Box::pin(async {})
            })
            .on_disconnected(move |_session| {
                on_disconnect.store(true, Ordering::SeqCst);
                Box::pin(async {})
            });
        let (mut client, task) = spawn_session(handlers);

        client.write_all(&client_frame(true, 0x1, b"hello")).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x81, b"hello".to_vec()));

        client.write_all(&client_frame(true, 0x2, &[1, 2, 3])).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x82, vec![1, 2, 3]));

        client.write_all(&client_frame(true, 0x9, b"are you there")).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x8A, b"are you there".to_vec()));

        client.write_all(&client_frame(true, 0x8, &1000u16.to_be_bytes())).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x88, vec![0x03, 0xE8]));

        task.await.unwrap();
        let mut rest = Vec::new();
        assert_eq!(client.read_to_end(&mut rest).await.unwrap(), 0);
        assert!(connected.load(Ordering::SeqCst));
        assert!(disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_server_initiated_ping_and_close() {
        let handlers = WebSocketHandlers::new()
            .on_connected(|session| {
                Box::pin(async move {
                    let _ = session.write_ping(b"hi").await;
                })
            })
            .on_text(|session, text| {
                Box::pin(async move {
                    if text == "bye" {
                        let _ = session.write_close(1000).await;
                    }
                })
            });
        let (mut client, task) = spawn_session(handlers);

        assert_eq!(server_frame(&mut client).await, (0x89, b"hi".to_vec()));
        client.write_all(&client_frame(true, 0x1, b"bye")).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x88, vec![0x03, 0xE8]));

        client.write_all(&client_frame(true, 0x8, &1000u16.to_be_bytes())).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x88, vec![0x03, 0xE8]));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_fragmented_message_is_reassembled() {
        let (mut client, task) = spawn_session(echo_handlers());

        client.write_all(&client_frame(false, 0x1, b"hel")).await.unwrap();
        // Control frames may be interleaved between fragments.
        client.write_all(&client_frame(true, 0x9, b"")).await.unwrap();
        client.write_all(&client_frame(false, 0x0, b"lo ")).await.unwrap();
        client.write_all(&client_frame(true, 0x0, b"world")).await.unwrap();

        assert_eq!(server_frame(&mut client).await, (0x8A, Vec::new()));
        assert_eq!(server_frame(&mut client).await, (0x81, b"hello world".to_vec()));

        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_pong_callback_and_invalid_utf8() {
        let pongs = Arc::new(Mutex::new(Vec::new()));
        let seen = pongs.clone();
        let disconnected = Arc::new(AtomicBool::new(false));
        let on_disconnect = disconnected.clone();

        let handlers = echo_handlers()
            .on_pong(move |_session, data| {
                seen.lock().unwrap().push(data);
                Box::pin(async {})
            })
            .on_disconnected(move |session| {
                on_disconnect.store(true, Ordering::SeqCst);
                Box::pin(async move {
                    assert!(session.write_text("too late").await.is_err());
                })
            });
        let (mut client, task) = spawn_session(handlers);

        client.write_all(&client_frame(true, 0xA, b"beat")).await.unwrap();
        client.write_all(&client_frame(true, 0x1, &[0xff, 0xfe])).await.unwrap();

        task.await.unwrap();
        assert_eq!(*pongs.lock().unwrap(), vec![b"beat".to_vec()]);
        assert!(disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_upgrade_through_http_server() {
        let mut server = HttpServer::new(ServerConfig::default());
        server.get("/echo", websocket(echo_handlers()));
        let server = Arc::new(server);

        let (client, socket) = duplex(64 * 1024);
        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.handle_connection(socket, None).await })
        };

        let mut client = BufReader::new(client);
        client
            .get_mut()
            .write_all(
                b"GET /echo HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
            )
            .await
            .unwrap();

        let mut head = Vec::new();
        loop {
            let mut line = String::new();
            client.read_line(&mut line).await.unwrap();
            if line == "\r\n" {
                break;
            }
            head.push(line);
        }
        assert_eq!(head[0], "HTTP/1.1 101 Switching Protocols\r\n");
        assert!(head.contains(&"Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n".to_string()));
        assert!(!head.iter().any(|line| line.starts_with("Content-Length")));

        client.get_mut().write_all(&client_frame(true, 0x1, b"over http")).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x81, b"over http".to_vec()));

        client.get_mut().write_all(&client_frame(true, 0x8, &1001u16.to_be_bytes())).await.unwrap();
        assert_eq!(server_frame(&mut client).await, (0x88, vec![0x03, 0xE9]));

        assert!(serving.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_rejected_upgrade_returns_bad_request() {
        let mut server = HttpServer::new(ServerConfig::default());
        server.get("/echo", websocket(echo_handlers()));

        let (mut client, socket) = duplex(64 * 1024);
        client.write_all(b"GET /echo HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        server.handle_connection(socket, None).await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.ends_with("Invalid value of 'Upgrade' header"));
    }
}
