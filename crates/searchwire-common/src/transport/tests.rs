//! Tests for the connection lifecycle
//!
//! These tests run real loopback sockets: a listener thread plays the
//! server and a bound-then-dropped port plays a dead one.

#[cfg(test)]
mod tests {
    use crate::protocol::{Method, RestRequest, SearchwireError, Status};
    use crate::server::Server;
    use crate::transport::codec::{FramedCodec, ResponseFrame};
    use crate::transport::{Codec, Connection, ConnectionState, SocketSettings, WireProtocol};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn settings() -> SocketSettings {
        SocketSettings::default()
            .with_connect_timeout(Duration::from_millis(500))
            .with_io_timeout(Duration::from_millis(500))
    }

    fn dead_server() -> Server {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Server::new("127.0.0.1", port)
    }

    /// Serves one HTTP exchange, returning the raw request head it saw.
    fn one_shot_http(response: &'static str) -> (Server, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                head.push_str(&line);
            }
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).unwrap();
            head.push_str(&String::from_utf8(body).unwrap());

            reader.get_mut().write_all(response.as_bytes()).unwrap();
            head
        });
        (Server::new("127.0.0.1", port), handle)
    }

    #[test]
    fn test_new_connection_is_closed() {
        let conn = Connection::new(Server::new("127.0.0.1", 9200), settings(), Codec::default());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.is_open());
        assert_eq!(conn.server(), &Server::new("127.0.0.1", 9200));
    }

    #[test]
    fn test_open_dead_server_is_connect_error() {
        let server = dead_server();
        let mut conn = Connection::new(server.clone(), settings(), Codec::default());
        let err = conn.open().unwrap_err();
        match err {
            SearchwireError::Connect { server: s, .. } => assert_eq!(s, server.to_string()),
            other => panic!("expected Connect error, got {:?}", other),
        }
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_unresolvable_host_is_connect_error() {
        let mut conn = Connection::new(
            Server::new("no-such-host.invalid", 9200),
            settings(),
            Codec::default(),
        );
        assert!(matches!(conn.open(), Err(SearchwireError::Connect { .. })));
    }

    #[test]
    fn test_send_on_closed_connection_is_transport_error() {
        let mut conn = Connection::new(dead_server(), settings(), Codec::default());
        let err = conn.send(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, SearchwireError::Transport(_)));
        let err = conn.receive(Method::Get).unwrap_err();
        assert!(matches!(err, SearchwireError::Transport(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut conn = Connection::new(Server::new("127.0.0.1", port), settings(), Codec::default());

        conn.open().unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);

        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_twice_is_noop() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut conn = Connection::new(Server::new("127.0.0.1", port), settings(), Codec::default());
        conn.open().unwrap();
        conn.open().unwrap();
        assert!(conn.is_open());
    }

    #[test]
    fn test_transmit_http_exchange() {
        let (server, handle) = one_shot_http(
            "HTTP/1.1 200 OK\r\nContent-Length: 36\r\n\r\n{\"ok\":true,\"_index\":\"idx\",\"_id\":\"1\"}",
        );
        let mut conn = Connection::new(server, settings(), Codec::for_protocol(WireProtocol::Http));
        conn.open().unwrap();

        let request = RestRequest::new(Method::Post, "/idx/type/1").with_body(r#"{"f":"v"}"#);
        let response = conn.transmit(&request).unwrap();
        conn.close();

        assert_eq!(response.status, Status::Ok);
        assert_eq!(
            response.body_str(),
            Some(r#"{"ok":true,"_index":"idx","_id":"1"}"#)
        );

        let seen = handle.join().unwrap();
        assert!(seen.starts_with("POST /idx/type/1 HTTP/1.1\r\n"));
        assert!(seen.ends_with(r#"{"f":"v"}"#));
    }

    #[test]
    fn test_transmit_framed_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let payload = FramedCodec::read_frame(&mut stream).unwrap();
            let frame = FramedCodec::decode_request(&payload).unwrap();
            let reply = FramedCodec::encode_response(&ResponseFrame {
                status: 200,
                body: Some(format!(r#"{{"uri":"{}"}}"#, frame.uri)),
            })
            .unwrap();
            stream.write_all(&reply).unwrap();
            frame
        });

        let mut conn = Connection::new(
            Server::new("127.0.0.1", port),
            settings(),
            Codec::for_protocol(WireProtocol::Framed),
        );
        conn.open().unwrap();
        let response = conn
            .transmit(&RestRequest::new(Method::Get, "/idx/_count?q=a"))
            .unwrap();

        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.body_str(), Some(r#"{"uri":"/idx/_count?q=a"}"#));

        let frame = handle.join().unwrap();
        assert_eq!(frame.method, Method::Get);
    }

    #[test]
    fn test_read_timeout_faults_connection() {
        // Accepts but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(600));
            drop(stream);
        });

        let settings = SocketSettings::default()
            .with_connect_timeout(Duration::from_millis(500))
            .with_io_timeout(Duration::from_millis(100));
        let mut conn = Connection::new(Server::new("127.0.0.1", port), settings, Codec::default());
        conn.open().unwrap();

        let err = conn.transmit(&RestRequest::new(Method::Get, "/")).unwrap_err();
        match err {
            SearchwireError::Transport(msg) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("expected Transport error, got {:?}", other),
        }
        assert_eq!(conn.state(), ConnectionState::Faulted);

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        handle.join().unwrap();
    }

    #[test]
    fn test_peer_hangup_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 16];
            let _ = stream.read(&mut buf);
        });

        let mut conn = Connection::new(
            Server::new("127.0.0.1", port),
            settings(),
            Codec::for_protocol(WireProtocol::Framed),
        );
        conn.open().unwrap();
        let err = conn.transmit(&RestRequest::new(Method::Get, "/")).unwrap_err();
        assert!(matches!(err, SearchwireError::Transport(_)));
        assert_eq!(conn.state(), ConnectionState::Faulted);
        handle.join().unwrap();
    }
}
