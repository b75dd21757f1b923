//! Integration tests for the WebSocket transport over a real socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tandem_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    async fn bound() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn connect_client(
        addr: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_both_directions() {
        let (mut transport, addr) = bound().await;
        let accept = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let server = accept.await.expect("task should complete");
        assert!(server.id().into_inner() > 0);

        client
            .send(Message::Binary(b"hello".to_vec().into()))
            .await
            .expect("client send");
        let got = server.recv().await.expect("recv").expect("message");
        assert_eq!(got, b"hello");

        server.send(b"world").await.expect("server send");
        let reply = client.next().await.expect("frame").expect("ok");
        assert_eq!(&reply.into_data()[..], b"world");
    }

    #[tokio::test]
    async fn test_websocket_text_frames_are_delivered_as_bytes() {
        let (mut transport, addr) = bound().await;
        let accept = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let server = accept.await.expect("task should complete");

        client
            .send(Message::Text("{\"a\":1}".into()))
            .await
            .expect("client send");
        let got = server.recv().await.expect("recv").expect("message");
        assert_eq!(got, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending_does_not_block() {
        let (mut transport, addr) = bound().await;
        let accept = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let server = std::sync::Arc::new(accept.await.expect("task should complete"));

        let reader = std::sync::Arc::clone(&server);
        let pending = tokio::spawn(async move { reader.recv().await });

        tokio::time::timeout(Duration::from_secs(1), server.send(b"ping"))
            .await
            .expect("send must not wait for the pending recv")
            .expect("send ok");
        let reply = client.next().await.expect("frame").expect("ok");
        assert_eq!(&reply.into_data()[..], b"ping");

        client.close(None).await.expect("close");
        let closed = pending.await.expect("join").expect("recv ok");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_websocket_client_close_yields_none() {
        let (mut transport, addr) = bound().await;
        let accept = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let server = accept.await.expect("task should complete");

        client.close(None).await.expect("close");
        assert!(server.recv().await.expect("recv").is_none());
    }
}
