#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_common::{Envelope, Signal, config::ServerTimeouts};
use courier_credentials::ClientHandle;
use courier_metrics::{Counter, Metrics};
use courier_ses::{BackendError, MailBackend, SendPipeline};
use courier_smtp::{Listener, SessionConfig};
use pretty_assertions::assert_eq;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::broadcast,
};

#[derive(Debug, Default)]
struct RecordingBackend {
    sent: Mutex<Vec<Envelope>>,
}

#[async_trait]
impl MailBackend for RecordingBackend {
    async fn send(&self, envelope: &Envelope) -> Result<(), BackendError> {
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

async fn exchange(reader: &mut BufReader<TcpStream>, line: &str) -> String {
    reader
        .get_mut()
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .unwrap();
    read(reader).await
}

async fn read(reader: &mut BufReader<TcpStream>) -> String {
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    reply.trim_end().to_string()
}

#[tokio::test]
async fn concurrent_sessions_and_graceful_shutdown() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let backend = ClientHandle::fixed(RecordingBackend::default());
    let config = SessionConfig {
        banner: Arc::from("relay.test"),
        timeouts: ServerTimeouts::default(),
        configuration_set: None,
    };

    let listener = Listener::bind(
        "127.0.0.1:0",
        config,
        SendPipeline::new(backend.clone(), metrics.clone()),
        metrics.clone(),
    )
    .await
    .unwrap();
    let address = listener.local_addr().unwrap();

    let (shutdown, signal) = broadcast::channel(1);
    let server = tokio::spawn(listener.serve(signal));

    let clients = (0..4)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = BufReader::new(TcpStream::connect(address).await.unwrap());
                assert_eq!(read(&mut client).await, "220 relay.test ESMTP courier");

                assert_eq!(exchange(&mut client, "HELO client.test").await, "250 relay.test");
                exchange(&mut client, &format!("MAIL FROM:<sender{i}@x.com>")).await;
                exchange(&mut client, "RCPT TO:<b@y.com>").await;
                exchange(&mut client, "DATA").await;
                assert_eq!(
                    exchange(&mut client, &format!("message {i}\r\n.")).await,
                    "250 2.0.0 Ok: queued"
                );
                client
            })
        })
        .collect::<Vec<_>>();

    let mut open = Vec::new();
    for client in clients {
        open.push(client.await.unwrap());
    }

    assert_eq!(metrics.value(Counter::SendSuccess), 4);
    assert_eq!(backend.current().sent.lock().unwrap().len(), 4);

    shutdown.send(Signal::Shutdown).unwrap();
    for client in &mut open {
        assert_eq!(
            read(client).await,
            "421 4.3.0 relay.test Service shutting down"
        );
    }

    server.await.unwrap().unwrap();
    assert!(TcpStream::connect(address).await.is_err());
}

#[tokio::test]
async fn bind_failure_is_an_error() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = occupied.local_addr().unwrap().to_string();
    let metrics = Arc::new(Metrics::new().unwrap());

    let result = Listener::bind(
        &address,
        SessionConfig {
            banner: Arc::from("relay.test"),
            timeouts: ServerTimeouts::default(),
            configuration_set: None,
        },
        SendPipeline::new(
            ClientHandle::fixed(RecordingBackend::default()),
            metrics.clone(),
        ),
        metrics,
    )
    .await;

    assert!(result.is_err());
}
