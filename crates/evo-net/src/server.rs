//! The accept loop and per-session read/write tasks. One task per session
//! owns that session's socket; the only state shared across sessions is
//! the pair of queues in [`SharedState`] and the base XML blob.

use crate::queue::{GenomeRequest, Queues, ScoreReport};
use evo_wire::{Command, DataFrame, Payload, RequestFrame};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

pub struct SharedState {
    pub xml: Vec<u8>,
    pub xml_md5: [u32; 4],
    pub evolve_identifier: u64,
    pub queues: Queues,
    next_session_id: AtomicU64,
}

impl SharedState {
    pub fn new(xml: Vec<u8>, evolve_identifier: u64) -> Self {
        let xml_md5 = DataFrame::md5_of(&xml);
        SharedState {
            xml,
            xml_md5,
            evolve_identifier,
            queues: Queues::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Runs the accept loop until `shutdown` is signalled true. Every accepted
/// connection gets its own spawned session task; the accept loop itself
/// never blocks on a session.
pub async fn serve(
    listener: TcpListener,
    shared: Arc<SharedState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let session_shared = shared.clone();
                let session_id = shared.next_session_id();
                tokio::spawn(async move {
                    if let Err(error) = handle_session(session_id, stream, addr, session_shared).await {
                        tracing::warn!(session_id, %addr, %error, "session ended with an I/O error");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("session server shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_session(
    session_id: u64,
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<SharedState>,
) -> std::io::Result<()> {
    tracing::debug!(session_id, %addr, "session opened");
    let (mut read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let prefix = evo_wire::encode_length_prefix(frame.len());
            if write_half.write_all(&prefix).await.is_err() {
                break;
            }
            if write_half.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        let mut prefix_buf = [0u8; evo_wire::LENGTH_PREFIX_LEN];
        if read_half.read_exact(&mut prefix_buf).await.is_err() {
            break;
        }
        let frame_len = evo_wire::decode_length_prefix(prefix_buf);
        let mut frame_buf = vec![0u8; frame_len];
        if read_half.read_exact(&mut frame_buf).await.is_err() {
            break;
        }

        let request = match RequestFrame::decode(&frame_buf) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(session_id, %error, "dropping malformed request frame");
                continue;
            }
        };

        match request.command {
            Command::RequestXml => {
                let frame = DataFrame {
                    evolve_identifier: shared.evolve_identifier,
                    sender_ip: request.sender_ip,
                    sender_port: request.sender_port,
                    run_id: request.run_id,
                    md5: shared.xml_md5,
                    payload: Payload::Xml(shared.xml.clone()),
                };
                let _ = tx.send(frame.encode());
            }
            Command::RequestGenome => {
                shared.queues.push_genome_request(GenomeRequest {
                    session_id,
                    sender_ip: request.sender_ip,
                    sender_port: request.sender_port,
                    reply: tx.clone(),
                });
            }
            Command::Score => {
                shared.queues.push_score(ScoreReport {
                    evolve_identifier: request.evolve_identifier,
                    run_id: request.run_id,
                    score: request.score,
                });
            }
        }
    }

    drop(tx);
    let _ = writer.await;
    tracing::debug!(session_id, "session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_wire::REQUEST_FRAME_LEN;
    use tokio::net::TcpStream as ClientStream;

    async fn connected_pair() -> (Arc<SharedState>, ClientStream, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(SharedState::new(b"<model/>".to_vec(), 42));
        let (tx, rx) = watch::channel(false);
        let serve_shared = shared.clone();
        tokio::spawn(async move {
            let _ = serve(listener, serve_shared, rx).await;
        });
        let client = ClientStream::connect(addr).await.unwrap();
        (shared, client, tx)
    }

    #[tokio::test]
    async fn request_xml_replies_with_the_base_blob_and_matching_md5() {
        let (shared, mut client, _shutdown) = connected_pair().await;

        let frame = RequestFrame {
            command: Command::RequestXml,
            evolve_identifier: 42,
            sender_ip: 0,
            sender_port: 0,
            run_id: 0,
            score: 0.0,
        };
        let encoded = frame.encode();
        client.write_all(&evo_wire::encode_length_prefix(encoded.len())).await.unwrap();
        client.write_all(&encoded).await.unwrap();

        let mut prefix = [0u8; evo_wire::LENGTH_PREFIX_LEN];
        client.read_exact(&mut prefix).await.unwrap();
        let len = evo_wire::decode_length_prefix(prefix);
        let mut body = vec![0u8; len];
        client.read_exact(&mut body).await.unwrap();

        let data = DataFrame::decode(&body).unwrap();
        assert_eq!(data.md5, shared.xml_md5);
        match data.payload {
            Payload::Xml(bytes) => assert_eq!(bytes, b"<model/>"),
            _ => panic!("expected xml payload"),
        }
    }

    #[tokio::test]
    async fn genome_request_lands_on_the_shared_queue() {
        let (shared, mut client, _shutdown) = connected_pair().await;

        let frame = RequestFrame {
            command: Command::RequestGenome,
            evolve_identifier: 42,
            sender_ip: 0,
            sender_port: 0,
            run_id: 0,
            score: 0.0,
        };
        let encoded = frame.encode();
        assert_eq!(encoded.len(), REQUEST_FRAME_LEN);
        client.write_all(&evo_wire::encode_length_prefix(encoded.len())).await.unwrap();
        client.write_all(&encoded).await.unwrap();

        for _ in 0..50 {
            if shared.queues.genome_requests_pending() == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("genome request never reached the queue");
    }
}
