//! Ordered, asynchronous message channel to an isolated host.
//!
//! A transport endpoint carries JSON text frames in both directions. Frames
//! sent on one endpoint arrive at its peer in send order. Nothing is shared
//! between the two sides except the serialized text.

use crate::error::PreviewError;
use crate::protocol::MessageEnvelope;
use tokio::sync::mpsc;

/// One end of a bidirectional frame channel.
#[derive(Debug)]
pub struct Transport {
    sender: TransportSender,
    receiver: TransportReceiver,
}

/// Sending half of a transport endpoint.
#[derive(Debug, Clone)]
pub struct TransportSender {
    tx: mpsc::UnboundedSender<String>,
}

/// Receiving half of a transport endpoint.
#[derive(Debug)]
pub struct TransportReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl Transport {
    /// Creates two connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: TransportSender { tx: a_tx },
                receiver: TransportReceiver { rx: b_rx },
            },
            Self {
                sender: TransportSender { tx: b_tx },
                receiver: TransportReceiver { rx: a_rx },
            },
        )
    }

    /// Splits the endpoint so sending and receiving can live on different tasks.
    #[must_use]
    pub fn split(self) -> (TransportSender, TransportReceiver) {
        (self.sender, self.receiver)
    }

    /// Sends an envelope to the peer.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the peer has gone away.
    pub fn send(&self, envelope: &MessageEnvelope) -> Result<(), PreviewError> {
        self.sender.send(envelope)
    }

    /// Receives the next raw frame, or `None` once the peer is gone.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.receiver.recv_frame().await
    }
}

impl TransportSender {
    /// Sends an envelope to the peer.
    ///
    /// # Errors
    ///
    /// Returns a transport error if encoding fails or the peer has gone away.
    pub fn send(&self, envelope: &MessageEnvelope) -> Result<(), PreviewError> {
        self.send_frame(envelope.to_frame()?)
    }

    /// Sends an already encoded frame.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the peer has gone away.
    pub fn send_frame(&self, frame: String) -> Result<(), PreviewError> {
        self.tx
            .send(frame)
            .map_err(|_| PreviewError::transport("peer endpoint closed"))
    }

    /// Returns true once the peer's receiving half is dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl TransportReceiver {
    /// Receives the next raw frame, or `None` once the peer is gone.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Stops accepting frames; anything already queued can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RuntimeEvent;

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (host_side, mut guest_side) = Transport::pair();
        for n in 0..5u64 {
            host_side
                .send(&MessageEnvelope::event(&RuntimeEvent::FetchProgress {
                    remaining: n,
                }))
                .unwrap();
        }

        for n in 0..5u64 {
            let frame = guest_side.recv_frame().await.unwrap();
            let envelope = MessageEnvelope::from_frame(&frame).unwrap();
            assert_eq!(
                envelope.runtime_event().unwrap(),
                RuntimeEvent::FetchProgress { remaining: n }
            );
        }
    }

    #[tokio::test]
    async fn send_fails_after_peer_drops() {
        let (host_side, guest_side) = Transport::pair();
        drop(guest_side);
        let error = host_side.send(&MessageEnvelope::load()).unwrap_err();
        assert!(error.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn recv_ends_when_peer_drops() {
        let (host_side, mut guest_side) = Transport::pair();
        drop(host_side);
        assert!(guest_side.recv_frame().await.is_none());
    }
}
