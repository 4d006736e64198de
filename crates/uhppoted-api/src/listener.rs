//! Passive listener for controller event notifications.
//!
//! Controllers configured with an event listener address push a 64-byte
//! status-shaped datagram for every new event. [`EventListener`] binds that
//! endpoint, decodes each datagram and fans it out over a
//! [`tokio::sync::broadcast`] channel. Malformed datagrams are logged and
//! dropped; the listener keeps running until it is shut down.
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use uhppoted_api::listener::EventListener;
//!
//! let listener = EventListener::bind("0.0.0.0:60001".parse()?, CancellationToken::new()).await?;
//! let mut rx = listener.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: event {}", event.controller, event.event_index());
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, PACKET_SIZE};
use crate::error::Error;
use crate::models::StatusResponse;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle to a running event listener.
pub struct EventListener {
    event_rx: broadcast::Receiver<Arc<StatusResponse>>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl EventListener {
    /// Bind `addr` and spawn the receive loop.
    ///
    /// The loop exits when `cancel` fires or [`shutdown`](Self::shutdown)
    /// is called.
    pub async fn bind(addr: SocketAddr, cancel: CancellationToken) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::ListenerBind {
                addr,
                reason: e.to_string(),
            })?;
        let local_addr = socket.local_addr()?;

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            listen_loop(socket, event_tx, task_cancel).await;
        });

        tracing::info!(%local_addr, "event listener started");
        Ok(Self {
            event_rx,
            local_addr,
            cancel,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a new receiver for decoded notifications.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StatusResponse>> {
        self.event_rx.resubscribe()
    }

    /// Stop the receive loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn listen_loop(
    socket: UdpSocket,
    event_tx: broadcast::Sender<Arc<StatusResponse>>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; PACKET_SIZE * 16];

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((len, from)) => {
                        let datagram = buf.get(..len).unwrap_or_default();
                        decode_and_broadcast(datagram, from, &event_tx);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "event listener receive failed");
                    }
                }
            }
        }
    }

    tracing::debug!("event listener exiting");
}

/// Decode one datagram and broadcast it. Decode errors are logged and dropped.
fn decode_and_broadcast(
    datagram: &[u8],
    from: SocketAddr,
    event_tx: &broadcast::Sender<Arc<StatusResponse>>,
) {
    match codec::decode_event_notification(datagram) {
        Ok(event) => {
            tracing::debug!(
                controller = event.controller,
                index = event.event_index(),
                %from,
                "event notification"
            );
            // No receivers is fine; the notification is simply dropped.
            let _ = event_tx.send(Arc::new(event));
        }
        Err(e) => {
            tracing::warn!(error = %e, %from, len = datagram.len(), "discarding malformed event datagram");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::{SOM, SOM_V6_62};

    fn addr() -> SocketAddr {
        "127.0.0.1:60001".parse().unwrap()
    }

    #[test]
    fn malformed_datagram_is_not_broadcast() {
        let (tx, mut rx) = broadcast::channel(4);
        decode_and_broadcast(&[SOM, 0x20, 0x00], addr(), &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn valid_notification_is_broadcast() {
        let (tx, mut rx) = broadcast::channel(4);
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = SOM_V6_62;
        packet[1] = 0x20;
        packet[4..8].copy_from_slice(&405_419_896u32.to_le_bytes());
        packet[8..12].copy_from_slice(&17u32.to_le_bytes());

        decode_and_broadcast(&packet, addr(), &tx);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.controller, 405_419_896);
        assert_eq!(event.event_index(), 17);
    }
}
