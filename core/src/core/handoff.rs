// stageline/src/core/handoff.rs

//! Single-producer/single-consumer rendezvous channel connecting two adjacent stages.
//!
//! A `send` completes only after the receiving stage has taken the value, so a
//! stage can never run more than one item ahead of its downstream neighbour.
//! Internally a one-slot `mpsc` carries the value together with a `oneshot`
//! acknowledgement that the receiver fires when it takes the value.
//!
//! Dropping the [`HandoffSender`] closes the channel: the receiver drains
//! nothing further and `recv` returns `None`.

use crate::error::HandoffClosed;
use tokio::sync::{mpsc, oneshot};

struct Parcel<T> {
  item: T,
  taken: oneshot::Sender<()>,
}

/// Sending half of a hand-off channel. Not `Clone`: each channel has exactly one writer.
pub struct HandoffSender<T> {
  slot: mpsc::Sender<Parcel<T>>,
}

/// Receiving half of a hand-off channel.
pub struct HandoffReceiver<T> {
  slot: mpsc::Receiver<Parcel<T>>,
}

/// Creates a connected hand-off pair.
pub fn channel<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
  let (tx, rx) = mpsc::channel(1);
  (HandoffSender { slot: tx }, HandoffReceiver { slot: rx })
}

/// A value queued by [`HandoffSender::enqueue`] that the receiver may not
/// have taken yet.
#[derive(Debug)]
pub struct Delivery {
  taken: oneshot::Receiver<()>,
}

impl Delivery {
  /// Waits until the receiver has taken the value.
  pub async fn taken(&mut self) -> Result<(), HandoffClosed> {
    // Receiver dropped with our parcel still queued.
    (&mut self.taken).await.map_err(|_| HandoffClosed)
  }

  /// Withdraws the value unless the receiver has already taken it.
  ///
  /// Returns `true` when the value was taken before the withdrawal; in that
  /// case the hand-off happened and cannot be undone. Otherwise the receiver
  /// is guaranteed to discard it.
  pub fn withdraw(mut self) -> bool {
    self.taken.close();
    self.taken.try_recv().is_ok()
  }
}

impl<T> HandoffSender<T> {
  /// Hands `item` to the receiver and waits until it has been taken.
  ///
  /// Cancel safe in the sense that matters to a pipeline: if this future is
  /// dropped before the receiver took the value, the receiver will discard it
  /// instead of delivering it.
  pub async fn send(&self, item: T) -> Result<(), HandoffClosed> {
    self.enqueue(item).await?.taken().await
  }

  /// Queues `item` for the receiver without waiting for it to be taken.
  pub async fn enqueue(&self, item: T) -> Result<Delivery, HandoffClosed> {
    let (taken_tx, taken_rx) = oneshot::channel();
    self
      .slot
      .send(Parcel { item, taken: taken_tx })
      .await
      .map_err(|_| HandoffClosed)?;
    Ok(Delivery { taken: taken_rx })
  }

  /// True once the receiving half has been dropped.
  pub fn is_closed(&self) -> bool {
    self.slot.is_closed()
  }
}

impl<T> HandoffReceiver<T> {
  /// Takes the next value. Returns `None` once the sender is gone and nothing
  /// deliverable remains.
  ///
  /// Cancel safe: if this future is dropped, no value has been taken.
  pub async fn recv(&mut self) -> Option<T> {
    loop {
      let parcel = self.slot.recv().await?;
      if parcel.taken.send(()).is_ok() {
        return Some(parcel.item);
      }
      // The sender abandoned this value mid-send.
    }
  }
}

impl<T> std::fmt::Debug for HandoffSender<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandoffSender").field("closed", &self.is_closed()).finish()
  }
}

impl<T> std::fmt::Debug for HandoffReceiver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandoffReceiver").finish_non_exhaustive()
  }
}
