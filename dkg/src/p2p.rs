//! Exchange messages with other nodes of the committee.
//!
//! The transport is assumed to authenticate senders and to deliver messages in order
//! between one sender and one receiver on the same channel.

use crate::Address;
use bytes::Bytes;
use std::{error::Error as StdError, fmt::Debug, future::Future};

/// Tuple representing a message received from a given address.
pub type Message = (Address, Bytes);

/// Channel to send messages over.
pub type Channel = u32;

/// Enum indicating the set of recipients to send a message to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipients {
    All,
    Some(Vec<Address>),
    One(Address),
}

/// Interface for sending messages to a set of recipients.
pub trait Sender: Clone + Debug + Send + Sync + 'static {
    /// Error that can occur when sending a message.
    type Error: Debug + StdError + Send + Sync;

    /// Send a message to a set of recipients.
    ///
    /// Returns the recipients the message was handed to. A recipient missing from the
    /// returned list did not receive the message.
    fn send(
        &mut self,
        recipients: Recipients,
        message: Bytes,
    ) -> impl Future<Output = Result<Vec<Address>, Self::Error>> + Send;
}

/// Interface for receiving messages from arbitrary recipients.
pub trait Receiver: Debug + Send + 'static {
    /// Error that can occur when receiving a message.
    type Error: Debug + StdError + Send + Sync;

    /// Receive a message from an arbitrary recipient.
    fn recv(&mut self) -> impl Future<Output = Result<Message, Self::Error>> + Send;
}
