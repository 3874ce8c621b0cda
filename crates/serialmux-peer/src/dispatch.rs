//! Frame dispatch to subscriber callbacks.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serialmux_frame::{ChannelId, Frame};
use tracing::{trace, warn};

use crate::negotiation::SubscriptionTable;
use crate::registry::ChannelRegistry;

/// Error a subscriber may return to report that it could not handle a payload.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of subscriber callbacks.
pub type SubscriberResult = std::result::Result<(), SubscriberError>;

/// Boxed subscriber callback.
pub type Subscriber = Box<dyn FnMut(&[u8]) -> SubscriberResult + Send>;

/// A subscriber that returned an error or panicked while handling a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    /// Channel the frame arrived on.
    pub channel: ChannelId,
    /// Error message or panic payload.
    pub reason: String,
    /// True if the callback panicked rather than returning an error.
    pub panicked: bool,
}

impl fmt::Display for SubscriberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.panicked { "panicked" } else { "failed" };
        write!(f, "subscriber on channel {} {kind}: {}", self.channel, self.reason)
    }
}

/// Outcome of dispatching one data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A subscriber handled the payload.
    Delivered,
    /// No subscriber exists for the channel.
    Dropped,
    /// The subscriber failed; the frame is consumed regardless.
    Failed(SubscriberFailure),
}

/// Routes data frames to the callback registered for their channel.
///
/// Remote routes bound through subscription negotiation take precedence over
/// local registry subscribers for the same identifier.
pub struct Dispatcher<'a> {
    registry: &'a mut ChannelRegistry,
    subscriptions: &'a mut SubscriptionTable,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a mut ChannelRegistry, subscriptions: &'a mut SubscriptionTable) -> Self {
        Self {
            registry,
            subscriptions,
        }
    }

    /// Deliver a frame.
    pub fn on_frame(&mut self, frame: &Frame) -> Delivery {
        let channel = frame.channel;
        let subscriber = match self.subscriptions.route_mut(channel) {
            Some(subscriber) => subscriber,
            None => match self.registry.subscriber_mut(channel) {
                Some(subscriber) => subscriber,
                None => {
                    trace!(channel, len = frame.payload.len(), "no subscriber; frame dropped");
                    return Delivery::Dropped;
                }
            },
        };

        match invoke(subscriber, channel, &frame.payload) {
            Ok(()) => {
                trace!(channel, len = frame.payload.len(), "frame dispatched");
                Delivery::Delivered
            }
            Err(failure) => {
                warn!(
                    channel,
                    panicked = failure.panicked,
                    reason = %failure.reason,
                    "subscriber failed"
                );
                Delivery::Failed(failure)
            }
        }
    }
}

fn invoke(
    subscriber: &mut Subscriber,
    channel: ChannelId,
    payload: &[u8],
) -> Result<(), SubscriberFailure> {
    match catch_unwind(AssertUnwindSafe(|| subscriber(payload))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(SubscriberFailure {
            channel,
            reason: err.to_string(),
            panicked: false,
        }),
        Err(panic) => Err(SubscriberFailure {
            channel,
            reason: panic_message(panic.as_ref()),
            panicked: true,
        }),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Vec<u8>>>>, Subscriber) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscriber: Subscriber = Box::new(move |payload: &[u8]| -> SubscriberResult {
            sink.lock().unwrap().push(payload.to_vec());
            Ok(())
        });
        (seen, subscriber)
    }

    #[test]
    fn local_subscriber_receives_payload() {
        let mut registry = ChannelRegistry::new(4, 255);
        let mut subscriptions = SubscriptionTable::new(4);
        let id = registry.register("TEMP", 8).unwrap();
        let (seen, subscriber) = recorder();
        registry.set_subscriber("TEMP", subscriber).unwrap();

        let delivery =
            Dispatcher::new(&mut registry, &mut subscriptions).on_frame(&Frame::new(id, &b"hot"[..]));
        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec![b"hot".to_vec()]);
    }

    #[test]
    fn unknown_channel_dropped() {
        let mut registry = ChannelRegistry::new(4, 255);
        let mut subscriptions = SubscriptionTable::new(4);
        registry.register("TEMP", 8).unwrap();

        let mut dispatcher = Dispatcher::new(&mut registry, &mut subscriptions);
        assert_eq!(dispatcher.on_frame(&Frame::new(1, &b"x"[..])), Delivery::Dropped);
        assert_eq!(dispatcher.on_frame(&Frame::new(9, &b"x"[..])), Delivery::Dropped);
    }

    #[test]
    fn remote_route_takes_precedence() {
        let mut registry = ChannelRegistry::new(4, 255);
        let mut subscriptions = SubscriptionTable::new(4);
        registry.register("LOCAL", 8).unwrap();
        let (local, local_sub) = recorder();
        registry.set_subscriber("LOCAL", local_sub).unwrap();

        let (remote, remote_sub) = recorder();
        subscriptions.request("REMOTE", remote_sub).unwrap();
        assert!(subscriptions.resolve(1, "REMOTE"));

        let delivery =
            Dispatcher::new(&mut registry, &mut subscriptions).on_frame(&Frame::new(1, &b"r"[..]));
        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(remote.lock().unwrap().len(), 1);
        assert!(local.lock().unwrap().is_empty());
    }

    #[test]
    fn error_and_panic_are_reported() {
        let mut registry = ChannelRegistry::new(4, 255);
        let mut subscriptions = SubscriptionTable::new(4);
        registry.register("ERR", 8).unwrap();
        registry.register("PANIC", 8).unwrap();
        registry
            .set_subscriber("ERR", Box::new(|_: &[u8]| -> SubscriberResult { Err("bad reading".into()) }))
            .unwrap();
        registry
            .set_subscriber("PANIC", Box::new(|_: &[u8]| -> SubscriberResult { panic!("sensor exploded") }))
            .unwrap();

        let mut dispatcher = Dispatcher::new(&mut registry, &mut subscriptions);
        let Delivery::Failed(err) = dispatcher.on_frame(&Frame::new(1, &b"a"[..])) else {
            panic!("expected failure");
        };
        assert_eq!(err.channel, 1);
        assert_eq!(err.reason, "bad reading");
        assert!(!err.panicked);

        let Delivery::Failed(panicked) = dispatcher.on_frame(&Frame::new(2, &b"b"[..])) else {
            panic!("expected failure");
        };
        assert_eq!(panicked.reason, "sensor exploded");
        assert!(panicked.panicked);
    }
}
