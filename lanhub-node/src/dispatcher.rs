//! Routes delivered records to the registered handlers.

use crate::handler::{ConnectionHandler, ReceiveHandler, Responder};
use lanhub_core::{CONNECTION_EVENT_TAG, ConnectionEvent, Record};

/// Single-slot handler registry.
///
/// Records carrying [`CONNECTION_EVENT_TAG`] go to the connection handler,
/// everything else to the receive handler. Registering again replaces the
/// previous handler.
#[derive(Default)]
pub struct Dispatcher {
    receive: Option<Box<dyn ReceiveHandler>>,
    connection: Option<Box<dyn ConnectionHandler>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the receive handler.
    pub fn set_receive<H: ReceiveHandler + 'static>(&mut self, handler: H) {
        self.receive = Some(Box::new(handler));
    }

    /// Sets the connection handler.
    pub fn set_connection<H: ConnectionHandler + 'static>(&mut self, handler: H) {
        self.connection = Some(Box::new(handler));
    }

    /// Returns true if a receive handler is registered.
    #[must_use]
    pub fn has_receive(&self) -> bool {
        self.receive.is_some()
    }

    /// Returns true if a connection handler is registered.
    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Hands one record to the matching handler.
    pub fn dispatch(&mut self, record: &Record, responder: &mut dyn Responder) {
        if record.header.type_tag == CONNECTION_EVENT_TAG {
            match ConnectionEvent::decode(&record.payload) {
                Ok(event) => {
                    if let Some(handler) = self.connection.as_mut() {
                        handler.on_connection(event, responder);
                    }
                }
                Err(e) => tracing::warn!("Dropping malformed connection event: {}", e),
            }
            return;
        }

        match self.receive.as_mut() {
            Some(handler) => handler.on_receive(&record.header, &record.payload, responder),
            None => tracing::trace!(
                "No receive handler for tag={:#010x} from {}",
                record.header.type_tag,
                record.header.from
            ),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("receive", &self.has_receive())
            .field("connection", &self.has_connection())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use bytes::Bytes;
    use lanhub_core::{ConnectStatus, PeerId, RecordHeader, type_tag};
    use std::cell::RefCell;
    use std::rc::Rc;

    const CHAT: u32 = type_tag("chat");

    #[derive(Default)]
    struct MockResponder {
        sent: Vec<(PeerId, u32, Vec<u8>)>,
    }

    impl Responder for MockResponder {
        fn send(&mut self, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
            self.sent.push((PeerId::BROADCAST, type_tag, payload.to_vec()));
            Ok(())
        }

        fn send_to(&mut self, to: PeerId, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
            self.sent.push((to, type_tag, payload.to_vec()));
            Ok(())
        }

        fn self_id(&self) -> PeerId {
            PeerId::HUB
        }

        fn is_server(&self) -> bool {
            true
        }
    }

    fn event_record(event: ConnectionEvent) -> Record {
        Record::new(
            CONNECTION_EVENT_TAG,
            PeerId::HUB,
            PeerId::BROADCAST,
            Bytes::copy_from_slice(&event.encode()),
        )
    }

    #[test]
    fn test_dispatcher_new() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.has_receive());
        assert!(!dispatcher.has_connection());
    }

    #[test]
    fn test_dispatch_without_handlers() {
        let mut dispatcher = Dispatcher::new();
        let mut responder = MockResponder::default();
        let record = Record::new(CHAT, PeerId::new(1), PeerId::BROADCAST, Bytes::from_static(b"hi"));

        dispatcher.dispatch(&record, &mut responder);
        dispatcher.dispatch(&event_record(ConnectionEvent::joined(PeerId::new(1))), &mut responder);
        assert!(responder.sent.is_empty());
    }

    #[test]
    fn test_dispatch_routes_by_tag() {
        let mut dispatcher = Dispatcher::new();
        let received = Rc::new(RefCell::new(Vec::new()));
        let events = Rc::new(RefCell::new(Vec::new()));

        let sink = received.clone();
        dispatcher.set_receive(move |header: &RecordHeader, payload: &[u8], _: &mut dyn Responder| {
            sink.borrow_mut().push((header.from, payload.to_vec()));
        });
        let sink = events.clone();
        dispatcher.set_connection(move |event: ConnectionEvent, _: &mut dyn Responder| {
            sink.borrow_mut().push(event);
        });

        let mut responder = MockResponder::default();
        let record = Record::new(CHAT, PeerId::new(2), PeerId::BROADCAST, Bytes::from_static(b"hi"));
        dispatcher.dispatch(&record, &mut responder);
        dispatcher.dispatch(&event_record(ConnectionEvent::left(PeerId::new(2))), &mut responder);

        assert_eq!(*received.borrow(), vec![(PeerId::new(2), b"hi".to_vec())]);
        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].status, ConnectStatus::Left);
        assert_eq!(events.borrow()[0].id, PeerId::new(2));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut dispatcher = Dispatcher::new();
        let hits = Rc::new(RefCell::new((0, 0)));

        let first = hits.clone();
        dispatcher.set_receive(move |_: &RecordHeader, _: &[u8], _: &mut dyn Responder| {
            first.borrow_mut().0 += 1;
        });
        let second = hits.clone();
        dispatcher.set_receive(move |_: &RecordHeader, _: &[u8], _: &mut dyn Responder| {
            second.borrow_mut().1 += 1;
        });

        let mut responder = MockResponder::default();
        let record = Record::new(CHAT, PeerId::new(1), PeerId::HUB, Bytes::new());
        dispatcher.dispatch(&record, &mut responder);

        assert_eq!(*hits.borrow(), (0, 1));
    }

    #[test]
    fn test_handler_can_reply() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_receive(|header: &RecordHeader, payload: &[u8], responder: &mut dyn Responder| {
            responder.send_to(header.from, header.type_tag, payload).unwrap();
        });

        let mut responder = MockResponder::default();
        let record = Record::new(CHAT, PeerId::new(4), PeerId::HUB, Bytes::from_static(b"ping"));
        dispatcher.dispatch(&record, &mut responder);

        assert_eq!(responder.sent, vec![(PeerId::new(4), CHAT, b"ping".to_vec())]);
    }

    #[test]
    fn test_malformed_event_is_dropped() {
        let mut dispatcher = Dispatcher::new();
        let events = Rc::new(RefCell::new(0));
        let sink = events.clone();
        dispatcher.set_connection(move |_: ConnectionEvent, _: &mut dyn Responder| {
            *sink.borrow_mut() += 1;
        });

        let mut responder = MockResponder::default();
        let record = Record::new(
            CONNECTION_EVENT_TAG,
            PeerId::HUB,
            PeerId::BROADCAST,
            Bytes::from_static(&[1, 0]),
        );
        dispatcher.dispatch(&record, &mut responder);
        assert_eq!(*events.borrow(), 0);
    }
}
