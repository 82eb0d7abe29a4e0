//! Tests for the receiver handle and settlement semantics.

use super::*;
use crate::config::ConnectionConfig;
use crate::message::Message;
use crate::transport::InMemoryTransport;

fn context_with_transport(transport: Arc<InMemoryTransport>) -> Arc<ConnectionContext> {
    Arc::new(ConnectionContext::new(
        ConnectionConfig::for_namespace("unit.test.bus"),
        transport,
        None,
    ))
}

fn receiver(context: &Arc<ConnectionContext>, path: &str, mode: ReceiveMode) -> Receiver {
    Receiver::new(
        Arc::clone(context),
        EntityPath::new(path).unwrap(),
        mode,
    )
}

async fn seed(context: &Arc<ConnectionContext>, path: &str, body: &'static str) {
    let connection = context.ensure_connected().await.unwrap();
    connection
        .send(&EntityPath::new(path).unwrap(), vec![Message::new(body)])
        .await
        .unwrap();
}

fn short() -> Duration {
    Duration::milliseconds(50)
}

// ============================================================================
// Receive
// ============================================================================

#[tokio::test]
async fn test_receive_returns_seeded_message() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    seed(&context, "orders", "payload").await;
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);

    let message = receiver.receive(short()).await.unwrap();

    let message = message.expect("should receive the seeded message");
    assert_eq!(&message.body[..], b"payload");
}

#[tokio::test]
async fn test_receive_from_empty_entity_returns_none() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);

    let message = receiver.receive(short()).await.unwrap();

    assert!(message.is_none());
}

#[tokio::test]
async fn test_receiver_connects_lazily_on_first_receive() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(Arc::clone(&transport));
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);
    assert_eq!(transport.connect_count(), 0, "construction must not connect");

    receiver.receive(short()).await.unwrap();

    assert_eq!(transport.connect_count(), 1);
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn test_complete_settles_peek_locked_message() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    seed(&context, "orders", "payload").await;
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);

    let message = receiver.receive(short()).await.unwrap().unwrap();
    receiver.complete(&message).await.unwrap();

    let again = receiver.receive(short()).await.unwrap();
    assert!(again.is_none(), "completed message must not be re-received");
}

#[tokio::test]
async fn test_abandon_makes_message_available_again() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    seed(&context, "orders", "payload").await;
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);

    let first = receiver.receive(short()).await.unwrap().unwrap();
    receiver.abandon(&first).await.unwrap();

    let second = receiver.receive(short()).await.unwrap().unwrap();
    assert_eq!(second.delivery_count, 2);
}

#[tokio::test]
async fn test_dead_letter_is_readable_through_sub_queue_receiver() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    seed(&context, "orders", "poison").await;
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);

    let message = receiver.receive(short()).await.unwrap().unwrap();
    receiver
        .dead_letter(&message, Some("cannot parse".to_string()))
        .await
        .unwrap();

    // A receiver addressed at base + dead-letter suffix sees the message
    let dead_letter_receiver = Receiver::new(
        Arc::clone(&context),
        EntityPath::new("orders").unwrap().with_sub_queue(SubQueue::DeadLetter),
        ReceiveMode::PeekLock,
    );
    let moved = dead_letter_receiver.receive(short()).await.unwrap().unwrap();
    assert_eq!(&moved.body[..], b"poison");
}

#[tokio::test]
async fn test_settlement_is_rejected_in_receive_and_delete_mode() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    seed(&context, "orders", "payload").await;
    let receiver = receiver(&context, "orders", ReceiveMode::ReceiveAndDelete);

    let message = receiver.receive(short()).await.unwrap().unwrap();
    let result = receiver.complete(&message).await;

    match result {
        Err(BusError::InvalidArgument { value, .. }) => {
            assert_eq!(value, "receiveAndDelete");
        }
        other => panic!("Expected InvalidArgument, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_receive_after_context_close_fails() {
    let transport = Arc::new(InMemoryTransport::new());
    let context = context_with_transport(transport);
    let receiver = receiver(&context, "orders", ReceiveMode::PeekLock);

    context.close().await.unwrap();
    let result = receiver.receive(short()).await;

    assert!(matches!(result, Err(BusError::ClientClosed)));
}
