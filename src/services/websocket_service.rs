use std::fmt::Display;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    state::{SharedState, game::GameId},
};

/// Outbound frames a connection may queue besides game updates.
const CONTROL_BUFFER: usize = 8;

/// Handle the full lifecycle of one observer WebSocket.
///
/// The socket receives the current snapshot on connect and every later
/// update. It is closed when the observer falls too far behind.
pub async fn handle_socket(state: SharedState, game_id: GameId, socket: WebSocket) {
    let (sender, receiver) = socket.split();
    serve_observer(state, game_id, sender, receiver).await;
}

/// Observer loop over any frame sink and stream; [`handle_socket`] feeds it a split socket.
async fn serve_observer<W, R, E>(state: SharedState, game_id: GameId, mut sender: W, mut receiver: R)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(CONTROL_BUFFER);

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let (observer, mut updates) = state.broadcaster().observer();
    let observer_id = observer.id();
    state.sessions().subscribe(&game_id, observer).await;
    info!(game_id = %game_id, observer = %observer_id, "websocket observer connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else {
                    warn!(game_id = %game_id, observer = %observer_id, "observer evicted; closing websocket");
                    let _ = outbound_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "observer lagged; reconnect for a fresh snapshot".into(),
                        })))
                        .await;
                    break;
                };
                if outbound_tx.send(Message::Text(update.payload().into())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if !handle_client_message(&game_id, text.as_str(), &outbound_tx).await {
                        break;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = outbound_tx.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(game_id = %game_id, observer = %observer_id, "websocket closed by client");
                    let _ = outbound_tx.send(Message::Close(frame)).await;
                    break;
                }
                Some(Ok(Message::Binary(_) | Message::Pong(_))) => {}
                Some(Err(err)) => {
                    warn!(game_id = %game_id, error = %err, "websocket error");
                    break;
                }
                None => break,
            },
        }
    }

    state.sessions().unsubscribe(&game_id, observer_id);
    info!(game_id = %game_id, observer = %observer_id, "websocket observer disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// React to one client frame. Returns `false` once the writer is gone.
async fn handle_client_message(
    game_id: &GameId,
    text: &str,
    outbound_tx: &mpsc::Sender<Message>,
) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => send_message_to_websocket(outbound_tx, &ServerMessage::Pong).await,
        Ok(ClientMessage::Unknown) => {
            debug!(game_id = %game_id, payload = %text, "ignoring unknown message type");
            true
        }
        Err(err) => {
            warn!(game_id = %game_id, error = %err, "failed to parse websocket message");
            true
        }
    }
}

/// Serialize a payload and push it onto the connection's writer.
async fn send_message_to_websocket(tx: &mpsc::Sender<Message>, value: &ServerMessage) -> bool {
    match serde_json::to_string(value) {
        Ok(payload) => tx.send(Message::Text(payload.into())).await.is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize websocket message");
            true
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::Sender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::channel::mpsc as frames;
    use serde_json::Value;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        state::{
            AppState,
            game::{NewPlayer, TrainColor},
        },
    };

    type Inbound = frames::UnboundedSender<Result<Message, axum::Error>>;
    type Outbound = frames::UnboundedReceiver<Message>;

    async fn state_with_game(observer_buffer: usize) -> (SharedState, GameId) {
        let config = AppConfig {
            observer_buffer,
            ..AppConfig::default()
        };
        let state = AppState::with_store(config, Arc::new(MemoryGameStore::new()));
        let game_id = GameId::parse("SOCK01").unwrap();
        state
            .sessions()
            .create_game(game_id.clone(), None)
            .await
            .unwrap();
        (state, game_id)
    }

    fn connect(state: &SharedState, game_id: &GameId) -> (Inbound, Outbound, JoinHandle<()>) {
        let (inbound_tx, inbound_rx) = frames::unbounded();
        let (outbound_tx, outbound_rx) = frames::unbounded();
        let task = tokio::spawn(serve_observer(
            state.clone(),
            game_id.clone(),
            outbound_tx,
            inbound_rx,
        ));
        (inbound_tx, outbound_rx, task)
    }

    async fn next_json(outbound: &mut Outbound) -> Value {
        match outbound.next().await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    fn player(name: &str, train_color: TrainColor) -> NewPlayer {
        NewPlayer {
            name: name.into(),
            train_color,
            is_offline: false,
        }
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (tx, mut rx) = mpsc::channel(1);
        let game_id = GameId::parse("ABC123").unwrap();

        assert!(handle_client_message(&game_id, r#"{"type":"ping"}"#, &tx).await);

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a queued text frame");
        };
        let reply: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(reply, serde_json::json!({"type": "pong"}));
    }

    #[tokio::test]
    async fn unknown_and_malformed_frames_are_ignored() {
        let (tx, mut rx) = mpsc::channel(1);
        let game_id = GameId::parse("ABC123").unwrap();

        assert!(handle_client_message(&game_id, r#"{"type":"join-game"}"#, &tx).await);
        assert!(handle_client_message(&game_id, "not json", &tx).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connection_gets_snapshot_updates_and_pongs() {
        let (state, game_id) = state_with_game(16).await;
        let (inbound, mut outbound, task) = connect(&state, &game_id);

        let snapshot = next_json(&mut outbound).await;
        assert_eq!(snapshot["type"], "game-update");
        assert_eq!(snapshot["game"]["id"], "SOCK01");

        state
            .sessions()
            .add_player(&game_id, player("Ann", TrainColor::Red))
            .await
            .unwrap();
        let update = next_json(&mut outbound).await;
        assert_eq!(update["game"]["players"][0]["name"], "Ann");

        for frame in [r#"{"type":"join-game"}"#, "not json", r#"{"type":"ping"}"#] {
            inbound.unbounded_send(Ok(Message::Text(frame.into()))).unwrap();
        }
        assert_eq!(next_json(&mut outbound).await["type"], "pong");

        drop(inbound);
        task.await.unwrap();
        assert!(outbound.next().await.is_none());
        assert_eq!(state.broadcaster().observer_count(&game_id), 0);
    }

    #[tokio::test]
    async fn lagging_connection_is_closed_with_try_again_later() {
        let (state, game_id) = state_with_game(1).await;
        let (_inbound, mut outbound, task) = connect(&state, &game_id);
        next_json(&mut outbound).await;

        // The observer loop is parked on this single-threaded runtime, so the
        // second update finds its one-slot queue full.
        for (name, color) in [("Ann", TrainColor::Red), ("Bo", TrainColor::Blue)] {
            state
                .sessions()
                .add_player(&game_id, player(name, color))
                .await
                .unwrap();
        }

        let queued = next_json(&mut outbound).await;
        assert_eq!(queued["game"]["players"].as_array().unwrap().len(), 1);
        match outbound.next().await {
            Some(Message::Close(Some(frame))) => assert_eq!(frame.code, close_code::AGAIN),
            other => panic!("expected a close frame, got {other:?}"),
        }
        task.await.unwrap();
    }
}
