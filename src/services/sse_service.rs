use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::state::{SharedState, game::GameId};

/// Event name carried by every pushed snapshot.
const GAME_UPDATE_EVENT: &str = "game-update";

/// Subscribe to a game and expose its updates as an SSE response.
///
/// The stream ends when the observer is evicted, so the client reconnects and
/// receives a fresh snapshot.
pub async fn game_stream(
    state: SharedState,
    game_id: GameId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (observer, mut updates) = state.broadcaster().observer();
    let observer_id = observer.id();
    state.sessions().subscribe(&game_id, observer).await;
    info!(game_id = %game_id, observer = %observer_id, "SSE observer connected");

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads observer updates and pushes them into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                update = updates.recv() => {
                    let Some(update) = update else {
                        debug!(game_id = %game_id, observer = %observer_id, "SSE observer evicted");
                        break;
                    };
                    let event = Event::default()
                        .event(GAME_UPDATE_EVENT)
                        .data(update.payload());
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        state.sessions().unsubscribe(&game_id, observer_id);
        info!(game_id = %game_id, observer = %observer_id, "SSE observer disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
