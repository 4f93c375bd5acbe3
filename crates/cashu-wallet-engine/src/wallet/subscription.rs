//! NUT-17 websocket subscriptions
//!
//! One connection per subscription: subscribe on connect, forward matching
//! notifications, send `unsubscribe` and close on the way out. Callers fall
//! back to the polling worker queue when the socket cannot be set up.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::mint_url::MintUrl;
use crate::nuts::nut17::{Params, WsMessageOrResponse, WsRequest};
use crate::nuts::NotificationPayload;
use crate::Error;

/// A live subscription; dropping it without [`unsubscribe`] leaves the
/// socket to die with the reader task.
///
/// [`unsubscribe`]: ActiveSubscription::unsubscribe
#[derive(Debug)]
pub struct ActiveSubscription {
    /// Subscription id
    pub sub_id: String,
    receiver: mpsc::Receiver<NotificationPayload>,
    ctl: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ActiveSubscription {
    /// Wait for the next notification; `None` when the connection closed
    pub async fn recv(&mut self) -> Option<NotificationPayload> {
        self.receiver.recv().await
    }

    /// Unsubscribe and close the connection
    pub async fn unsubscribe(self) {
        let _ = self.ctl.send(()).await;
        let _ = self.task.await;
    }
}

/// Open a websocket to the mint and subscribe with `params`
pub async fn subscribe_ws(
    mint_url: &MintUrl,
    params: Params,
) -> Result<ActiveSubscription, Error> {
    let mut url = mint_url.join_paths(&["v1", "ws"])?;

    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| Error::Custom("Could not set ws scheme".to_string()))?;

    tracing::debug!("Connecting to {}", url);

    let (ws_stream, _) = connect_async(url.to_string())
        .await
        .map_err(|err| Error::Custom(format!("WebSocket connect failed: {err}")))?;

    let (mut write, mut read) = ws_stream.split();

    let sub_id = params.id.clone();
    let request = serde_json::to_string(&WsRequest::subscribe(&params, 1))?;
    write
        .send(Message::Text(request.into()))
        .await
        .map_err(|err| Error::Custom(format!("WebSocket send failed: {err}")))?;

    let (notify_tx, notify_rx) = mpsc::channel(16);
    let (ctl_tx, mut ctl_rx) = mpsc::channel::<()>(1);

    let id = sub_id.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ctl_rx.recv() => {
                    let unsub = WsRequest::unsubscribe(&id, 2);
                    if let Ok(frame) = serde_json::to_string(&unsub) {
                        let _ = write.send(Message::Text(frame.into())).await;
                    }
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            tracing::debug!("WebSocket read error: {err}");
                            break;
                        }
                        None => break,
                    };

                    match serde_json::from_str::<WsMessageOrResponse>(&text) {
                        Ok(WsMessageOrResponse::Notification(notification)) => {
                            if notification.params.sub_id != id {
                                continue;
                            }
                            if notify_tx.send(notification.params.payload).await.is_err() {
                                break;
                            }
                        }
                        Ok(WsMessageOrResponse::Response(response)) => {
                            tracing::debug!("Subscription ack: {:?}", response);
                        }
                        Ok(WsMessageOrResponse::ErrorResponse(error)) => {
                            tracing::warn!("Subscription error: {}", error.error.message);
                            break;
                        }
                        Err(_) => continue,
                    }
                }
            }
        }
    });

    Ok(ActiveSubscription {
        sub_id,
        receiver: notify_rx,
        ctl: ctl_tx,
        task,
    })
}
