use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::domains::envelope::{
    is_result_type, request_id_of, wire_type, ReplyEnvelope, RequestEnvelope, RequestKind,
};
use crate::services::dispatcher::{DispatchOutcome, Dispatcher, RequestContext};

pub struct RelayHandle {
    dispatcher: Arc<Dispatcher>,
    target: String,
    push_tx: mpsc::UnboundedSender<Value>,
    shutdown_tx: oneshot::Sender<()>,
}

impl RelayHandle {
    pub async fn start(
        dispatcher: Arc<Dispatcher>,
        origin: impl Into<String>,
        target: impl Into<String>,
        mut page_rx: mpsc::UnboundedReceiver<Value>,
        page_tx: mpsc::UnboundedSender<Value>,
    ) -> Self {
        let origin = origin.into();
        let target = target.into();
        let (push_tx, mut push_rx) = dispatcher.open_channel(&target).await;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let loop_dispatcher = dispatcher.clone();
        let loop_target = target.clone();
        tokio::spawn(async move {
            let dispatcher = loop_dispatcher;
            let target = loop_target;
            // A closed push channel only means the registration was replaced;
            // the page side keeps being served.
            let mut push_open = true;
            loop {
                tokio::select! {
                    inbound = page_rx.recv() => {
                        match inbound {
                            Some(value) => {
                                forward_request(&dispatcher, &origin, &target, &page_tx, value)
                                    .await;
                            }
                            None => break,
                        }
                    }
                    push = push_rx.recv(), if push_open => {
                        match push {
                            Some(value) => forward_push(&page_tx, value),
                            None => push_open = false,
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            dispatcher,
            target,
            push_tx,
            shutdown_tx,
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.dispatcher
            .close_channel(&self.target, &self.push_tx)
            .await;
    }
}

async fn forward_request(
    dispatcher: &Dispatcher,
    origin: &str,
    target: &str,
    page_tx: &mpsc::UnboundedSender<Value>,
    value: Value,
) {
    let Some(wire) = wire_type(&value) else {
        debug!("untyped message dropped at relay");
        return;
    };
    let Some(kind) = RequestKind::from_wire(wire) else {
        debug!(wire, "non-request message dropped at relay");
        return;
    };

    let request = match RequestEnvelope::from_value(&value) {
        Ok(request) => request,
        Err(err) => {
            if let Some(request_id) = request_id_of(&value) {
                send_reply(
                    page_tx,
                    ReplyEnvelope::response_err(kind, request_id, err.to_string()),
                );
            }
            return;
        }
    };

    let request_id = request.request_id.clone();
    let ctx = RequestContext {
        origin: origin.to_string(),
        target: target.to_string(),
    };
    match dispatcher.handle_request(request, ctx).await {
        Ok(DispatchOutcome::Completed(reply)) => send_reply(page_tx, reply),
        // The caller waits for the out-of-band Result.
        Ok(DispatchOutcome::Pending) => {}
        Err(err) => send_reply(
            page_tx,
            ReplyEnvelope::response_err(kind, &request_id, err.to_string()),
        ),
    }
}

fn forward_push(page_tx: &mpsc::UnboundedSender<Value>, value: Value) {
    let is_result = wire_type(&value).map(is_result_type).unwrap_or(false);
    if is_result {
        let _ = page_tx.send(value);
    } else {
        debug!("non-result push dropped at relay");
    }
}

fn send_reply(page_tx: &mpsc::UnboundedSender<Value>, reply: ReplyEnvelope) {
    match reply.to_value() {
        Ok(value) => {
            let _ = page_tx.send(value);
        }
        Err(err) => warn!(error = %err, "reply failed to serialize"),
    }
}
