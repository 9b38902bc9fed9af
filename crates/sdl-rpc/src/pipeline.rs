//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Per-peer ingress queues feeding the router."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::sync::Arc;

use sdl_schema::Interface;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::router::ProtocolRouter;
use crate::types::Envelope;

/// Counts reported by the workers once their queues are drained.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub mobile_processed: u64,
    pub hmi_processed: u64,
}

/// Two FIFO queues, one per peer, each drained by a single worker task.
///
/// Enqueueing never blocks and may happen from any thread. Messages from one
/// peer are routed strictly in arrival order; the two peers run concurrently.
pub struct IngressPipelines {
    router: Arc<ProtocolRouter>,
    mobile_tx: UnboundedSender<Envelope>,
    hmi_tx: UnboundedSender<Envelope>,
    mobile_worker: JoinHandle<u64>,
    hmi_worker: JoinHandle<u64>,
}

impl IngressPipelines {
    /// Spawn both workers on the current tokio runtime.
    pub fn spawn(router: Arc<ProtocolRouter>) -> Self {
        let (mobile_tx, mobile_rx) = mpsc::unbounded_channel();
        let (hmi_tx, hmi_rx) = mpsc::unbounded_channel();
        let mobile_worker = tokio::spawn(run_worker(Interface::Mobile, router.clone(), mobile_rx));
        let hmi_worker = tokio::spawn(run_worker(Interface::Hmi, router.clone(), hmi_rx));
        Self {
            router,
            mobile_tx,
            hmi_tx,
            mobile_worker,
            hmi_worker,
        }
    }

    /// Queue a mobile envelope. Returns `false` when it was filtered out.
    ///
    /// Frames outside the RPC and bulk services, and anything arriving while
    /// low voltage is active, never reach the queue.
    pub fn enqueue_from_mobile(&self, envelope: Envelope) -> bool {
        if self.router.liveness().is_low_voltage() {
            error!("low voltage is active, discarding mobile message");
            return false;
        }
        if !envelope.service_type.carries_rpc() {
            trace!(
                service_type = envelope.service_type.as_str(),
                "skipping message outside the RPC services"
            );
            return false;
        }
        debug!(connection_key = envelope.connection_key, "posting mobile message");
        self.mobile_tx.send(envelope).is_ok()
    }

    /// Queue an HMI envelope.
    pub fn enqueue_from_hmi(&self, envelope: Envelope) -> bool {
        self.hmi_tx.send(envelope).is_ok()
    }

    /// Close both queues and wait until everything already queued is routed.
    pub async fn shutdown(self) -> PipelineStats {
        let Self {
            mobile_tx,
            hmi_tx,
            mobile_worker,
            hmi_worker,
            ..
        } = self;
        drop(mobile_tx);
        drop(hmi_tx);
        let stats = PipelineStats {
            mobile_processed: join_worker(Interface::Mobile, mobile_worker).await,
            hmi_processed: join_worker(Interface::Hmi, hmi_worker).await,
        };
        info!(
            mobile = stats.mobile_processed,
            hmi = stats.hmi_processed,
            "ingress pipelines drained"
        );
        stats
    }
}

async fn run_worker(
    peer: Interface,
    router: Arc<ProtocolRouter>,
    mut queue: UnboundedReceiver<Envelope>,
) -> u64 {
    let mut processed = 0u64;
    while let Some(envelope) = queue.recv().await {
        let outcome = match peer {
            Interface::Mobile => router.route_from_mobile(&envelope),
            Interface::Hmi => router.route_from_hmi(&envelope),
        };
        trace!(peer = %peer, ?outcome, "message routed");
        processed += 1;
    }
    processed
}

async fn join_worker(peer: Interface, worker: JoinHandle<u64>) -> u64 {
    match worker.await {
        Ok(processed) => processed,
        Err(err) => {
            error!(peer = %peer, error = %err, "pipeline worker failed");
            0
        }
    }
}
