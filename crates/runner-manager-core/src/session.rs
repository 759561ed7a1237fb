use crate::projector::{project, Projection};
use crate::store::{MetricsStore, TopologyStore};
use crate::subscription::{SubscriptionAction, SubscriptionController, SubscriptionState};
use crate::wire::{decode_frame, FrameError, InboundEvent, OutboundFrame, DEFAULT_MAX_FRAME_BYTES};
use crate::Controller;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    MalformedFrame(#[from] FrameError),
    #[error("channel unavailable; frame dropped")]
    ChannelUnavailable,
    #[error("metrics frame for {runners} runners arrived without an active subscription")]
    StaleSubscriptionData { runners: usize },
}

// Implementations must not queue; a frame that cannot be written now is rejected.
pub trait FrameSink {
    fn send_text(&mut self, text: String) -> Result<(), SyncError>;
}

impl FrameSink for Vec<String> {
    fn send_text(&mut self, text: String) -> Result<(), SyncError> {
        self.push(text);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Topology { controllers: usize },
    Metrics { runners: usize },
    Ignored { event: String },
}

pub struct Session<S> {
    sink: S,
    open: bool,
    topology_request_pending: bool,
    max_frame_bytes: usize,
    topology: TopologyStore,
    metrics: MetricsStore,
    subscription: SubscriptionController,
}

impl<S: FrameSink> Session<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            open: false,
            topology_request_pending: true,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            topology: TopologyStore::default(),
            metrics: MetricsStore::default(),
            subscription: SubscriptionController::default(),
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn channel_opened(&mut self) {
        self.open = true;
        if self.topology_request_pending {
            self.topology_request_pending = false;
            if let Err(err) = self.request_topology() {
                warn!(event = "initial_topology_request_failed", error = %err);
            }
        }
    }

    // subscription survives; nothing is re-sent on reconnect
    pub fn channel_closed(&mut self) {
        self.open = false;
        if let Some(target) = self.subscription.target() {
            info!(event = "channel_closed_with_subscription", ctrl_id = %target);
        }
    }

    pub fn send(&mut self, frame: &OutboundFrame) -> Result<(), SyncError> {
        if !self.open {
            debug!(event = "frame_dropped", reason = "channel_closed", frame = ?frame);
            return Err(SyncError::ChannelUnavailable);
        }
        let text = frame.encode()?;
        self.sink.send_text(text).map_err(|err| {
            debug!(event = "frame_dropped", reason = %err, frame = ?frame);
            err
        })
    }

    pub fn request_topology(&mut self) -> Result<(), SyncError> {
        self.send(&OutboundFrame::RequestTopology)
    }

    pub fn handle_text(&mut self, text: &str) -> Result<InboundOutcome, SyncError> {
        let frame = decode_frame(text, self.max_frame_bytes).map_err(|err| {
            warn!(event = "frame_decode_error", error = %err);
            SyncError::from(err)
        })?;
        let event = InboundEvent::from_frame(frame).map_err(|err| {
            warn!(event = "frame_route_error", error = %err);
            SyncError::from(err)
        })?;
        self.apply(event)
    }

    pub fn apply(&mut self, event: InboundEvent) -> Result<InboundOutcome, SyncError> {
        match event {
            InboundEvent::Topology(controllers) => {
                let count = controllers.len();
                self.topology.replace(controllers);
                debug!(event = "topology_replaced", controllers = count);
                Ok(InboundOutcome::Topology { controllers: count })
            }
            InboundEvent::Metrics(snapshot) => {
                let runners = snapshot.runners.len();
                if self.subscription.target().is_none() {
                    warn!(event = "stale_metrics_frame", runners);
                    return Err(SyncError::StaleSubscriptionData { runners });
                }
                self.metrics.replace(snapshot.runners);
                debug!(event = "metrics_replaced", runners);
                Ok(InboundOutcome::Metrics { runners })
            }
            InboundEvent::Other(event) => {
                debug!(event = "frame_ignored", tag = %event);
                Ok(InboundOutcome::Ignored { event })
            }
        }
    }

    pub fn select(&mut self, ctrl_id: &str) -> Result<(), SyncError> {
        let actions = self.subscription.select(ctrl_id);
        self.run_actions(actions)
    }

    pub fn deselect(&mut self, ctrl_id: &str) -> Result<(), SyncError> {
        let actions = self.subscription.deselect(ctrl_id);
        self.run_actions(actions)
    }

    // Every action runs even if an earlier send fails; the first error is reported.
    fn run_actions(&mut self, actions: Vec<SubscriptionAction>) -> Result<(), SyncError> {
        let mut first_error = None;
        for action in actions {
            match action {
                SubscriptionAction::Send(frame) => {
                    if let Err(err) = self.send(&frame) {
                        first_error.get_or_insert(err);
                    }
                }
                SubscriptionAction::ClearMetrics => self.metrics.clear(),
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn topology(&self) -> &TopologyStore {
        &self.topology
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    pub fn subscription(&self) -> &SubscriptionState {
        self.subscription.state()
    }

    pub fn is_watching(&self, ctrl_id: &str) -> bool {
        self.subscription.is_watching(ctrl_id)
    }

    pub fn watched_controller(&self) -> Option<&Controller> {
        self.subscription
            .target()
            .and_then(|target| self.topology.get(target))
    }

    pub fn project(&self, cutoff: Option<DateTime<Utc>>) -> Projection {
        let names = self
            .watched_controller()
            .map(Controller::sorted_runner_names)
            .unwrap_or_default();
        project(&self.metrics, &names, cutoff)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
