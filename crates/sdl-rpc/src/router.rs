//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Per-peer routing of converted messages."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Instant;

use sdl_schema::{Interface, MessageKind, ObjectTree};
use tracing::{debug, error, info, warn};

use crate::boundary::{LivenessProbe, NoPassThrough, OutboundSink, PassThroughHandler, RpcService};
use crate::converter::{Conversion, MessageConverter};
use crate::error::ConversionError;
use crate::metrics::RouterMetrics;
use crate::negative::Rejection;
use crate::types::{strings, Envelope, MobileResult};

/// Why a message was discarded without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Stopping,
    LowVoltage,
    UnsupportedProtocol,
    /// The converter produced nothing to forward.
    Unconvertible,
    /// HMI conversion failed in a way that is not answered.
    InvalidHmiMessage,
}

impl DropReason {
    /// Metric label for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Stopping => "stopping",
            DropReason::LowVoltage => "low_voltage",
            DropReason::UnsupportedProtocol => "unsupported_protocol",
            DropReason::Unconvertible => "unconvertible",
            DropReason::InvalidHmiMessage => "invalid_hmi_message",
        }
    }
}

/// What the router did with one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to command execution; carries the service's result.
    Dispatched { succeeded: bool },
    /// Claimed by the pass-through handler.
    PassedThrough,
    /// A reply went straight back to the originating peer.
    Responded,
    /// A negative response went to the mobile peer.
    Rejected(MobileResult),
    Dropped(DropReason),
}

/// Dispatches envelopes through conversion to command execution.
pub struct ProtocolRouter {
    converter: MessageConverter,
    service: Arc<dyn RpcService>,
    sink: Arc<dyn OutboundSink>,
    liveness: Arc<dyn LivenessProbe>,
    pass_through: Arc<dyn PassThroughHandler>,
    metrics: Option<RouterMetrics>,
}

impl ProtocolRouter {
    /// Router with no pass-through handler and no metrics.
    pub fn new(
        converter: MessageConverter,
        service: Arc<dyn RpcService>,
        sink: Arc<dyn OutboundSink>,
        liveness: Arc<dyn LivenessProbe>,
    ) -> Self {
        Self {
            converter,
            service,
            sink,
            liveness,
            pass_through: Arc::new(NoPassThrough),
            metrics: None,
        }
    }

    /// Let `handler` claim mobile messages before command execution.
    pub fn with_pass_through(mut self, handler: Arc<dyn PassThroughHandler>) -> Self {
        self.pass_through = handler;
        self
    }

    /// Count every routing decision in `metrics`.
    pub fn with_metrics(mut self, metrics: RouterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The converter shared by both ingress paths.
    pub fn converter(&self) -> &MessageConverter {
        &self.converter
    }

    /// Shutdown and low-voltage state consulted before every message.
    pub fn liveness(&self) -> &Arc<dyn LivenessProbe> {
        &self.liveness
    }

    /// Route one message received from a mobile application.
    pub fn route_from_mobile(&self, envelope: &Envelope) -> RouteOutcome {
        let peer = Interface::Mobile;
        self.observe(|metrics| metrics.observe_received(peer));
        if let Some(reason) = self.liveness_guard() {
            return self.drop_message(peer, reason);
        }

        if envelope.kind == MessageKind::Request && envelope.correlation_id < 0 {
            error!(
                correlation_id = envelope.correlation_id,
                "request correlation id < 0, returning INVALID_ID"
            );
            return self.reject(
                envelope,
                &ConversionError::InvalidCorrelationId(envelope.correlation_id),
            );
        }

        let function_id = envelope.function_id;
        let rpc_passing = self.pass_through.can_handle_function_id(function_id);
        let allow_unknown = rpc_passing || self.service.is_app_service_rpc(function_id, peer);
        if allow_unknown {
            debug!(function_id, "allowing unknown parameters");
        }

        let mut message = match self.convert(peer, envelope, allow_unknown, !rpc_passing) {
            Ok(Conversion::Accepted(message)) => message,
            Ok(other) => return self.settle_mobile(peer, other),
            Err(err) => return self.reject(envelope, &err),
        };

        if rpc_passing {
            let kind = message[strings::PARAMS][strings::MESSAGE_TYPE]
                .as_i64()
                .map_or(MessageKind::Unknown, MessageKind::from_code);
            let correlation_id = envelope.correlation_id;
            if (kind != MessageKind::Request || self.pass_through.is_passthrough_allowed(&message))
                && self.pass_through.rpc_pass_through(&message)
            {
                debug!(function_id, correlation_id, "message passed through");
                return RouteOutcome::PassedThrough;
            }
            if !self
                .pass_through
                .is_pass_through_message(correlation_id, peer, kind)
            {
                message = match self.convert(peer, envelope, false, true) {
                    Ok(Conversion::Accepted(message)) => message,
                    Ok(other) => return self.settle_mobile(peer, other),
                    Err(err) => return self.reject(envelope, &err),
                };
            }
        }

        let succeeded = self.service.manage_mobile_command(message);
        self.dispatched(peer, succeeded)
    }

    /// Route one message received from the head unit.
    pub fn route_from_hmi(&self, envelope: &Envelope) -> RouteOutcome {
        let peer = Interface::Hmi;
        self.observe(|metrics| metrics.observe_received(peer));
        if let Some(reason) = self.liveness_guard() {
            return self.drop_message(peer, reason);
        }

        let allow_unknown = self
            .converter
            .hmi_function_id(envelope)
            .is_some_and(|function_id| self.service.is_app_service_rpc(function_id, peer));
        if allow_unknown {
            debug!("allowing unknown parameters for HMI app service RPC");
        }

        match self.convert(peer, envelope, allow_unknown, true) {
            Ok(Conversion::Accepted(message)) => {
                debug!("converted message, creating HMI command");
                let succeeded = self.service.manage_hmi_command(message);
                self.dispatched(peer, succeeded)
            }
            Ok(Conversion::Respond(message)) => {
                self.sink.send_to_hmi(message);
                self.observe(|metrics| metrics.observe_responded(peer));
                RouteOutcome::Responded
            }
            Ok(Conversion::Dropped) => self.drop_message(peer, DropReason::Unconvertible),
            Err(ConversionError::UnsupportedProtocolVersion(_)) => {
                self.drop_message(peer, DropReason::UnsupportedProtocol)
            }
            Err(err) => {
                error!(error = %err, "cannot create object from HMI message");
                self.observe(|metrics| metrics.observe_dropped(peer, err.label()));
                RouteOutcome::Dropped(DropReason::InvalidHmiMessage)
            }
        }
    }

    fn liveness_guard(&self) -> Option<DropReason> {
        if self.liveness.is_stopping() {
            info!("bridge is stopping");
            return Some(DropReason::Stopping);
        }
        if self.liveness.is_low_voltage() {
            error!("low voltage is active");
            return Some(DropReason::LowVoltage);
        }
        None
    }

    fn convert(
        &self,
        peer: Interface,
        envelope: &Envelope,
        allow_unknown: bool,
        should_validate: bool,
    ) -> Result<Conversion, ConversionError> {
        let started = Instant::now();
        let result = self
            .converter
            .convert(envelope, allow_unknown, should_validate);
        self.observe(|metrics| metrics.observe_conversion(peer, started.elapsed()));
        result
    }

    fn settle_mobile(&self, peer: Interface, conversion: Conversion) -> RouteOutcome {
        match conversion {
            Conversion::Respond(message) => {
                self.sink.send_to_mobile(message);
                self.observe(|metrics| metrics.observe_responded(peer));
                RouteOutcome::Responded
            }
            Conversion::Dropped => self.drop_message(peer, DropReason::Unconvertible),
            Conversion::Accepted(message) => {
                let succeeded = self.service.manage_mobile_command(message);
                self.dispatched(peer, succeeded)
            }
        }
    }

    fn reject(&self, envelope: &Envelope, err: &ConversionError) -> RouteOutcome {
        let peer = Interface::Mobile;
        if let ConversionError::UnsupportedProtocolVersion(_) = err {
            return self.drop_message(peer, DropReason::UnsupportedProtocol);
        }
        warn!(
            connection_key = envelope.connection_key,
            function_id = envelope.function_id,
            correlation_id = envelope.correlation_id,
            error = %err,
            "rejecting mobile message"
        );
        let rejection = Rejection::for_envelope(envelope, err);
        self.sink.send_to_mobile(rejection.to_response());
        self.observe(|metrics| metrics.observe_rejected(peer, err.label()));
        RouteOutcome::Rejected(rejection.result_code)
    }

    fn dispatched(&self, peer: Interface, succeeded: bool) -> RouteOutcome {
        if !succeeded {
            error!(peer = %peer, "received command didn't run successfully");
        }
        self.observe(|metrics| metrics.observe_dispatched(peer));
        RouteOutcome::Dispatched { succeeded }
    }

    fn drop_message(&self, peer: Interface, reason: DropReason) -> RouteOutcome {
        debug!(peer = %peer, reason = reason.as_str(), "dropping message");
        self.observe(|metrics| metrics.observe_dropped(peer, reason.as_str()));
        RouteOutcome::Dropped(reason)
    }

    fn observe(&self, record: impl FnOnce(&RouterMetrics)) {
        if let Some(metrics) = &self.metrics {
            record(metrics);
        }
    }
}

/// Convenience for tests and tools that only need the resulting object.
pub fn correlation_id_of(message: &ObjectTree) -> Option<i64> {
    message[strings::PARAMS][strings::CORRELATION_ID].as_i64()
}
