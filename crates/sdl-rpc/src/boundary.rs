//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Collaborator traits at the router boundary and in-memory implementations."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sdl_schema::{Interface, MessageKind, ObjectTree};

/// Command execution layer fed by the router.
pub trait RpcService: Send + Sync {
    /// Execute a message that originated on the mobile side.
    fn manage_mobile_command(&self, message: ObjectTree) -> bool;
    /// Execute a message that originated on the HMI side.
    fn manage_hmi_command(&self, message: ObjectTree) -> bool;
    /// Whether `function_id` is provided by an app service, which tolerates
    /// parameters the static schema does not know.
    fn is_app_service_rpc(&self, _function_id: u32, _source: Interface) -> bool {
        false
    }
}

/// Delivery of outgoing objects to the peers.
pub trait OutboundSink: Send + Sync {
    /// Deliver a reply or notification to the mobile application.
    fn send_to_mobile(&self, message: ObjectTree);
    /// Deliver a message to the head unit.
    fn send_to_hmi(&self, message: ObjectTree);
}

/// External handler that may claim mobile RPCs before normal dispatch.
pub trait PassThroughHandler: Send + Sync {
    /// Whether messages with `function_id` may be claimed. Such messages are
    /// converted with unknown parameters allowed and without validation.
    fn can_handle_function_id(&self, function_id: u32) -> bool;
    /// Permission check for a request; responses skip it.
    fn is_passthrough_allowed(&self, message: &ObjectTree) -> bool;
    /// Forward the message; `true` means it was consumed.
    fn rpc_pass_through(&self, message: &ObjectTree) -> bool;
    /// Whether the correlation id belongs to a message already passed through.
    fn is_pass_through_message(
        &self,
        correlation_id: i32,
        source: Interface,
        kind: MessageKind,
    ) -> bool;
}

/// Handler that never claims anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassThrough;

impl PassThroughHandler for NoPassThrough {
    fn can_handle_function_id(&self, _function_id: u32) -> bool {
        false
    }

    fn is_passthrough_allowed(&self, _message: &ObjectTree) -> bool {
        false
    }

    fn rpc_pass_through(&self, _message: &ObjectTree) -> bool {
        false
    }

    fn is_pass_through_message(&self, _: i32, _: Interface, _: MessageKind) -> bool {
        false
    }
}

/// Process-wide power and lifecycle flags checked before routing.
pub trait LivenessProbe: Send + Sync {
    /// Shutdown has begun.
    fn is_stopping(&self) -> bool;
    fn is_low_voltage(&self) -> bool;
}

/// Atomic flags implementing [`LivenessProbe`].
#[derive(Debug, Default)]
pub struct PowerState {
    stopping: AtomicBool,
    low_voltage: AtomicBool,
}

impl PowerState {
    /// Running, with normal voltage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag process shutdown.
    pub fn set_stopping(&self, stopping: bool) {
        self.stopping.store(stopping, Ordering::SeqCst);
    }

    /// Enter or leave the low-voltage state.
    pub fn set_low_voltage(&self, active: bool) {
        self.low_voltage.store(active, Ordering::SeqCst);
    }
}

impl LivenessProbe for PowerState {
    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn is_low_voltage(&self) -> bool {
        self.low_voltage.load(Ordering::SeqCst)
    }
}

/// Sink that keeps every outgoing object, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemorySink {
    mobile: Mutex<Vec<ObjectTree>>,
    hmi: Mutex<Vec<ObjectTree>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent to mobile so far.
    pub fn mobile(&self) -> Vec<ObjectTree> {
        self.mobile.lock().clone()
    }

    pub fn hmi(&self) -> Vec<ObjectTree> {
        self.hmi.lock().clone()
    }

    /// Drain the mobile queue.
    pub fn take_mobile(&self) -> Vec<ObjectTree> {
        std::mem::take(&mut *self.mobile.lock())
    }

    pub fn take_hmi(&self) -> Vec<ObjectTree> {
        std::mem::take(&mut *self.hmi.lock())
    }
}

impl OutboundSink for InMemorySink {
    fn send_to_mobile(&self, message: ObjectTree) {
        self.mobile.lock().push(message);
    }

    fn send_to_hmi(&self, message: ObjectTree) {
        self.hmi.lock().push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_keeps_messages_per_peer() {
        let sink = InMemorySink::new();
        sink.send_to_mobile(ObjectTree::from("m"));
        sink.send_to_hmi(ObjectTree::from("h1"));
        sink.send_to_hmi(ObjectTree::from("h2"));
        assert_eq!(sink.mobile().len(), 1);
        assert_eq!(sink.take_hmi().len(), 2);
        assert!(sink.hmi().is_empty());
    }

    #[test]
    fn power_state_flags_toggle() {
        let power = PowerState::new();
        assert!(!power.is_stopping() && !power.is_low_voltage());
        power.set_low_voltage(true);
        assert!(power.is_low_voltage());
        power.set_stopping(true);
        assert!(power.is_stopping());
    }

    #[test]
    fn default_handler_claims_nothing() {
        let handler = NoPassThrough;
        assert!(!handler.can_handle_function_id(1));
        assert!(!handler.is_pass_through_message(1, Interface::Mobile, MessageKind::Request));
    }
}
