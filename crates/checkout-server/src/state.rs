//! Application State

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use checkout_client::BackendClient;
use checkout_core::{CheckoutFlow, FlowConfig, FlowNotifier, SubscriptionActivator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live reconciliation flows, one per redirect landing
    pub flows: FlowRegistry,

    /// Activation seam handed to new flows (backend or mock)
    pub activator: Arc<dyn SubscriptionActivator>,

    /// Query backend (None when running against the mock)
    pub backend: Option<Arc<BackendClient>>,

    /// Notification sink handed to new flows
    pub notifier: Arc<dyn FlowNotifier>,

    /// Destination of the post-success continue action
    pub continue_url: String,

    /// Timing knobs for new flows
    pub flow_config: FlowConfig,
}

/// Registry of live flows keyed by instance id.
///
/// Removing a flow drops the host's last handle to it, which aborts its
/// pending timers; an in-flight collaborator call is left to resolve into
/// nothing.
#[derive(Clone, Default)]
pub struct FlowRegistry {
    flows: Arc<Mutex<HashMap<Uuid, CheckoutFlow>>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created flow and hand back its id
    pub fn insert(&self, flow: CheckoutFlow) -> Uuid {
        let id = Uuid::new_v4();
        self.flows.lock().unwrap().insert(id, flow);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<CheckoutFlow> {
        self.flows.lock().unwrap().get(id).cloned()
    }

    /// Remove a flow; returns whether it existed
    pub fn remove(&self, id: &Uuid) -> bool {
        self.flows.lock().unwrap().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.flows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use checkout_client::MockActivator;
    use checkout_core::{Phase, TracingNotifier};

    fn sample_flow() -> CheckoutFlow {
        let mut params = HashMap::new();
        params.insert("session_id".to_string(), "cs_test_a1b2c3".to_string());
        params.insert("plan".to_string(), "monthly".to_string());
        CheckoutFlow::from_query(
            &params,
            Arc::new(MockActivator::new()),
            Arc::new(TracingNotifier),
            FlowConfig::default(),
        )
    }

    #[test]
    fn test_registry_insert_get_remove() {
        let registry = FlowRegistry::new();
        assert!(registry.is_empty());

        let id = registry.insert(sample_flow());
        assert_eq!(registry.len(), 1);
        let flow = registry.get(&id).unwrap();
        assert_eq!(flow.snapshot().phase, Phase::Idle);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_registry_ids_are_distinct() {
        let registry = FlowRegistry::new();
        let a = registry.insert(sample_flow());
        let b = registry.insert(sample_flow());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }
}
