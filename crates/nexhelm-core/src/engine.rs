//! The workflow engine API.
//!
//! `start(request)` creates the state, spawns the executor on its own
//! task, and hands back the workflow id plus a subscription to its event
//! stream. `cancel(id)` signals the running executor; it stops at the
//! next suspension point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument};

use nexhelm_bus::{BusConfig, EventBus, EventSubscription};
use nexhelm_llm::LLMAdapter;
use nexhelm_tools::{standard_registry, Backends, Clock, SystemClock, ToolRegistry};

use crate::agents::AgentContext;
use crate::decision::DecisionClient;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::executor::WorkflowExecutor;
use crate::state::WorkflowState;
use crate::types::{Request, RequestSpec, WorkflowId};

/// Engine-wide knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Agent-invocation budget per workflow (planning included).
    pub max_steps: u32,
    /// Deadline per LLM call.
    pub llm_timeout: Duration,
    /// Event bus buffering and back-pressure.
    pub bus: BusConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            llm_timeout: Duration::from_secs(30),
            bus: BusConfig::default(),
        }
    }
}

/// Handle returned by [`WorkflowEngine::start`].
pub struct WorkflowHandle {
    pub workflow_id: WorkflowId,
    pub events: EventSubscription,
}

/// The multi-agent workflow engine.
pub struct WorkflowEngine {
    backends: Backends,
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LLMAdapter>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    cancels: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl WorkflowEngine {
    /// Build an engine over the given backends and adapter, with the
    /// standard tool set, system clock, and default configuration.
    pub fn new(backends: Backends, llm: Arc<dyn LLMAdapter>) -> Self {
        Self::with_config(backends, llm, EngineConfig::default())
    }

    pub fn with_config(backends: Backends, llm: Arc<dyn LLMAdapter>, config: EngineConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::assemble(backends, llm, clock, config)
    }

    /// Substitute the time source; tests pin it.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.registry = Arc::new(standard_registry(
            self.backends.crm.clone(),
            self.backends.documents.clone(),
            self.backends.accounts.clone(),
            self.backends.notifier.clone(),
            clock.clone(),
        ));
        self.clock = clock;
        self
    }

    fn assemble(
        backends: Backends,
        llm: Arc<dyn LLMAdapter>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let registry = Arc::new(standard_registry(
            backends.crm.clone(),
            backends.documents.clone(),
            backends.accounts.clone(),
            backends.notifier.clone(),
            clock.clone(),
        ));
        let bus = Arc::new(EventBus::new(config.bus.clone()));
        Self {
            backends,
            registry,
            llm,
            bus,
            clock,
            config,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The shared event bus, for attaching additional subscribers such
    /// as the audit sink.
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// The injected backends, for fixtures and assertions.
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Start a workflow; returns its id and a subscription to its
    /// events. The workflow runs on its own task.
    #[instrument(skip_all, fields(request_type = %spec.request_type, client_id = %spec.client_id))]
    pub async fn start(&self, spec: RequestSpec) -> WorkflowHandle {
        let workflow_id = WorkflowId::generate();
        let now = self.clock.now();
        let request = Request::from_spec(spec, now);
        let state = WorkflowState::new(workflow_id.clone(), request, now);

        let events = self.bus.subscribe(workflow_id.as_str()).await;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancels
            .lock()
            .unwrap()
            .insert(workflow_id.as_str().to_string(), cancel_tx);

        let cx = AgentContext {
            registry: self.registry.clone(),
            llm: DecisionClient::new(self.llm.clone(), self.config.llm_timeout),
            sink: EventSink::new(self.bus.clone(), workflow_id.as_str(), self.clock.clone()),
            clock: self.clock.clone(),
        };
        let executor = WorkflowExecutor::new(self.config.max_steps);
        let cancels = self.cancels.clone();
        let id = workflow_id.as_str().to_string();

        info!(workflow_id = %workflow_id, "Starting workflow");
        tokio::spawn(async move {
            let final_state = executor.run(state, cx, cancel_rx).await;
            cancels.lock().unwrap().remove(&id);
            info!(
                workflow_id = %final_state.workflow_id,
                status = final_state.status.as_str(),
                "Workflow task exited"
            );
        });

        WorkflowHandle {
            workflow_id,
            events,
        }
    }

    /// Request cancellation of a running workflow.
    pub async fn cancel(&self, workflow_id: &WorkflowId) -> Result<(), EngineError> {
        let cancels = self.cancels.lock().unwrap();
        let sender = cancels
            .get(workflow_id.as_str())
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        let _ = sender.send(true);
        info!(workflow_id = %workflow_id, "Cancellation requested");
        Ok(())
    }
}
