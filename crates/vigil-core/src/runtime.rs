//! Runtime assembly.
//!
//! [`Runtime::build`] constructs every subsystem against one data
//! directory and hands back a single root object. There is no global
//! state: anything that needs a component receives it from here. The
//! HTTP surface talks to the runtime exclusively through the control
//! methods below.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vigil_llm::{builtin_providers, LlmRouter, OpenAiCompatProvider, Provider, TierChain};
use vigil_memory::{HashEmbedder, VectorMemory};
use vigil_store::chatlog::ChatLog;
use vigil_store::journal::{FileLog, Journal};
use vigil_store::metrics::MetricsStore;
use vigil_store::toollog::ToolUsageLog;
use vigil_store::{BudgetStore, Database, SecretsStore, StatePersistor};
use vigil_types::budget::BudgetStatus;
use vigil_types::chat::{ChatOutcome, ChatSource};
use vigil_types::config::RuntimeConfig;
use vigil_types::event::StateUpdate;
use vigil_types::Result;

use crate::budget_gate::BudgetGate;
use crate::core_loop::CoreLoop;
use crate::dispatcher::ToolDispatcher;
use crate::notifier::ChannelNotifier;
use crate::observer::Broadcast;
use crate::planner::Planner;
use crate::safety::SafetyValidator;
use crate::tools::{Tool, ToolRegistry};
use crate::watchdog::Watchdog;

/// The assembled agent runtime.
pub struct Runtime {
    config: RuntimeConfig,
    core: Arc<CoreLoop>,
    state: Arc<StatePersistor>,
    budget: Arc<BudgetStore>,
    vector: Arc<VectorMemory>,
    secrets: Arc<SecretsStore>,
    registry: Arc<ToolRegistry>,
    cancel: CancellationToken,
}

impl Runtime {
    /// Wire every subsystem against `config.data_dir`.
    pub fn build(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.data_dir.join("skills"))?;

        let db = Database::open(&config.data_dir)?;
        let state = Arc::new(StatePersistor::new(db.clone(), config.directive.clone()));
        state.load_or_create()?;

        let budget = Arc::new(BudgetStore::new(db.clone(), config.monthly_budget_usd));
        budget.ensure_config()?;

        let journal = Arc::new(Journal::open(&config.data_dir)?);
        let file_log = Arc::new(FileLog::open(&config.data_dir)?);
        let secrets = Arc::new(SecretsStore::open(&config.data_dir)?);
        let vector = Arc::new(VectorMemory::open(
            &config.data_dir,
            Arc::new(HashEmbedder::default()),
        )?);

        let providers: Vec<Arc<dyn Provider>> = builtin_providers(&config.ollama_base_url)
            .into_iter()
            .map(|c| Arc::new(OpenAiCompatProvider::new(c)) as Arc<dyn Provider>)
            .collect();
        let router = Arc::new(LlmRouter::new(
            providers,
            TierChain::builtin(),
            Arc::new(BudgetGate::new(budget.clone())),
        ));

        let validator = Arc::new(SafetyValidator::new(config.allowed_roots()));
        let registry = Arc::new(ToolRegistry::new());
        let dispatcher = Arc::new(ToolDispatcher::new(
            registry.clone(),
            validator,
            journal.clone(),
            ToolUsageLog::new(db.clone()),
        ));

        let planner = Planner::new(
            router,
            vector.clone(),
            config.data_dir.join("skills"),
            Some(secrets.clone()),
        );

        let cancel = CancellationToken::new();
        let core = Arc::new(CoreLoop::new(
            state.clone(),
            planner,
            dispatcher,
            budget.clone(),
            vector.clone(),
            journal,
            file_log,
            ChatLog::new(db.clone()),
            MetricsStore::new(db),
            Broadcast::new(),
            cancel.clone(),
        ));

        info!(data_dir = %config.data_dir.display(), "runtime assembled");
        Ok(Self {
            config,
            core,
            state,
            budget,
            vector,
            secrets,
            registry,
            cancel,
        })
    }

    /// Register a tool before (or after) the loop starts.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        self.registry.register(tool);
    }

    /// The shared tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Spawn the loop task under watchdog supervision. Returns the
    /// watchdog handle; it exits after shutdown.
    pub fn start(&self) -> JoinHandle<()> {
        let core = self.core.clone();
        let loop_handle = tokio::spawn(async move { core.run().await });

        let watchdog = Watchdog::new(self.state.clone());
        let restart_core = self.core.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            watchdog
                .run(
                    loop_handle,
                    move || {
                        let core = restart_core.clone();
                        tokio::spawn(async move { core.run().await })
                    },
                    cancel,
                )
                .await;
        })
    }

    /// Stop the loop (after its current iteration) and the watchdog.
    pub fn shutdown(&self) {
        info!("runtime shutdown requested");
        self.core.stop();
    }

    // ── control surface ────────────────────────────────────────────────

    pub fn pause(&self) -> Result<()> {
        self.core.pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.core.resume()
    }

    pub fn wake(&self) {
        self.core.wake();
    }

    pub fn enqueue_chat(
        &self,
        message: String,
        source: ChatSource,
    ) -> tokio::sync::oneshot::Receiver<ChatOutcome> {
        self.core.enqueue_chat(message, source)
    }

    pub fn get_status(&self) -> serde_json::Value {
        self.core.status()
    }

    pub fn get_budget_status(&self) -> Result<BudgetStatus> {
        self.budget.get_status()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StateUpdate> {
        self.core.subscribe()
    }

    pub fn set_notifier(&self, notifier: Arc<dyn ChannelNotifier>) {
        self.core.set_notifier(notifier);
    }

    // ── component access for tool construction ─────────────────────────

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn vector(&self) -> Arc<VectorMemory> {
        self.vector.clone()
    }

    pub fn budget_store(&self) -> Arc<BudgetStore> {
        self.budget.clone()
    }

    pub fn secrets(&self) -> Arc<SecretsStore> {
        self.secrets.clone()
    }

    pub fn core(&self) -> Arc<CoreLoop> {
        self.core.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::budget::ProviderTier;

    fn runtime() -> (tempfile::TempDir, Runtime) {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            data_dir: dir.path().join("agent-data"),
            ..Default::default()
        };
        (dir, Runtime::build(config).unwrap())
    }

    #[tokio::test]
    async fn build_creates_storage_layout() {
        let (_dir, rt) = runtime();
        let data_dir = &rt.config().data_dir;
        assert!(data_dir.join("vigil.db").exists());
        assert!(data_dir.join("blob").is_dir());
        assert!(data_dir.join("logs").is_dir());
        assert!(data_dir.join("skills").is_dir());
        assert!(data_dir.join("index").is_dir());
    }

    #[tokio::test]
    async fn status_reflects_fresh_state() {
        let (_dir, rt) = runtime();
        let status = rt.get_status();
        assert_eq!(status["iteration"], 0);
        assert_eq!(status["paused"], false);
        assert_eq!(status["pending_chats"], 0);
    }

    #[tokio::test]
    async fn pause_and_resume_are_idempotent() {
        let (_dir, rt) = runtime();
        rt.pause().unwrap();
        rt.pause().unwrap();
        assert_eq!(rt.get_status()["paused"], true);
        rt.resume().unwrap();
        rt.resume().unwrap();
        assert_eq!(rt.get_status()["paused"], false);
    }

    #[tokio::test]
    async fn budget_status_has_seeded_providers() {
        let (_dir, rt) = runtime();
        let status = rt.get_budget_status().unwrap();
        assert!(!status.providers.is_empty());
        assert!(status
            .providers
            .iter()
            .any(|p| p.tier == ProviderTier::Free));
    }

    #[tokio::test]
    async fn registered_tools_visible_in_registry() {
        let (_dir, rt) = runtime();
        assert!(rt.registry.is_empty());
        rt.register_tool(crate::tools::testing::EchoTool::named("echo"));
        assert_eq!(rt.registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn rebuild_on_same_dir_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            data_dir: dir.path().join("agent-data"),
            ..Default::default()
        };
        {
            let rt = Runtime::build(config.clone()).unwrap();
            rt.state.increment_iteration().unwrap();
        }
        let rt = Runtime::build(config).unwrap();
        assert_eq!(rt.get_status()["iteration"], 1);
    }
}
