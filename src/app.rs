use crate::errors::ToolError;
use crate::managers::api::ApiManager;
use crate::mcp::catalog::{tool_catalog, TEST_REQUEST_TOOL};
use crate::services::auth::AuthResolver;
use crate::services::config::AppConfig;
use crate::services::executor::RequestExecutor;
use crate::services::logger::Logger;
use crate::services::rate_limit::AdmissionGate;
use crate::services::transport::{HttpTransport, ReqwestTransport};
use crate::services::validation::Validation;
use std::sync::Arc;

/// Wired application: one config, one transport, one gate, shared by every call.
pub struct App {
    pub logger: Logger,
    pub config: Arc<AppConfig>,
    pub api_manager: Arc<ApiManager>,
    gate: AdmissionGate,
}

impl App {
    fn validate_tool_wiring() -> Result<(), ToolError> {
        let missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| tool.name != TEST_REQUEST_TOOL)
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must have a handler.")
            .with_details(serde_json::json!({ "missing": missing })))
    }

    pub fn initialize(config: Arc<AppConfig>) -> Result<Self, ToolError> {
        let transport = Arc::new(ReqwestTransport::from_config(&config)?);
        Self::with_transport(config, transport)
    }

    pub fn with_transport(
        config: Arc<AppConfig>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ToolError> {
        Self::validate_tool_wiring()?;

        let logger = Logger::new("rest-probe");
        let gate = AdmissionGate::new(config.rate_limit, logger.clone());
        let auth = Arc::new(AuthResolver::new(&config.auth, logger.clone()));
        let api_manager = Arc::new(ApiManager::new(
            logger.clone(),
            config.clone(),
            Validation::new(),
            gate.clone(),
            auth,
            RequestExecutor::new(transport),
        ));

        logger.info(
            "Initialized",
            Some(&serde_json::json!({
                "base_url": config.base_url,
                "auth": api_manager.auth_mode().as_str(),
                "response_size_limit": config.response_size_limit,
                "custom_headers": config.custom_headers().len(),
                "development": config.is_development(),
            })),
        );

        Ok(Self {
            logger,
            config,
            api_manager,
            gate,
        })
    }

    /// Starts the admission gate sweeper. Requires a running tokio runtime.
    pub fn start_background_tasks(&self) -> tokio::task::JoinHandle<()> {
        self.gate.spawn_sweeper()
    }
}
