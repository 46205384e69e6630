//! Context shared by the components of one peer

use std::sync::Arc;

use crate::config::Config;
use crate::game::effects::{Presentation, TracingPresentation};
use crate::net::transport::Transport;

/// Explicit per-peer context, handed to the session and its components
#[derive(Clone)]
pub struct ClientContext {
    pub config: Arc<Config>,
    pub transport: Arc<dyn Transport>,
    pub presentation: Arc<dyn Presentation>,
}

impl ClientContext {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self::with_presentation(config, transport, Arc::new(TracingPresentation))
    }

    pub fn with_presentation(
        config: Config,
        transport: Arc<dyn Transport>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            presentation,
        }
    }
}
