//! Application state and configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use legal_engine::{GenerationParams, TextGenerator};

use crate::pool::GenerationPool;

/// Port the service listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 7000;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bounded executor wrapping the loaded generator.
    pub pool: Arc<GenerationPool>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ServerConfig) -> Self {
        let pool = GenerationPool::new(
            generator,
            config.max_concurrent_generations,
            config.request_timeout,
        );
        Self {
            pool: Arc::new(pool),
            config: Arc::new(config),
        }
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.pool.generator().as_ref()
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub addr: SocketAddr,
    /// Sampling settings applied to every prediction.
    pub generation: GenerationParams,
    /// Generations allowed to run at once; further requests queue.
    pub max_concurrent_generations: usize,
    /// Deadline covering queueing plus inference. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            generation: GenerationParams::default(),
            max_concurrent_generations: 1,
            request_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_generation(mut self, params: GenerationParams) -> Self {
        self.generation = params;
        self
    }

    pub fn with_max_concurrent_generations(mut self, n: usize) -> Self {
        self.max_concurrent_generations = n;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legal_runtime::MockGenerator;

    #[test]
    fn defaults_listen_on_local_port_7000() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.to_string(), "127.0.0.1:7000");
        assert_eq!(config.generation, GenerationParams::default());
        assert_eq!(config.max_concurrent_generations, 1);
    }

    #[test]
    fn state_wires_pool_from_config() {
        let config = ServerConfig::new()
            .with_max_concurrent_generations(3)
            .with_request_timeout(None);
        let state = AppState::new(Arc::new(MockGenerator::new()), config);
        assert_eq!(state.pool.max_concurrent(), 3);
        assert_eq!(state.pool.timeout(), None);
        assert_eq!(state.generator().model_id(), "mock");
    }
}
