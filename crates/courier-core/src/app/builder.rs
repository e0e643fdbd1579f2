//! ServerBuilder - EnvelopeServer の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::marker::PhantomData;
use std::sync::Arc;

use super::manager::MessageManager;
use super::server::{EnvelopeServer, ServerCore};
use crate::config::{BusConfig, ConfigError};
use crate::domain::{ContainerHandle, Origin};
use crate::ports::{BusTransport, IdGenerator, SystemClock, TransportError, UlidGenerator};
use crate::typed::{ApiContract, ApiHandler, DynHandler, EnvelopeContract, erase};

/// ServerBuilder は EnvelopeServer を構築
///
/// # 使用例
/// ```ignore
/// let server = EnvelopeServer::<ProcessListEnvelope, ProcessListChannel>::builder(container, origin)
///     .transport(transport)
///     .driver(driver)
///     .config(BusConfig::from_env()?)
///     .generate()?;
/// ```
///
/// # Fail-fast 設計
/// - transport / driver が無ければ BuildError
/// - transport の origin と宣言した host origin が食い違えば BuildError
/// - 設定値の検証もここで行う
pub struct ServerBuilder<E: EnvelopeContract, C: ApiContract> {
    container: ContainerHandle,
    origin: Origin,
    transport: Option<Arc<dyn BusTransport>>,
    driver: Option<Arc<dyn DynHandler>>,
    config: BusConfig,
    ids: Option<Arc<dyn IdGenerator>>,
    _marker: PhantomData<fn() -> (E, C)>,
}

/// BuildError は EnvelopeServer 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no bus transport was configured")]
    MissingTransport,

    #[error("no driver was configured for the channel API")]
    MissingDriver,

    #[error("transport posts from {transport} but the server was declared for {declared}")]
    OriginMismatch { transport: Origin, declared: Origin },

    #[error("container '{0}' has already been removed")]
    ContainerRemoved(String),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl<E: EnvelopeContract, C: ApiContract> ServerBuilder<E, C> {
    pub fn new(container: ContainerHandle, origin: Origin) -> Self {
        Self {
            container,
            origin,
            transport: None,
            driver: None,
            config: BusConfig::default(),
            ids: None,
            _marker: PhantomData,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn BusTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Driver serving the channel API `C`.
    pub fn driver<H>(mut self, driver: Arc<H>) -> Self
    where
        H: ApiHandler<C> + ?Sized + 'static,
    {
        self.driver = Some(erase::<C, H>(driver));
        self
    }

    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate the wiring, register the listener and start the server.
    ///
    /// Must be called inside a tokio runtime.
    pub fn generate(self) -> Result<EnvelopeServer<E, C>, BuildError> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let driver = self.driver.ok_or(BuildError::MissingDriver)?;
        if transport.origin() != &self.origin {
            return Err(BuildError::OriginMismatch {
                transport: transport.origin().clone(),
                declared: self.origin,
            });
        }
        if self.container.is_removed() {
            return Err(BuildError::ContainerRemoved(self.container.name().to_string()));
        }
        self.config.validate()?;

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let inbound = transport.listen()?;
        let id = ids.generate_envelope_server_id();
        let manager = Arc::new(MessageManager::new(transport, ids, self.config));

        Ok(EnvelopeServer::start(
            ServerCore {
                id,
                origin: self.origin,
                container: self.container,
                manager,
                driver,
            },
            inbound,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApiError;
    use crate::impls::InMemoryBus;
    use crate::typed::{EnvelopeContract, NoOperations};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;

    struct Probe;

    impl ApiContract for Probe {
        const NAME: &'static str = "probe";
        type Request = NoOperations;
        type Notification = NoOperations;
    }

    impl EnvelopeContract for Probe {
        const INIT_METHOD: &'static str = "probe__init";
        type InitArgs = ();
    }

    struct ProbeDriver;

    #[async_trait]
    impl ApiHandler<Probe> for ProbeDriver {
        async fn on_request(&self, request: NoOperations) -> Result<Value, ApiError> {
            match request {}
        }
    }

    fn origins() -> (Origin, Origin) {
        (
            Origin::parse("http://host").unwrap(),
            Origin::parse("http://guest").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_generate_success() {
        let (host, guest) = origins();
        let (host_end, _guest_end) = InMemoryBus::pair(host.clone(), guest.clone());
        let container = ContainerHandle::mount("probe", guest);

        let server = ServerBuilder::<Probe, Probe>::new(container, host)
            .transport(Arc::new(host_end))
            .driver(Arc::new(ProbeDriver))
            .generate()
            .unwrap();
        assert!(!server.status().disposed);
        server.dispose().await;
    }

    #[tokio::test]
    async fn test_generate_missing_pieces() {
        let (host, guest) = origins();
        let (host_end, _guest_end) = InMemoryBus::pair(host.clone(), guest.clone());
        let container = ContainerHandle::mount("probe", guest);

        let err = ServerBuilder::<Probe, Probe>::new(container.clone(), host.clone())
            .driver(Arc::new(ProbeDriver))
            .generate()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::MissingTransport));

        let err = ServerBuilder::<Probe, Probe>::new(container, host)
            .transport(Arc::new(host_end))
            .generate()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::MissingDriver));
    }

    #[tokio::test]
    async fn test_generate_origin_mismatch() {
        let (host, guest) = origins();
        let (host_end, _guest_end) = InMemoryBus::pair(host, guest.clone());
        let container = ContainerHandle::mount("probe", guest);
        let declared = Origin::parse("http://elsewhere").unwrap();

        let err = ServerBuilder::<Probe, Probe>::new(container, declared)
            .transport(Arc::new(host_end))
            .driver(Arc::new(ProbeDriver))
            .generate()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::OriginMismatch { .. }));
    }

    #[tokio::test]
    async fn test_generate_rejects_removed_container_and_bad_config() {
        let (host, guest) = origins();
        let (host_end, _guest_end) = InMemoryBus::pair(host.clone(), guest.clone());
        let host_end: Arc<dyn BusTransport> = Arc::new(host_end);

        let removed = ContainerHandle::mount("probe", guest.clone());
        removed.remove();
        let err = ServerBuilder::<Probe, Probe>::new(removed, host.clone())
            .transport(host_end.clone())
            .driver(Arc::new(ProbeDriver))
            .generate()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::ContainerRemoved(_)));

        let err = ServerBuilder::<Probe, Probe>::new(ContainerHandle::mount("probe", guest), host)
            .transport(host_end)
            .driver(Arc::new(ProbeDriver))
            .config(BusConfig::default().with_init_poll_interval(Duration::ZERO))
            .generate()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_generate_second_server_on_same_endpoint_fails() {
        let (host, guest) = origins();
        let (host_end, _guest_end) = InMemoryBus::pair(host.clone(), guest.clone());
        let host_end: Arc<dyn BusTransport> = Arc::new(host_end);
        let container = ContainerHandle::mount("probe", guest);

        let first = ServerBuilder::<Probe, Probe>::new(container.clone(), host.clone())
            .transport(host_end.clone())
            .driver(Arc::new(ProbeDriver))
            .generate()
            .unwrap();
        let err = ServerBuilder::<Probe, Probe>::new(container, host)
            .transport(host_end)
            .driver(Arc::new(ProbeDriver))
            .generate()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::Transport(_)));
        first.dispose().await;
    }
}
