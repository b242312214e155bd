//! The resource client. Every call takes a list of retry strategies; an empty
//! list applies the client's defaults.

mod disk;
mod nic;
mod tag;
mod template;
mod vm;

use crate::api::OvirtApi;
use crate::rest::RestApi;
use crate::retry::{self, OperationClass, RetryDefaults, RetryStrategy};
use ovirt_common::{ClientConfig, Result};
use std::future::Future;
use std::sync::Arc;

/// Typed access to the engine. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Client {
    api: Arc<dyn OvirtApi>,
    defaults: RetryDefaults,
}

impl Client {
    /// Wrap a transport, e.g. [`MockApi`](crate::MockApi) in tests.
    pub fn new(api: impl OvirtApi + 'static) -> Self {
        Self::from_api(Arc::new(api))
    }

    pub fn from_api(api: Arc<dyn OvirtApi>) -> Self {
        Self {
            api,
            defaults: RetryDefaults::default(),
        }
    }

    /// Build a client talking to the engine described by `config`.
    ///
    /// # Errors
    /// Returns a config error if `config` is invalid or the CA file cannot
    /// be read.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let api = RestApi::new(config)?;
        tracing::info!(url = %config.url, username = %config.username, "Created engine client");
        Ok(Self {
            api: Arc::new(api),
            defaults: RetryDefaults::from(&config.retry),
        })
    }

    /// Replace the budgets used when a call passes no strategies.
    pub fn with_retry_defaults(mut self, defaults: RetryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn retry_defaults(&self) -> &RetryDefaults {
        &self.defaults
    }

    pub fn api(&self) -> &Arc<dyn OvirtApi> {
        &self.api
    }

    async fn retry<T, F, Fut>(
        &self,
        action: &str,
        class: OperationClass,
        retries: &[RetryStrategy],
        operation: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry::execute(action, class, retries, &self.defaults, operation).await
    }

    /// Run a removal. A not-found answer on a repeated attempt means an
    /// earlier attempt went through, so it counts as success.
    async fn remove_with_retry<F, Fut>(
        &self,
        action: &str,
        retries: &[RetryStrategy],
        mut operation: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.retry(action, OperationClass::Write, retries, move |attempt| {
            let removal = operation();
            async move {
                match removal.await {
                    Err(err) if attempt > 1 && err.is_not_found() => {
                        tracing::debug!(attempt, "Resource already gone after retry");
                        Ok(())
                    }
                    other => other,
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;
    use ovirt_common::{ErrorKind, ResultExt, VmId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = ClientConfig::new("engine.example.com", "admin@internal", "secret");
        let err = Client::connect(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_connect_takes_retry_defaults() {
        let mut config = ClientConfig::new(
            "https://engine.example.com/ovirt-engine/api",
            "admin@internal",
            "secret",
        );
        config.retry.read_timeout_secs = 42;
        let client = Client::connect(&config).unwrap();
        assert_eq!(client.retry_defaults().read_timeout, Duration::from_secs(42));
    }

    #[tokio::test]
    async fn test_remove_missing_on_first_attempt_fails() {
        let client = Client::new(MockApi::new());
        let err = client
            .remove_vm(&VmId::from("missing"), &[])
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        client
            .remove_vm(&VmId::from("missing"), &[])
            .await
            .ignore_not_found()
            .unwrap();
    }
}
