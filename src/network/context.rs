use crate::error::Result;
use crate::provider::Provider;
use log::{debug, warn};
use std::ops::{Deref, DerefMut};

/// A connected provider that disconnects when dropped
///
/// Release happens on every exit path: normal scope end, `?` early
/// returns and unwinding panics.
pub struct ProviderContext {
    provider: Box<dyn Provider>,
}

impl ProviderContext {
    /// Connect the provider and take ownership of the connection
    pub fn connect(mut provider: Box<dyn Provider>) -> Result<ProviderContext> {
        provider.connect()?;
        debug!("Entered provider context {}", provider.network_choice());
        Ok(ProviderContext { provider })
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn provider_mut(&mut self) -> &mut dyn Provider {
        self.provider.as_mut()
    }
}

impl Deref for ProviderContext {
    type Target = dyn Provider;

    fn deref(&self) -> &Self::Target {
        self.provider.as_ref()
    }
}

impl DerefMut for ProviderContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.provider.as_mut()
    }
}

impl Drop for ProviderContext {
    fn drop(&mut self) {
        if !self.provider.is_connected() {
            return;
        }
        if let Err(e) = self.provider.disconnect() {
            warn!(
                "Failed to disconnect from {}: {e}",
                self.provider.network_choice()
            );
        }
        debug!("Left provider context {}", self.provider.network_choice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::testnet::{MockProvider, ProviderLog};

    #[test]
    fn test_connects_on_enter_and_disconnects_on_drop() {
        let log = ProviderLog::default();
        {
            let context =
                ProviderContext::connect(Box::new(MockProvider::new("ethereum", "sepolia", &log)))
                    .unwrap();
            assert!(context.is_connected());
            assert_eq!(log.connects(), 1);
            assert_eq!(log.disconnects(), 0);
        }
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn test_disconnects_on_early_return() {
        fn early(log: &ProviderLog) -> Result<()> {
            let _context =
                ProviderContext::connect(Box::new(MockProvider::new("ethereum", "local", log)))?;
            Err(NetworkError::Provider("boom".to_string()))
        }

        let log = ProviderLog::default();
        assert!(early(&log).is_err());
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn test_disconnects_on_panic() {
        let log = ProviderLog::default();
        let inner = log.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _context =
                ProviderContext::connect(Box::new(MockProvider::new("ethereum", "local", &inner)))
                    .unwrap();
            panic!("test panic");
        }));
        assert!(result.is_err());
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn test_failed_connect_yields_no_context() {
        let log = ProviderLog::default();
        let provider = MockProvider::new("ethereum", "local", &log).failing_connect();
        assert!(ProviderContext::connect(Box::new(provider)).is_err());
        assert_eq!(log.disconnects(), 0);
    }

    #[test]
    fn test_settings_mutable_through_context() {
        let log = ProviderLog::default();
        let mut context =
            ProviderContext::connect(Box::new(MockProvider::new("ethereum", "local", &log)))
                .unwrap();
        context
            .provider_settings_mut()
            .insert("uri", "http://example.com/node");
        assert_eq!(
            context.provider().provider_settings().uri(),
            Some("http://example.com/node")
        );
    }
}
