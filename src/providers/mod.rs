//! Provider module for Chatloom
//!
//! This module contains the completion provider abstraction and the chat
//! proxy implementation.

pub mod base;
pub mod proxy;

pub use base::{is_proxy_error, Provider, PROXY_ERROR_SENTINEL};
pub use proxy::ProxyProvider;

#[cfg(test)]
pub use base::MockProvider;

use crate::config::ProviderConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration
///
/// # Errors
///
/// Returns error if the provider cannot be initialized
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(ProxyProvider::new(config.clone())?))
}
