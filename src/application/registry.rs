//! Explicit channel → adapter mapping, built once at startup

use std::collections::HashMap;

use crate::domain::site::ChannelKey;
use crate::infrastructure::adapters::{SiteAdapter, all_adapters};

#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ChannelKey, SiteAdapter>,
}

impl AdapterRegistry {
    /// Later adapters replace earlier ones registered under the same channel
    pub fn new(adapters: impl IntoIterator<Item = SiteAdapter>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.channel_key(), adapter))
                .collect(),
        }
    }

    pub fn with_default_adapters() -> Self {
        Self::new(all_adapters())
    }

    pub fn get(&self, channel: &ChannelKey) -> Option<&SiteAdapter> {
        self.adapters.get(channel)
    }

    /// Adapters ordered by channel key
    pub fn adapters(&self) -> Vec<&SiteAdapter> {
        let mut adapters: Vec<_> = self.adapters.values().collect();
        adapters.sort_by_cached_key(|adapter| adapter.channel_key().to_string());
        adapters
    }

    /// Adapter whose site hosts `link`
    pub fn for_link(&self, link: &str) -> Option<&SiteAdapter> {
        self.adapters().into_iter().find(|adapter| adapter.owns_link(link))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
