#![allow(clippy::must_use_candidate)]

use lookout_core::{Category, ServiceAdapter, ServiceId};
use serde::{Deserialize, Serialize};

/// Selects which registered adapters take part in a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterFilter {
    #[default]
    All,
    /// Adapters in any of the listed categories. An empty list selects all.
    Categories(Vec<Category>),
    Specific(Vec<ServiceId>),
}

impl AdapterFilter {
    pub fn matches(&self, adapter: &dyn ServiceAdapter) -> bool {
        match self {
            AdapterFilter::All => true,
            AdapterFilter::Categories(categories) => {
                categories.is_empty() || categories.contains(&adapter.category())
            }
            AdapterFilter::Specific(ids) => ids.contains(adapter.service_id()),
        }
    }
}

impl From<Vec<Category>> for AdapterFilter {
    fn from(categories: Vec<Category>) -> Self {
        AdapterFilter::Categories(categories)
    }
}
