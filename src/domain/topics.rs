use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, ReferenceSource};

/// Thematic category a service can be filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: u32,
    pub name: String,
}

/// Topics list fixed at startup from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTopics(Vec<Topic>);

impl StaticTopics {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self(topics)
    }
}

#[async_trait]
impl ReferenceSource<Vec<Topic>> for StaticTopics {
    async fn load(&self) -> Result<Vec<Topic>, CacheError> {
        if self.0.is_empty() {
            return Err(CacheError::Load("no topics configured".to_string()));
        }
        Ok(self.0.clone())
    }
}
