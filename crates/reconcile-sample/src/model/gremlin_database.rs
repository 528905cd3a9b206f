use serde::{Deserialize, Serialize};

/// A Gremlin database inside a Cosmos DB account.
///
/// `name`, `resource_group_name` and `account_name` form the identifier and can't be
/// changed in place. `throughput` lives on a separate settings sub-resource, which only
/// exists if the database was created with a throughput.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GremlinDatabase {
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<u32>,
}

impl GremlinDatabase {
    pub fn new(
        name: impl Into<String>,
        resource_group_name: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            account_name: account_name.into(),
            throughput: None,
        }
    }

    pub fn with_throughput(mut self, throughput: u32) -> Self {
        self.throughput = Some(throughput);
        self
    }
}
