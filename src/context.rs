use crate::backend::Connection;
use crate::config::QueryConfig;
use crate::query::Query;
use std::fmt;
use std::sync::Arc;

/// Connection plus configuration, handed explicitly to every query.
#[derive(Clone)]
pub struct Context {
    connection: Arc<dyn Connection>,
    config: Arc<QueryConfig>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Context {
    pub fn new<C: Connection + 'static>(connection: C) -> Self {
        Self::from_arc(Arc::new(connection))
    }

    #[must_use]
    pub fn from_arc(connection: Arc<dyn Connection>) -> Self {
        Self { connection, config: Arc::new(QueryConfig::default()) }
    }

    #[must_use]
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// A query with no target yet; set one with [`Query::collection`].
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(self.clone(), None)
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Query {
        Query::new(self.clone(), Some(name.to_string()))
    }

    /// Alias of [`Context::collection`].
    #[must_use]
    pub fn from(&self, name: &str) -> Query {
        self.collection(name)
    }
}
