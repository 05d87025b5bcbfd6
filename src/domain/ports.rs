use crate::domain::model::{Namespace, Statement};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Opens connections to a SQL warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    type Connection: WarehouseConnection;

    async fn connect(&self) -> Result<Self::Connection>;
}

/// A live warehouse session. `close` consumes the session, so it can run at most once.
#[async_trait]
pub trait WarehouseConnection: Send {
    /// Database and schema the session was opened against.
    fn namespace(&self) -> &Namespace;

    async fn execute(&mut self, statement: &Statement) -> Result<()>;

    async fn close(self) -> Result<()>;
}
