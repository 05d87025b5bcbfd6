use crate::core::fetcher::ApiFetcher;
use crate::core::loader::load_dataset;
use crate::core::{Dataset, IngestReport, Result, Warehouse, WarehouseConnection};
use crate::domain::model::DatasetReport;

/// Runs fetch, connect, load and disconnect, strictly in that order.
pub struct IngestEngine<W: Warehouse> {
    fetcher: ApiFetcher,
    warehouse: W,
}

impl<W: Warehouse> IngestEngine<W> {
    pub fn new(fetcher: ApiFetcher, warehouse: W) -> Self {
        Self { fetcher, warehouse }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub async fn run(&self) -> Result<IngestReport> {
        tracing::info!("Starting ingestion...");

        let datasets = match self.fetcher.fetch_all().await {
            Ok(datasets) => datasets,
            Err(e) => {
                tracing::error!("An error occurred while fetching data: {}", e);
                tracing::error!("Halting execution due to data fetching failure.");
                return Err(e);
            }
        };

        tracing::info!("Connecting to warehouse...");
        let mut conn = self.warehouse.connect().await?;
        tracing::info!("Connection successful!");

        let loaded = Self::load_all(&mut conn, &datasets).await;

        // 無論載入成功與否都要關閉連線
        let closed = conn.close().await;
        match &closed {
            Ok(()) => tracing::info!("Warehouse connection closed."),
            Err(e) => tracing::warn!("Closing the warehouse connection failed: {}", e),
        }

        let report = loaded?;
        closed?;
        Ok(report)
    }

    async fn load_all(conn: &mut W::Connection, datasets: &[Dataset]) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for dataset in datasets {
            let outcome = load_dataset(conn, dataset).await?;
            report.datasets.push(DatasetReport {
                dataset: dataset.name.clone(),
                table: dataset.table.to_string(),
                outcome,
            });
        }

        Ok(report)
    }
}
