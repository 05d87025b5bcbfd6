use crate::core::{Dataset, RawRecord, Result};
use crate::domain::model::Identifier;
use crate::utils::error::IngestError;
use reqwest::Client;

/// Where one dataset comes from and which table it lands in.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    pub name: String,
    pub endpoint: String,
    pub table: Identifier,
}

pub struct ApiFetcher {
    client: Client,
    sources: Vec<DatasetSource>,
}

impl ApiFetcher {
    pub fn new(sources: Vec<DatasetSource>) -> Self {
        Self {
            client: Client::new(),
            sources,
        }
    }

    /// Fetches every dataset. Any failure fails the whole fetch; no partial result is returned.
    pub async fn fetch_all(&self) -> Result<Vec<Dataset>> {
        tracing::info!("Fetching {} datasets from API...", self.sources.len());

        let mut datasets = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            datasets.push(self.fetch_one(source).await?);
        }

        let summary = datasets
            .iter()
            .map(|d| format!("{} {}", d.len(), d.name))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!("Successfully fetched {}", summary);

        Ok(datasets)
    }

    async fn fetch_one(&self, source: &DatasetSource) -> Result<Dataset> {
        tracing::debug!("Making API request to: {}", source.endpoint);

        let network_error = |e: reqwest::Error| IngestError::NetworkError {
            endpoint: source.endpoint.clone(),
            source: e,
        };

        let response = self
            .client
            .get(&source.endpoint)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            return Err(IngestError::HttpStatusError {
                endpoint: source.endpoint.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(network_error)?;
        let records: Vec<RawRecord> =
            serde_json::from_slice(&body).map_err(|e| IngestError::InvalidPayloadError {
                endpoint: source.endpoint.clone(),
                source: e,
            })?;

        tracing::debug!("Fetched {} {} records", records.len(), source.name);

        Ok(Dataset {
            name: source.name.clone(),
            table: source.table.clone(),
            records,
        })
    }
}
