use crate::core::fetcher::DatasetSource;
use crate::domain::model::Identifier;
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Dataset list loaded from a TOML file:
///
/// ```toml
/// [[dataset]]
/// name = "posts"
/// endpoint = "${API_BASE}/posts"
/// table = "POSTS"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetFile {
    pub dataset: Vec<DatasetSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub endpoint: String,
    pub table: String,
}

impl DatasetSpec {
    pub fn resolve(&self) -> Result<DatasetSource> {
        Ok(DatasetSource {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            table: Identifier::new(self.table.as_str())?,
        })
    }
}

impl DatasetFile {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let file = Self::from_toml_str(&content)?;
        file.validate()?;
        Ok(file)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IngestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_BASE})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| IngestError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_specs(specs: &[DatasetSpec]) -> Result<()> {
        if specs.is_empty() {
            return Err(IngestError::ConfigValidationError {
                field: "dataset".to_string(),
                message: "at least one dataset is required".to_string(),
            });
        }

        for (index, spec) in specs.iter().enumerate() {
            validation::validate_non_empty_string(&format!("dataset[{}].name", index), &spec.name)?;
            validation::validate_url(&format!("dataset[{}].endpoint", index), &spec.endpoint)?;
            validation::validate_identifier(&spec.table)?;
        }

        validation::validate_unique("dataset.name", specs.iter().map(|s| s.name.as_str()))?;
        validation::validate_unique("dataset.table", specs.iter().map(|s| s.table.as_str()))?;

        Ok(())
    }
}

impl Validate for DatasetFile {
    fn validate(&self) -> Result<()> {
        Self::validate_specs(&self.dataset)
    }
}
