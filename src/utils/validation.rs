use crate::utils::error::{IngestError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Snowflake allows 255 characters for an unquoted identifier.
pub const MAX_IDENTIFIER_LEN: usize = 255;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(IngestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(IngestError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(IngestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| IngestError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(IngestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is a valid regex")
    })
}

/// Allow-list check for names that get spliced into SQL text.
pub fn validate_identifier(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(IngestError::InvalidIdentifierError {
            value: value.to_string(),
            reason: "identifier cannot be empty".to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(IngestError::InvalidIdentifierError {
            value: value.to_string(),
            reason: format!("identifier longer than {} characters", MAX_IDENTIFIER_LEN),
        });
    }

    if !identifier_pattern().is_match(value) {
        return Err(IngestError::InvalidIdentifierError {
            value: value.to_string(),
            reason: "only letters, digits, '_' and '$' are allowed, and it must not start with a digit"
                .to_string(),
        });
    }

    Ok(())
}

pub fn validate_unique<'a, I>(field_name: &str, values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value.to_ascii_uppercase()) {
            return Err(IngestError::ConfigValidationError {
                field: field_name.to_string(),
                message: format!("duplicate value '{}'", value),
            });
        }
    }
    Ok(())
}
