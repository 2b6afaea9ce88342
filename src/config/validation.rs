use crate::config::types::{Config, FetchConfig, JobEntry, OutputConfig, ProxyConfig};
use crate::ConfigError;
use std::collections::HashSet;
use std::path::Component;
use url::Url;

/// Upper bound on `max-retries`
const MAX_RETRIES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    if let Some(proxy) = &config.proxy {
        validate_proxy_config(proxy)?;
    }
    validate_output_config(&config.output)?;
    validate_jobs(&config.jobs)?;
    Ok(())
}

/// Validates timeout and retry settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max-retries must be at most {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if let Some(bad) = config
        .skip_suffixes
        .iter()
        .find(|s| s.is_empty() || s.contains('.') || s.contains('/'))
    {
        return Err(ConfigError::Validation(format!(
            "skip-suffixes entries must be bare extensions, got '{}'",
            bad
        )));
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for (scheme, proxy) in [("http", &config.http), ("https", &config.https)] {
        if let Some(proxy) = proxy {
            Url::parse(proxy)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} proxy '{}': {}", scheme, proxy, e)))?;
        }
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation("output root cannot be empty".to_string()));
    }

    if config.index.as_os_str().is_empty() {
        return Err(ConfigError::Validation("output index cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates every job and their names' uniqueness
fn validate_jobs(jobs: &[JobEntry]) -> Result<(), ConfigError> {
    if jobs.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[job]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for job in jobs {
        if !names.insert(job.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate job name '{}'",
                job.name
            )));
        }
        validate_job(job)?;
    }

    Ok(())
}

fn validate_job(job: &JobEntry) -> Result<(), ConfigError> {
    if job.name.trim().is_empty() {
        return Err(ConfigError::Validation("job name cannot be empty".to_string()));
    }

    let url = Url::parse(&job.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Job '{}': invalid url '{}': {}", job.name, job.url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Job '{}': url must be http or https, got '{}'",
            job.name, job.url
        )));
    }

    if job.save_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Job '{}': save-dir cannot be empty",
            job.name
        )));
    }

    if job
        .save_dir
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ConfigError::Validation(format!(
            "Job '{}': save-dir must be a relative path inside the output root, got '{}'",
            job.name,
            job.save_dir.display()
        )));
    }

    if job.sheet_name().trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Job '{}': sheet cannot be empty",
            job.name
        )));
    }

    match &job.page_marker {
        Some(_) if job.site.is_bulletin() => {
            return Err(ConfigError::Validation(format!(
                "Job '{}': bulletin jobs are crawled by issue and take no page-marker",
                job.name
            )));
        }
        Some(marker) => {
            if marker.prefix.is_empty() || marker.suffix.is_empty() || marker.delimiter.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Job '{}': page-marker prefix, suffix and delimiter must be non-empty",
                    job.name
                )));
            }
        }
        None => {}
    }

    Ok(())
}
