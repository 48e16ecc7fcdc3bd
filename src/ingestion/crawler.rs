//! Remote mirror crawler (C1, spec §4.1). Traverses a tree of Apache/nginx
//! style HTML directory index pages, breadth-first, filtering by accept
//! globs and consulting the fingerprint map.

use chrono::Utc;
use glob::Pattern;
use reqwest::Client;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::IngestionConfig;
use crate::error::IngestError;
use crate::ingestion::fingerprint::FingerprintMap;

/// One listing entry confirmed to need (re-)download.
#[derive(Debug, Clone)]
pub struct RemoteCandidate {
    pub remote_path: String,
    pub url: String,
    pub size: u64,
    pub last_modified: String,
}

/// One downloaded file, ready for C2.
pub struct DownloadedFile {
    pub candidate: RemoteCandidate,
    pub bytes: Vec<u8>,
    pub content_hash: String,
}

pub struct Crawler {
    client: Client,
    accept_globs: Vec<Pattern>,
    config: IngestionConfig,
}

impl Crawler {
    pub fn new(config: &IngestionConfig) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.per_file_timeout_s))
            .build()
            .map_err(|e| IngestError::Fetch { url: "<client build>".to_string(), source: e })?;

        let accept_globs = config
            .accept_globs
            .iter()
            .map(|g| Pattern::new(g))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IngestError::ListingUnparsable { url: format!("bad glob: {e}") })?;

        Ok(Self { client, accept_globs, config: config.clone() })
    }

    fn accepts(&self, file_name: &str) -> bool {
        self.accept_globs.iter().any(|p| p.matches(file_name))
    }

    /// Breadth-first discovery of candidates under `root_url`, stopping once
    /// `budget` candidates are found or the tree is exhausted.
    pub async fn discover(
        &self,
        root_url: &str,
        fingerprints: &FingerprintMap,
        budget: usize,
    ) -> Result<Vec<RemoteCandidate>, IngestError> {
        let mut found = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(root_url.trim_end_matches('/').to_string());

        let href_selector = Selector::parse("a").expect("static selector");
        let deadline = Instant::now() + Duration::from_secs(self.config.tick_wall_clock_s);

        while let Some(dir_url) = queue.pop_front() {
            if found.len() >= budget {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!("directory crawl stopped: tick wall-clock budget exhausted");
                break;
            }

            let listing = match self.fetch_with_retry(&dir_url, self.config.retry_max).await {
                Ok(body) => body,
                Err(IngestError::Fetch { url, .. }) => {
                    tracing::warn!(url = %url, "directory listing fetch failed, skipping subtree");
                    continue;
                },
                Err(e) => return Err(e),
            };

            let document = Html::parse_document(&listing);
            for element in document.select(&href_selector) {
                let Some(href) = element.value().attr("href") else { continue };
                if href.starts_with('?') || href.starts_with('/') || href == "../" {
                    continue;
                }

                let child_url = format!("{dir_url}/{}", href.trim_end_matches('/'));
                let file_name = href.trim_end_matches('/').to_string();

                if href.ends_with('/') {
                    queue.push_back(child_url);
                    continue;
                }

                if !self.accepts(&file_name) {
                    continue;
                }

                // Size/last-modified columns sit as sibling text nodes after
                // `</a>` in autoindex rows, not inside the anchor itself.
                let row_text = element
                    .parent()
                    .map(|parent| {
                        parent
                            .descendants()
                            .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default();
                let (size, last_modified) = parse_listing_row_metadata(&row_text);
                let remote_path = child_url
                    .strip_prefix(root_url.trim_end_matches('/'))
                    .unwrap_or(&child_url)
                    .trim_start_matches('/')
                    .to_string();

                if fingerprints.needs_download(&remote_path, size, &last_modified) {
                    found.push(RemoteCandidate { remote_path, url: child_url, size, last_modified });
                    if found.len() >= budget {
                        break;
                    }
                }
            }
        }

        Ok(found)
    }

    pub async fn download(&self, candidate: RemoteCandidate) -> Result<DownloadedFile, IngestError> {
        let bytes = self.fetch_bytes_with_retry(&candidate.url, self.config.retry_max).await?;
        let content_hash = format!("{:x}", Sha256::digest(&bytes));
        Ok(DownloadedFile { candidate, bytes, content_hash })
    }

    async fn fetch_with_retry(&self, url: &str, retry_max: u32) -> Result<String, IngestError> {
        let bytes = self.fetch_bytes_with_retry(url, retry_max).await?;
        String::from_utf8(bytes)
            .map_err(|_| IngestError::ListingUnparsable { url: url.to_string() })
    }

    /// `backoff_base_s * 2^attempt`, capped by `retry_max` attempts (spec §4.1).
    async fn fetch_bytes_with_retry(&self, url: &str, retry_max: u32) -> Result<Vec<u8>, IngestError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(|e| IngestError::Fetch { url: url.to_string(), source: e });
                },
                Ok(resp) if resp.status().is_client_error() => {
                    return Err(IngestError::ListingUnparsable { url: format!("{url} ({})", resp.status()) });
                },
                Ok(resp) if attempt >= retry_max => {
                    return Err(IngestError::ListingUnparsable {
                        url: format!("{url} gave up after {attempt} retries, last status {}", resp.status()),
                    });
                },
                Err(e) if attempt >= retry_max => {
                    return Err(IngestError::Fetch { url: url.to_string(), source: e });
                },
                _ => {
                    let backoff_s = self.config.backoff_base_s.saturating_mul(2u64.saturating_pow(attempt));
                    tracing::debug!(url, attempt, backoff_s, "retrying after transient error");
                    tokio::time::sleep(Duration::from_secs(backoff_s)).await;
                    attempt += 1;
                },
            }
        }
    }
}

/// Best-effort extraction of "size last-modified" from an autoindex row's
/// text content; falls back to placeholders when the server omits them.
fn parse_listing_row_metadata(row_text: &str) -> (u64, String) {
    let size = row_text
        .split_whitespace()
        .find_map(|tok| tok.parse::<u64>().ok())
        .unwrap_or(0);
    let last_modified = row_text.trim().to_string();
    let last_modified = if last_modified.is_empty() {
        Utc::now().to_rfc3339()
    } else {
        last_modified
    };
    (size, last_modified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_glob_matches_file_name_only_not_path() {
        let crawler = Crawler {
            client: Client::new(),
            accept_globs: vec![Pattern::new("*_prof.nc").unwrap()],
            config: IngestionConfig::default(),
        };
        assert!(crawler.accepts("1900_prof.nc"));
        assert!(!crawler.accepts("1900_prof.bin"));
    }

    #[test]
    fn listing_row_metadata_falls_back_when_absent() {
        let (size, _lm) = parse_listing_row_metadata("");
        assert_eq!(size, 0);
    }
}
