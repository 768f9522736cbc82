// src/upstream.rs

//! Upstream archive downloads and version detection
//!
//! Downloads are plain blocking GETs (redirects followed, no retries, no
//! overall timeout) since release tarballs can be large and slow mirrors
//! are common.

use crate::error::{Error, Result};
use crate::parse::parse_version;
use crate::run::Cmd;
use crate::version::Version;
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

/// Connect timeout for upstream servers
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Release archive link in an HTML listing, capturing the version
static RE_ARCHIVE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+-(\d[^-]+)\.tar\..*").unwrap());

/// `<a href="...">text</a>` in an HTML listing
static RE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']?([^"'\s>]*)["']?[^>]*>(.*?)</a>"#).unwrap()
});

static RE_DISPOSITION_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filename=(.+)").unwrap());

/// HTTP client for upstream archives, signatures and listings
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .user_agent(concat!("apkg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidUsage(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Response> {
        self.client.get(url).send().map_err(|e| Error::FileDownloadFailed {
            code: None,
            url: url.to_string(),
            reason: Some(e.to_string()),
        })
    }

    /// Download a release archive into `dest_dir`
    ///
    /// Only `200 OK` with an `application/*` content type is accepted. The
    /// file name comes from `Content-Disposition` when present, else the
    /// URL tail.
    pub fn download_archive(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        info!("downloading archive: {}", url);
        let response = self.get(url)?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(Error::FileDownloadFailed {
                code: Some(status.as_u16()),
                url: url.to_string(),
                reason: None,
            });
        }

        let content_type = header_str(&response, CONTENT_TYPE.as_str());
        if !content_type.starts_with("application/") {
            return Err(Error::FileDownloadFailed {
                code: None,
                url: url.to_string(),
                reason: Some(format!("invalid content-type \"{content_type}\"")),
            });
        }

        let mut file_name = url_file_name(url).to_string();
        let disposition = header_str(&response, CONTENT_DISPOSITION.as_str());
        if let Some(name) = disposition_file_name(&disposition) {
            if !is_plain_file_name(&name) {
                return Err(Error::FileDownloadFailed {
                    code: None,
                    url: url.to_string(),
                    reason: Some(format!("invalid Content-Disposition file name \"{name}\"")),
                });
            }
            debug!("archive file name from HTTP Content-Disposition: {}", name);
            file_name = name;
        }

        let path = dest_dir.join(&file_name);
        info!("saving archive to: {}", path.display());
        save_response(response, &path, url)?;
        Ok(path)
    }

    /// Download an auxiliary file such as a detached signature
    pub fn download_file(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        info!("downloading file: {}", url);
        let response = self.get(url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FileDownloadFailed {
                code: Some(status.as_u16()),
                url: url.to_string(),
                reason: None,
            });
        }
        let path = dest_dir.join(url_file_name(url));
        info!("saving file to: {}", path.display());
        save_response(response, &path, url)?;
        Ok(path)
    }

    /// Fetch a page as text
    pub fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FileDownloadFailed {
                code: Some(status.as_u16()),
                url: url.to_string(),
                reason: None,
            });
        }
        response.text().map_err(|e| Error::FileDownloadFailed {
            code: None,
            url: url.to_string(),
            reason: Some(e.to_string()),
        })
    }

    /// Latest version of archives linked from an HTML listing
    pub fn version_from_listing(&self, listing_url: &str) -> Result<Option<Version>> {
        debug!("getting upstream version from HTML listing: {}", listing_url);
        let html = self.get_text(listing_url)?;
        Ok(max_listing_version(&html))
    }
}

fn header_str(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn save_response(mut response: Response, path: &Path, url: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    io::copy(&mut response, &mut file).map_err(|e| Error::FileDownloadFailed {
        code: None,
        url: url.to_string(),
        reason: Some(e.to_string()),
    })?;
    Ok(())
}

/// Last path component of a URL
pub fn url_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn disposition_file_name(disposition: &str) -> Option<String> {
    let caps = RE_DISPOSITION_FILENAME.captures(disposition)?;
    let name = caps[1].trim_matches(|c| c == ' ' || c == '"');
    (!name.is_empty()).then(|| name.to_string())
}

/// Whether a server supplied name is a single path component
fn is_plain_file_name(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .is_some_and(|n| n.to_str() == Some(name))
}

/// Highest version among archive links in an HTML listing
pub fn max_listing_version(html: &str) -> Option<Version> {
    let mut max: Option<Version> = None;
    for link in RE_LINK.captures_iter(html) {
        let href = url_file_name(&link[1]);
        let text = link[2].trim();
        for candidate in [text, href] {
            let Some(caps) = RE_ARCHIVE_VERSION.captures(candidate) else {
                continue;
            };
            if let Ok(v) = Version::parse(&caps[1])
                && max.as_ref().is_none_or(|m| v > *m)
            {
                max = Some(v);
            }
        }
    }
    max
}

/// Upstream version from the last stdout line of a script
pub fn version_from_script(script: &Path, cwd: &Path) -> Result<Version> {
    debug!("getting upstream version from script: {}", script.display());
    let out = Cmd::new(script).cwd(cwd).output()?;
    let line = out.last_line().ok_or_else(|| {
        Error::UnexpectedCommandOutput(format!(
            "version script printed nothing: {}",
            script.display()
        ))
    })?;
    Version::parse(parse_version(line))
}
