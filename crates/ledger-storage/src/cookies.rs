//! Cookie jar for cookies set by the API.

use crate::StorageResult;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// A stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lowercase domain without a leading dot.
    pub domain: String,
    /// Set without a `Domain` attribute; only sent back to the exact host.
    pub host_only: bool,
    pub path: String,
}

impl Cookie {
    /// Whether this cookie is sent to `host`.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = normalize_domain(host);
        if self.host_only {
            return host == self.domain;
        }
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Dot-prefixed ancestor suffixes of `host`, nearest first.
///
/// `a.b.example.com` yields `.b.example.com`, `.example.com`, `.com`. The
/// number of candidates is bounded by the label count.
pub fn ancestor_domains(host: &str) -> Vec<String> {
    let host = normalize_domain(host);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    (1..labels.len())
        .map(|i| format!(".{}", labels[i..].join(".")))
        .collect()
}

/// Cookie storage, optionally mirrored to a JSON file.
pub struct CookieJar {
    path: Option<PathBuf>,
    cookies: Mutex<Vec<Cookie>>,
}

impl CookieJar {
    /// Jar that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cookies: Mutex::new(Vec::new()),
        }
    }

    /// Jar mirrored to `path`. A missing or malformed file yields an empty jar.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let cookies = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Cookie jar is corrupt, starting empty");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            cookies: Mutex::new(cookies),
        })
    }

    fn save(&self, cookies: &[Cookie]) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(cookies)?)?;
        Ok(())
    }

    /// Record a `Set-Cookie` header received from `host`.
    ///
    /// A header with `Max-Age<=0` or an `Expires` in the past deletes the
    /// matching cookie instead.
    pub fn store_set_cookie(&self, host: &str, header: &str) -> StorageResult<()> {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            debug!("Ignoring malformed Set-Cookie header");
            return Ok(());
        };
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }

        let mut domain = None;
        let mut path = "/".to_string();
        let mut expired = false;
        for attribute in parts {
            let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
            match key.trim().to_ascii_lowercase().as_str() {
                "domain" if !val.trim().is_empty() => domain = Some(normalize_domain(val)),
                "path" if !val.trim().is_empty() => path = val.trim().to_string(),
                "max-age" => expired |= val.trim().parse::<i64>().map_or(false, |age| age <= 0),
                "expires" => {
                    expired |= DateTime::parse_from_rfc2822(val.trim())
                        .map_or(false, |at| at.with_timezone(&Utc) <= Utc::now())
                }
                _ => {}
            }
        }

        let cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            host_only: domain.is_none(),
            domain: domain.unwrap_or_else(|| normalize_domain(host)),
            path,
        };

        let mut cookies = self.cookies.lock();
        cookies.retain(|c| {
            !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
        });
        if !expired {
            cookies.push(cookie);
        }
        self.save(&cookies)
    }

    /// `Cookie` header value for a request to `host`, if any cookie applies.
    pub fn header_for(&self, host: &str) -> Option<String> {
        let cookies = self.cookies.lock();
        let pairs: Vec<String> = cookies
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Names of every cookie visible to `host`.
    pub fn names_for(&self, host: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .cookies
            .lock()
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Expire `name` for one domain scope.
    ///
    /// `None` targets the host-only cookie for `host`; `Some(domain)` targets a
    /// cookie set with that `Domain` attribute (leading dot ignored).
    pub fn expire(&self, name: &str, host: &str, domain: Option<&str>) -> StorageResult<usize> {
        let mut cookies = self.cookies.lock();
        let before = cookies.len();
        let host = normalize_domain(host);
        cookies.retain(|c| {
            if c.name != name {
                return true;
            }
            match domain {
                None => !(c.host_only && c.domain == host),
                Some(d) => c.domain != normalize_domain(d),
            }
        });
        let removed = before - cookies.len();
        if removed > 0 {
            self.save(&cookies)?;
        }
        Ok(removed)
    }

    /// Every stored cookie.
    pub fn all(&self) -> Vec<Cookie> {
        self.cookies.lock().clone()
    }

    /// Remove every cookie.
    pub fn clear(&self) -> StorageResult<usize> {
        let mut cookies = self.cookies.lock();
        let removed = cookies.len();
        cookies.clear();
        self.save(&cookies)?;
        Ok(removed)
    }
}
