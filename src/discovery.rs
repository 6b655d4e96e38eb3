//! Syncthing endpoint discovery
//!
//! Reads the GUI address and API key out of Syncthing's `config.xml`.

use quick_xml::events::Event;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::DiscoveryError;

/// Where and how to reach the Syncthing REST API
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub api_key: String,
}

impl Endpoint {
    /// API key reduced to its last four characters, for logs and banners
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("***{}", tail)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &self.masked_key())
            .finish()
    }
}

/// Candidate `config.xml` locations, current platform's first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let home = dirs::home_dir();

    if cfg!(target_os = "macos") {
        if let Some(home) = &home {
            paths.push(home.join("Library/Application Support/Syncthing/config.xml"));
        }
    }
    if let Some(home) = &home {
        paths.push(home.join(".local/state/syncthing/config.xml"));
    }
    if let Some(state) = dirs::state_dir() {
        paths.push(state.join("syncthing/config.xml"));
    }
    if let Some(config) = dirs::config_dir() {
        paths.push(config.join("syncthing/config.xml"));
    }
    if !cfg!(target_os = "macos") {
        if let Some(home) = &home {
            paths.push(home.join("Library/Application Support/Syncthing/config.xml"));
        }
    }

    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    paths
}

/// First existing path among `candidates`; lists all of them if none exists.
pub fn find_config(candidates: Vec<PathBuf>) -> Result<PathBuf, DiscoveryError> {
    match candidates.iter().position(|p| p.exists()) {
        Some(index) => Ok(candidates[index].clone()),
        None => Err(DiscoveryError::NoneFound(candidates)),
    }
}

/// Locate Syncthing's config and extract the endpoint.
///
/// An explicit path is used as-is; otherwise the first existing default path
/// wins.
pub fn discover(explicit: Option<&Path>) -> Result<Endpoint, DiscoveryError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_config(default_config_paths())?,
    };

    if !path.exists() {
        return Err(DiscoveryError::NotFound(path));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| DiscoveryError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    tracing::debug!("Reading Syncthing config from {}", path.display());
    parse_config(&content)
}

/// Extract the endpoint from `config.xml` content.
pub fn parse_config(xml: &str) -> Result<Endpoint, DiscoveryError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut found_gui = false;
    let mut tls = false;
    let mut address: Option<String> = None;
    let mut api_key: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "gui" && stack.len() == 1 {
                    found_gui = true;
                    if let Ok(Some(attr)) = e.try_get_attribute("tls") {
                        tls = std::str::from_utf8(&attr.value)
                            .map(|v| v.eq_ignore_ascii_case("true"))
                            .unwrap_or(false);
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"gui" && stack.len() == 1 {
                    found_gui = true;
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                if stack.len() == 3 && stack[1] == "gui" {
                    let text = e
                        .unescape()
                        .map_err(|e| DiscoveryError::Invalid(format!("Failed to parse config.xml: {}", e)))?
                        .trim()
                        .to_string();
                    match stack[2].as_str() {
                        "address" => address = Some(text),
                        "apikey" => api_key = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DiscoveryError::Invalid(format!("Failed to parse config.xml: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    if !found_gui {
        return Err(DiscoveryError::Invalid("No <gui> element found in config.xml".to_string()));
    }

    match (address.filter(|a| !a.is_empty()), api_key.filter(|k| !k.is_empty())) {
        (Some(address), Some(api_key)) => Ok(Endpoint {
            base_url: normalize_address(&address, tls),
            api_key,
        }),
        _ => Err(DiscoveryError::Invalid(
            "Could not find URL or API key in config.xml".to_string(),
        )),
    }
}

fn normalize_address(address: &str, tls: bool) -> String {
    let url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else if tls {
        format!("https://{}", address)
    } else {
        format!("http://{}", address)
    };
    url.trim_end_matches('/').to_string()
}
