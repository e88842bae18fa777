//! Cookie mirror for non-script session checks.

use crate::config::CookieConfig;
use std::collections::HashMap;
use std::sync::RwLock;

/// Write-through mirror of session keys as cookies.
///
/// Every key the token store persists is mirrored here so server-side
/// request handling can see session presence without executing client
/// code. The mirror is not a storage backend: it is never read back by the
/// session lifecycle itself, and its contents are advisory.
#[derive(Debug)]
pub struct CookieMirror {
    config: CookieConfig,
    // None marks a cleared cookie that still needs a Max-Age=0 header emitted.
    jar: RwLock<HashMap<String, Option<String>>>,
}

impl CookieMirror {
    /// Create a mirror with the given cookie attributes.
    pub fn new(config: CookieConfig) -> Self {
        Self {
            config,
            jar: RwLock::new(HashMap::new()),
        }
    }

    /// Mirror a key-value pair.
    pub fn set(&self, key: &str, value: &str) {
        self.jar
            .write()
            .unwrap()
            .insert(key.to_string(), Some(value.to_string()));
    }

    /// Expire a mirrored cookie.
    pub fn clear(&self, key: &str) {
        self.jar.write().unwrap().insert(key.to_string(), None);
    }

    /// Current mirrored value, if set.
    pub fn get(&self, key: &str) -> Option<String> {
        self.jar.read().unwrap().get(key).cloned().flatten()
    }

    /// `Set-Cookie` header value for one mirrored key.
    pub fn header_value(&self, key: &str) -> Option<String> {
        let jar = self.jar.read().unwrap();
        let entry = jar.get(key)?;
        Some(self.render(key, entry.as_deref()))
    }

    /// `Set-Cookie` header values for every mirrored key, cleared ones included.
    pub fn headers(&self) -> Vec<String> {
        let jar = self.jar.read().unwrap();
        let mut keys: Vec<&String> = jar.keys().collect();
        keys.sort();
        keys.iter()
            .map(|key| self.render(key, jar[*key].as_deref()))
            .collect()
    }

    fn render(&self, key: &str, value: Option<&str>) -> String {
        match value {
            Some(value) => format!(
                "{key}={value}; Path={}; Max-Age={}; SameSite={}",
                self.config.path,
                self.config.max_age.as_secs(),
                self.config.same_site.as_str(),
            ),
            None => format!(
                "{key}=; Path={}; Max-Age=0; SameSite={}",
                self.config.path,
                self.config.same_site.as_str(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_set_cookie_attributes() {
        let mirror = CookieMirror::new(CookieConfig::default());
        mirror.set("secret_safe_access_token", "abc");

        let header = mirror.header_value("secret_safe_access_token").unwrap();
        assert_eq!(
            header,
            "secret_safe_access_token=abc; Path=/; Max-Age=604800; SameSite=Lax"
        );
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let mirror = CookieMirror::new(CookieConfig::default());
        mirror.set("k", "v");
        mirror.clear("k");

        assert_eq!(mirror.get("k"), None);
        let header = mirror.header_value("k").unwrap();
        assert!(header.contains("Max-Age=0"));
    }
}
