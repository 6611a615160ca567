//! Propagation of a changed environment variable into dependent declarations
//!
//! Env files declare values such as `URL=http://${HOST}:8080`. When `HOST`
//! changes at runtime, [`EnvInterpolator::propagate`] re-reads the declared
//! files and rewrites every variable whose raw declaration references `HOST`,
//! substituting the new value.
//!
//! References take the forms `$NAME` and `${NAME}`. The bare form is
//! word-bounded, so changing `HOST` leaves `$HOSTNAME` alone. Propagation is
//! one level deep: if `B` references `A` and `C` references `B`, changing `A`
//! rewrites `B` but not `C`.

use std::path::PathBuf;

use indexmap::IndexMap;
use regex::{NoExpand, Regex};

use crate::dotenv;
use crate::environment::EnvironmentStore;
use crate::error::{Error, Result};

/// Rewrites environment variables declared in env files
pub struct EnvInterpolator<'a> {
    env_file_paths: &'a [PathBuf],
    env: &'a dyn EnvironmentStore,
}

impl<'a> EnvInterpolator<'a> {
    /// Create an interpolator over the given files, writing into `env`
    pub fn new(env_file_paths: &'a [PathBuf], env: &'a dyn EnvironmentStore) -> Self {
        Self {
            env_file_paths,
            env,
        }
    }

    /// Raw declarations of every existing env file, merged so that the first
    /// file declaring a name wins
    ///
    /// Files that do not exist are skipped. A file that exists but cannot be
    /// read is an error.
    pub fn declarations(&self) -> Result<IndexMap<String, String>> {
        let mut merged = IndexMap::new();

        for path in self.env_file_paths {
            if !path.exists() {
                log::trace!("Skipping missing env file '{}'", path.display());
                continue;
            }

            let bytes = std::fs::read(path).map_err(|e| Error::io(path, &e))?;
            for (name, raw) in dotenv::parse(&String::from_utf8_lossy(&bytes)) {
                merged.entry(name).or_insert(raw);
            }
        }

        Ok(merged)
    }

    /// Substitute `new_value` for references to `changed_name` in every
    /// declaration that has one, and write the results to the environment
    ///
    /// Returns the names that were rewritten, in declaration order.
    pub fn propagate(&self, changed_name: &str, new_value: &str) -> Result<Vec<String>> {
        if changed_name.is_empty() {
            return Ok(Vec::new());
        }

        let declarations = self.declarations()?;
        let pattern = reference_pattern(changed_name)?;
        let mut rewritten = Vec::new();

        for (name, raw) in &declarations {
            if !pattern.is_match(raw) {
                continue;
            }

            let value = pattern.replace_all(raw, NoExpand(new_value));
            self.env.set_var(name, &value);
            log::debug!("Rewrote '{}' after '{}' changed", name, changed_name);
            rewritten.push(name.clone());
        }

        Ok(rewritten)
    }
}

/// Pattern matching `${name}` or a word-bounded `$name`
pub fn reference_pattern(name: &str) -> Result<Regex> {
    let escaped = regex::escape(name);
    let boundary = match name.chars().last() {
        Some(c) if c.is_alphanumeric() || c == '_' => r"\b",
        _ => "",
    };

    Regex::new(&format!(r"\$\{{{}\}}|\${}{}", escaped, escaped, boundary))
        .map_err(|e| Error::parse(e.to_string()).with_path(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reference_pattern_forms() {
        let pattern = reference_pattern("HOST").unwrap();

        assert!(pattern.is_match("$HOST"));
        assert!(pattern.is_match("${HOST}"));
        assert!(pattern.is_match("http://$HOST:80"));
        assert!(pattern.is_match("$HOST.internal"));
        assert!(!pattern.is_match("$HOSTNAME"));
        assert!(!pattern.is_match("${HOSTNAME}"));
        assert!(!pattern.is_match("$HOST_2"));
        assert!(!pattern.is_match("HOST"));
    }

    #[test]
    fn test_reference_pattern_escapes_name() {
        let pattern = reference_pattern("db.host").unwrap();

        assert!(pattern.is_match("${db.host}"));
        assert!(!pattern.is_match("${dbxhost}"));
    }

    #[test]
    fn test_propagates_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.env", "HOST=service\n");
        let b = write(dir.path(), "b.env", "URL=http://${HOST}:8080\n");
        let env: MemoryEnvironment = [("HOST", "service"), ("URL", "http://service:8080")]
            .into_iter()
            .collect();
        let paths = vec![a, b];

        let rewritten = EnvInterpolator::new(&paths, &env)
            .propagate("HOST", "newservice")
            .unwrap();

        assert_eq!(rewritten, vec!["URL".to_string()]);
        assert_eq!(env.var("URL"), Some("http://newservice:8080".to_string()));
        // The changed variable itself belongs to the caller
        assert_eq!(env.var("HOST"), Some("service".to_string()));
    }

    #[test]
    fn test_substitutes_every_occurrence_in_both_forms() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), ".env", "PAIR=$HOST,${HOST},$HOSTNAME\n");
        let env = MemoryEnvironment::new();
        let paths = vec![file];

        EnvInterpolator::new(&paths, &env).propagate("HOST", "h").unwrap();

        assert_eq!(env.var("PAIR"), Some("h,h,$HOSTNAME".to_string()));
    }

    #[test]
    fn test_replacement_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), ".env", "DSN=pg://u:${PASS}@db\n");
        let env = MemoryEnvironment::new();
        let paths = vec![file];

        EnvInterpolator::new(&paths, &env).propagate("PASS", "p$1${x}").unwrap();

        assert_eq!(env.var("DSN"), Some("pg://u:p$1${x}@db".to_string()));
    }

    #[test]
    fn test_first_declaring_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let local = write(dir.path(), ".env.local", "URL=https://${HOST}\n");
        let base = write(dir.path(), ".env", "URL=http://${HOST}\nOTHER=${HOST}/x\n");
        let env = MemoryEnvironment::new();
        let paths = vec![local, base];

        let rewritten = EnvInterpolator::new(&paths, &env)
            .propagate("HOST", "example.com")
            .unwrap();

        assert_eq!(rewritten, vec!["URL".to_string(), "OTHER".to_string()]);
        assert_eq!(env.var("URL"), Some("https://example.com".to_string()));
        assert_eq!(env.var("OTHER"), Some("example.com/x".to_string()));
    }

    #[test]
    fn test_not_transitive() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), ".env", "A=1\nB=${A}-b\nC=${B}-c\n");
        let env = MemoryEnvironment::new();
        let paths = vec![file];

        let rewritten = EnvInterpolator::new(&paths, &env).propagate("A", "2").unwrap();

        assert_eq!(rewritten, vec!["B".to_string()]);
        assert_eq!(env.var("B"), Some("2-b".to_string()));
        assert_eq!(env.var("C"), None);
    }

    #[test]
    fn test_other_references_stay_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), ".env", "URL=http://${HOST}:${PORT}\n");
        let env = MemoryEnvironment::new();
        let paths = vec![file];

        EnvInterpolator::new(&paths, &env).propagate("HOST", "h").unwrap();

        assert_eq!(env.var("URL"), Some("http://h:${PORT}".to_string()));
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = write(dir.path(), ".env", "URL=${HOST}/api\n");
        let paths = vec![dir.path().join("missing.env"), present];
        let env = MemoryEnvironment::new();

        let rewritten = EnvInterpolator::new(&paths, &env).propagate("HOST", "h").unwrap();

        assert_eq!(rewritten, vec!["URL".to_string()]);
    }

    #[test]
    fn test_all_files_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("a.env"), dir.path().join("b.env")];
        let env = MemoryEnvironment::new();

        let rewritten = EnvInterpolator::new(&paths, &env).propagate("HOST", "h").unwrap();

        assert!(rewritten.is_empty());
        assert!(env.vars().is_empty());
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file
        let paths = vec![dir.path().to_path_buf()];
        let env = MemoryEnvironment::new();

        let err = EnvInterpolator::new(&paths, &env)
            .propagate("HOST", "h")
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn test_empty_name_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), ".env", "PRICE=$5\n");
        let env = MemoryEnvironment::new();
        let paths = vec![file];

        let rewritten = EnvInterpolator::new(&paths, &env).propagate("", "x").unwrap();

        assert!(rewritten.is_empty());
    }
}
