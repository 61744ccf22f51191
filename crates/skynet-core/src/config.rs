//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RANKING__TOP_DOCS=8`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::RoleWeights;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir()?;
        Self::load_from(&cwd)
    }

    /// Load `config.toml` and the environment overlay found in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    /// Wrap an explicit figment, e.g. one assembled in a test.
    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }

    /// Typed view of the whole configuration, validated.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub ranking: RankingSettings,
    /// Role name -> section name -> weight. Rows given here replace the built-in rows.
    pub weights: HashMap<String, HashMap<String, f32>>,
    /// Role name -> boost rules. Roles given here replace the built-in rules.
    pub boost: HashMap<String, Vec<BoostRuleSettings>>,
    pub tree: TreeSettings,
    pub embedding: EmbeddingSettings,
    pub summary: SummarySettings,
    pub followups: FollowupSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.ranking.top_docs == 0 || self.ranking.top_chunks == 0 {
            return Err(Error::InvalidConfig("ranking.top_docs and ranking.top_chunks must be positive".into()));
        }
        if self.tree.max_depth == 0 || self.tree.root_k < 2 || self.tree.inner_k < 2 {
            return Err(Error::InvalidConfig("tree.max_depth must be positive and tree.root_k / tree.inner_k at least 2".into()));
        }
        for (role, rules) in &self.boost {
            if let Some(rule) = rules.iter().find(|r| r.per_match < 0.0 || !r.per_match.is_finite()) {
                return Err(Error::InvalidConfig(format!("boost rule '{}' for {role} has negative per_match", rule.pattern)));
            }
        }
        self.role_weights().map(|_| ())
    }

    /// Built-in role weights with configured rows applied on top.
    pub fn role_weights(&self) -> Result<RoleWeights> {
        let mut weights = RoleWeights::default();
        weights.merge(RoleWeights::from_named(&self.weights)?);
        Ok(weights)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub embeddings_path: String,
    /// Defaults to the embeddings path with `.npy` replaced by `_chunks.jsonl`.
    pub metadata_path: Option<String>,
    /// When set, a corpus with a different vector dimension is rejected at load.
    pub expected_dim: Option<usize>,
}

impl CorpusSettings {
    pub fn embeddings_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.embeddings_path) }

    pub fn metadata_path(&self, base: &Path) -> PathBuf {
        match &self.metadata_path {
            Some(p) => resolve_with_base(base, p),
            None => crate::corpus::metadata_path_for(&self.embeddings_path(base)),
        }
    }
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { embeddings_path: "models/embeddings.npy".to_string(), metadata_path: None, expected_dim: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub top_docs: usize,
    pub top_chunks: usize,
    /// Chunk previews shown per document in search responses.
    pub preview_chunks: usize,
}

impl Default for RankingSettings {
    fn default() -> Self { Self { top_docs: 5, top_chunks: 50, preview_chunks: 3 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostRuleSettings {
    pub pattern: String,
    pub per_match: f32,
    pub max_matches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    pub max_depth: usize,
    pub min_leaf: usize,
    pub root_k: usize,
    pub inner_k: usize,
    pub seed: u64,
    pub max_iter: usize,
    pub label_terms: usize,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self { max_depth: 3, min_leaf: 20, root_k: 7, inner_k: 4, seed: 42, max_iter: 100, label_terms: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `openai` or `fake`.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_chunks_per_doc: usize,
    pub temperature: f32,
    pub per_doc_max_tokens: u32,
    pub final_max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_chunks_per_doc: 3,
            temperature: 0.0,
            per_doc_max_tokens: 300,
            final_max_tokens: 500,
            timeout_secs: 60,
            max_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowupSettings {
    pub threshold: f32,
    pub limit: usize,
}

impl Default for FollowupSettings {
    fn default() -> Self { Self { threshold: 0.32, limit: 12 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_files() {
        let tmp = TempDir::new().unwrap();
        let settings = Config::load_from(tmp.path()).unwrap().settings().unwrap();
        assert_eq!(settings.ranking.top_docs, 5);
        assert_eq!(settings.ranking.top_chunks, 50);
        assert_eq!(settings.tree.max_depth, 3);
        assert_eq!(settings.tree.min_leaf, 20);
        assert_eq!(
            settings.corpus.metadata_path(tmp.path()),
            tmp.path().join("models/embeddings_chunks.jsonl")
        );
    }

    #[test]
    fn toml_overrides_and_weight_rows() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[ranking]
top_docs = 8

[weights.Student]
abstract = 0.9
"#,
        )
        .unwrap();
        let settings = Config::load_from(tmp.path()).unwrap().settings().unwrap();
        assert_eq!(settings.ranking.top_docs, 8);
        assert_eq!(settings.ranking.top_chunks, 50, "untouched keys keep defaults");
        let w = settings.role_weights().unwrap();
        assert!((w.weight(crate::Role::Student, crate::Section::Abstract) - 0.9).abs() < 1e-6);
        assert_eq!(w.weight(crate::Role::Student, crate::Section::Conclusion), 0.0, "row replaced as a whole");
        assert!((w.weight(crate::Role::Researcher, crate::Section::Methods) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn invalid_weight_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[weights.Researcher]\nmethods = 2.0\n").unwrap();
        let err = Config::load_from(tmp.path()).unwrap().settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let base = Path::new("/srv/skynet");
        assert_eq!(resolve_with_base(base, "models/x.npy"), PathBuf::from("/srv/skynet/models/x.npy"));
        assert_eq!(resolve_with_base(base, "/data/x.npy"), PathBuf::from("/data/x.npy"));
    }
}
