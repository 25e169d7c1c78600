use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
/// Roughly 10k tokens at four characters per token.
pub const DEFAULT_SOURCE_BUDGET: usize = 10_000 * 4;
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOCAL_WIKI: &str = "wwwroot/fakewiki";
pub const DEFAULT_MONGO_DATABASE: &str = "wiki";
pub const DEFAULT_POSTGRES_TABLE: &str = "confluence";
pub const DEFAULT_QDRANT_COLLECTION: &str = "wiki";
pub const PROJECT_CONFIG_DIR: &str = ".wikiai";

const REDACTED: &str = "********";

/// A backend section that is only usable once its required fields are set.
pub trait Configurable {
    fn is_configured(&self) -> bool;
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub wiki: WikiConfig,

    #[serde(default)]
    pub openai: OpenAIConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qdrant: Option<QdrantConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongo: Option<MongoConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_search: Option<AiSearchConfig>,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration together with the files it was read from.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: Config,
    pub global_path: Option<PathBuf>,
    pub project_path: Option<PathBuf>,
}

/// The optional backends that are fully configured, computed once at startup.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub confluence: Option<ConfluenceConfig>,
    pub postgres: Option<PostgresConfig>,
    pub qdrant: Option<QdrantConfig>,
    pub mongo: Option<MongoConfig>,
    pub ai_search: Option<AiSearchConfig>,
}

impl Capabilities {
    /// Names of the configured optional backends, for status output.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.confluence.is_some() {
            names.push("confluence");
        }
        if self.postgres.is_some() {
            names.push("postgres");
        }
        if self.qdrant.is_some() {
            names.push("qdrant");
        }
        if self.mongo.is_some() {
            names.push("mongo");
        }
        if self.ai_search.is_some() {
            names.push("ai_search");
        }
        names
    }
}

fn configured<T: Configurable + Clone>(section: &Option<T>) -> Option<T> {
    section.as_ref().filter(|s| s.is_configured()).cloned()
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wikiai").join("config.toml"))
    }

    pub fn project_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|p| p.join(PROJECT_CONFIG_DIR).join("config.toml"))
    }

    /// Load global config, overlay the project config, then apply
    /// environment variables.
    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], but an explicit path replaces both files.
    pub fn load_with(explicit: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
        let mut merged = toml::Table::new();
        let mut resolved = ResolvedConfig::default();

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::PathError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            merge_tables(&mut merged, read_table(path)?);
            resolved.project_path = Some(path.to_path_buf());
        } else {
            if let Some(path) = Self::global_path()
                && path.exists()
            {
                merge_tables(&mut merged, read_table(&path)?);
                resolved.global_path = Some(path);
            }
            if let Some(path) = Self::project_path()
                && path.exists()
            {
                merge_tables(&mut merged, read_table(&path)?);
                resolved.project_path = Some(path);
            }
        }

        let mut config: Config = toml::Value::Table(merged).try_into()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        resolved.config = config;
        Ok(resolved)
    }

    /// Write a starter config file and return its path.
    pub fn init_at(path: &Path, force: bool) -> Result<PathBuf, ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::PathError(format!(
                "config already exists at {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, content)?;
        Ok(path.to_path_buf())
    }

    /// Override fields from environment variables, using the same names the
    /// hosted deployment uses.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| filled(v));

        if let Some(v) = get("CONFLUENCE_DOMAIN") {
            self.wiki.confluence.get_or_insert_with(Default::default).domain = v;
        }
        if let Some(v) = get("CONFLUENCE_EMAIL") {
            self.wiki.confluence.get_or_insert_with(Default::default).email = v;
        }
        if let Some(v) = get("CONFLUENCE_API_KEY") {
            self.wiki.confluence.get_or_insert_with(Default::default).api_key = v;
        }

        if let Some(v) = get("AOAI_ENDPOINT") {
            self.openai.endpoint = v;
        }
        if let Some(v) = get("AOAI_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("AOAI_DEPLOYMENT_CHAT") {
            self.openai.chat_deployment = v;
        }
        if let Some(v) = get("AOAI_DEPLOYMENT_EMBEDDING") {
            self.openai.embedding_deployment = v;
        }

        if let Some(v) = get("POSTGRES_CONNECTION_STRING") {
            self.postgres.get_or_insert_with(Default::default).connection_string = v;
        }

        if let Some(v) = get("QDRANT_URL") {
            self.qdrant.get_or_insert_with(Default::default).url = v;
        }
        if let Some(v) = get("QDRANT_API_KEY") {
            self.qdrant.get_or_insert_with(Default::default).api_key = Some(v);
        }

        if let Some(v) = get("MONGO_CONNECTION_STRING") {
            self.mongo.get_or_insert_with(Default::default).connection_string = v;
        }
        if let Some(v) = get("MONGO_DATABASE_NAME") {
            self.mongo.get_or_insert_with(Default::default).database = v;
        }

        if let Some(v) = get("AISEARCH_ENDPOINT") {
            self.ai_search.get_or_insert_with(Default::default).endpoint = v;
        }
        if let Some(v) = get("AISEARCH_KEY") {
            self.ai_search.get_or_insert_with(Default::default).api_key = v;
        }
        if let Some(v) = get("AISEARCH_INDEX") {
            self.ai_search.get_or_insert_with(Default::default).index = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.source_budget == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.source_budget must be at least 1".to_string(),
            ));
        }
        if self.retrieval.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.max_results must be at least 1".to_string(),
            ));
        }
        if self.indexing.throttle_min_ms > self.indexing.throttle_max_ms {
            return Err(ConfigError::ValidationError(format!(
                "indexing.throttle_min_ms ({}) exceeds throttle_max_ms ({})",
                self.indexing.throttle_min_ms, self.indexing.throttle_max_ms
            )));
        }
        if self.openai.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "openai.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            confluence: configured(&self.wiki.confluence),
            postgres: configured(&self.postgres),
            qdrant: configured(&self.qdrant),
            mongo: configured(&self.mongo),
            ai_search: configured(&self.ai_search),
        }
    }

    /// Copy with every secret replaced, for display.
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if filled(&config.openai.api_key) {
            config.openai.api_key = REDACTED.to_string();
        }
        if let Some(ref mut c) = config.wiki.confluence {
            c.api_key = REDACTED.to_string();
        }
        if let Some(ref mut c) = config.postgres {
            c.connection_string = REDACTED.to_string();
        }
        if let Some(ref mut c) = config.qdrant
            && c.api_key.is_some()
        {
            c.api_key = Some(REDACTED.to_string());
        }
        if let Some(ref mut c) = config.mongo {
            c.connection_string = REDACTED.to_string();
        }
        if let Some(ref mut c) = config.ai_search {
            c.api_key = REDACTED.to_string();
        }
        config
    }
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicts.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Folder of `*.html` pages served when Confluence is not configured.
    #[serde(default = "default_local_folder")]
    pub local_folder: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confluence: Option<ConfluenceConfig>,
}

fn default_local_folder() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_WIKI)
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            local_folder: default_local_folder(),
            confluence: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfluenceConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Configurable for ConfluenceConfig {
    fn is_configured(&self) -> bool {
        filled(&self.domain) && filled(&self.email) && filled(&self.api_key)
    }
}

fn default_http_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub chat_deployment: String,

    #[serde(default)]
    pub embedding_deployment: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-attempt timeout for completion and embedding requests.
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_api_version() -> String {
    "2024-02-01".to_string()
}

fn default_openai_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    200
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            chat_deployment: String::new(),
            embedding_deployment: String::new(),
            api_version: default_api_version(),
            timeout_secs: default_openai_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Configurable for OpenAIConfig {
    fn is_configured(&self) -> bool {
        filled(&self.endpoint)
            && filled(&self.api_key)
            && filled(&self.chat_deployment)
            && filled(&self.embedding_deployment)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dimension")]
    pub dimension: u32,
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum combined characters of grounding content per answer.
    #[serde(default = "default_source_budget")]
    pub source_budget: usize,

    /// Nearest neighbours requested from vector backends.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Page fetch failures tolerated while building sources.
    #[serde(default = "default_max_failures")]
    pub max_fetch_failures: usize,
}

fn default_source_budget() -> usize {
    DEFAULT_SOURCE_BUDGET
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_max_failures() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            source_budget: default_source_budget(),
            max_results: default_max_results(),
            max_fetch_failures: default_max_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Lower bound of the random pause between embedding calls.
    #[serde(default = "default_throttle_min")]
    pub throttle_min_ms: u64,

    #[serde(default = "default_throttle_max")]
    pub throttle_max_ms: u64,

    /// Chunk upsert failures an indexer tolerates before giving up.
    #[serde(default = "default_max_failures")]
    pub max_upsert_failures: usize,

    #[serde(default = "default_true")]
    pub init_on_start: bool,
}

fn default_throttle_min() -> u64 {
    200
}

fn default_throttle_max() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            throttle_min_ms: default_throttle_min(),
            throttle_max_ms: default_throttle_max(),
            max_upsert_failures: default_max_failures(),
            init_on_start: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default)]
    pub connection_string: String,

    #[serde(default = "default_postgres_table")]
    pub table: String,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

fn default_postgres_table() -> String {
    DEFAULT_POSTGRES_TABLE.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            table: default_postgres_table(),
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

impl Configurable for PostgresConfig {
    fn is_configured(&self) -> bool {
        filled(&self.connection_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_qdrant_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_collection() -> String {
    DEFAULT_QDRANT_COLLECTION.to_string()
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            collection: default_qdrant_collection(),
            api_key: None,
        }
    }
}

impl Configurable for QdrantConfig {
    fn is_configured(&self) -> bool {
        filled(&self.url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    #[serde(default)]
    pub connection_string: String,

    #[serde(default = "default_mongo_database")]
    pub database: String,
}

fn default_mongo_database() -> String {
    DEFAULT_MONGO_DATABASE.to_string()
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            database: default_mongo_database(),
        }
    }
}

impl Configurable for MongoConfig {
    fn is_configured(&self) -> bool {
        filled(&self.connection_string)
    }
}

impl MongoConfig {
    /// Database name, falling back to `wiki` when left blank.
    pub fn database_name(&self) -> &str {
        if filled(&self.database) {
            &self.database
        } else {
            DEFAULT_MONGO_DATABASE
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSearchConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub index: String,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,
}

fn default_search_api_version() -> String {
    "2023-11-01".to_string()
}

impl Default for AiSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            index: String::new(),
            api_version: default_search_api_version(),
        }
    }
}

impl Configurable for AiSearchConfig {
    fn is_configured(&self) -> bool {
        filled(&self.endpoint) && filled(&self.api_key) && filled(&self.index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}
