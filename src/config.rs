use std::env;
use std::path::{Path, PathBuf};

/// Queue tiers the worker may bind to. Each tier maps to a model size, so a
/// producer routes a job by picking the queue.
pub const AVAILABLE_QUEUES: [&str; 5] = ["tiny", "small", "base", "medium", "large"];

/// Prefix of the informational consumer identity,
/// `"{CONSUMER_ID_PREFIX}-{queue}-{n}"`.
pub const CONSUMER_ID_PREFIX: &str = "litescribe";

// ── Error ──────────────────────────────────────────────────────────────────────

/// Errors that can occur while loading configuration.
/// All of them are fatal before any connection attempt is made.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is set neither directly nor via a `_FILE` path.
    Missing { var: &'static str },
    /// An environment variable contained an unparseable value.
    Parse {
        var: &'static str,
        raw: String,
        expected: &'static str,
    },
    /// A value parsed but violated a constraint.
    InvalidValue { var: &'static str, message: String },
    /// A `_FILE` secret pointed at an unreadable path.
    SecretFile { var: &'static str, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { var } => {
                write!(f, "env {var} is required (set {var} or {var}_FILE)")
            }
            Self::Parse { var, raw, expected } => {
                write!(f, "env {var}={raw:?} — expected {expected}")
            }
            Self::InvalidValue { var, message } => write!(f, "env {var}: {message}"),
            Self::SecretFile { var, message } => write!(f, "env {var}_FILE: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Config ─────────────────────────────────────────────────────────────────────

/// Centralised application configuration.
///
/// Built once at startup by [`Config::load`] and passed by reference into
/// each component constructor; nothing reads the environment after that.
/// Validation is eager so a misconfiguration is reported before the worker
/// touches the broker or the gateway.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Queue ─────────────────────────────────────────────────────────────────
    /// Queue tier to bind. Env: `LITESCRIBE_QUEUE` · Default: `base`.
    /// Must be one of [`AVAILABLE_QUEUES`].
    pub queue: String,

    /// Where deliveries that exhausted their retries end up.
    /// Env: `LITESCRIBE_DEAD_LETTER_QUEUE` · Default: `{queue}.dead-letter`
    pub dead_letter_queue: String,

    /// Retry attempts before a failed delivery is dead-lettered.
    /// Env: `LITESCRIBE_MAX_RETRIES` · Default: `2`
    pub max_retries: i32,

    // ── RabbitMQ ──────────────────────────────────────────────────────────────
    /// Full AMQP connection URL. Env: `LITESCRIBE_RABBITMQ_URL` · Required.
    pub rabbitmq_url: String,

    /// Base URL of the broker's management HTTP API.
    /// Env: `LITESCRIBE_RABBITMQ_API_BASE_URL` · Required.
    pub rabbitmq_api_base_url: String,

    /// Env: `LITESCRIBE_RABBITMQ_USER` · Required.
    pub rabbitmq_user: String,

    /// Env: `LITESCRIBE_RABBITMQ_PASSWORD` or `..._FILE` · Required.
    pub rabbitmq_password: String,

    // ── Gateway ───────────────────────────────────────────────────────────────
    /// Env: `LITESCRIBE_GATEWAY_API_BASE_URL` · Required.
    pub gateway_api_base_url: String,

    /// Env: `LITESCRIBE_GATEWAY_API_TOKEN` or `..._FILE` · Required.
    pub gateway_api_token: String,

    // ── Model ─────────────────────────────────────────────────────────────────
    /// Explicit model file path. When set it wins over the
    /// `{models_dir}/ggml-{model_size}.bin` convention.
    /// Env: `LITESCRIBE_MODEL_PATH` · Optional.
    pub model_path: Option<PathBuf>,

    /// GGML model identifier (e.g. `tiny`, `base`, `large-v3`).
    /// Env: `LITESCRIBE_MODEL_SIZE` · Default: `base`.
    pub model_size: String,

    /// Directory holding GGML `.bin` model files.
    /// Env: `LITESCRIBE_MODELS_DIR` · Default: `/app/models`.
    pub models_dir: PathBuf,

    /// Inference device label. whisper.cpp picks the backend at build time,
    /// so this is informational and logged for operators.
    /// Env: `LITESCRIBE_DEVICE` · Default: `cpu`.
    pub device: String,

    /// Compute type label, informational as above.
    /// Env: `LITESCRIBE_COMPUTE_TYPE` · Default: `int8`.
    pub compute_type: String,

    /// Beam width for beam-search decoding.
    /// Env: `LITESCRIBE_BEAM_SIZE` · Default: `5` · Constraint: ≥ 1.
    pub beam_size: i32,

    /// Inference threads. `0` keeps the library default.
    /// Env: `LITESCRIBE_CPU_THREADS` · Default: `0`.
    pub n_threads: i32,

    // ── Audio ─────────────────────────────────────────────────────────────────
    /// Ceiling on accepted audio duration.
    /// Env: `LITESCRIBE_AUDIO_MAX_DURATION_SECONDS` · Default: `36000` (10 h).
    pub max_audio_duration_secs: f64,

    /// Directory where producers drop audio files for this worker.
    /// Env: `LITESCRIBE_STORAGE_DIR` · Default: `/tmp/litescribe`.
    pub storage_dir: PathBuf,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Returns [`ConfigError`] on the first missing or invalid value.
    pub fn load() -> Result<Self, ConfigError> {
        // ── Queue ─────────────────────────────────────────────────────────────
        let queue = env_str("LITESCRIBE_QUEUE", "base");
        validate(
            "LITESCRIBE_QUEUE",
            AVAILABLE_QUEUES.contains(&queue.as_str()),
            &format!("must be one of {}", AVAILABLE_QUEUES.join(", ")),
        )?;

        let dead_letter_queue = env_str(
            "LITESCRIBE_DEAD_LETTER_QUEUE",
            &format!("{queue}.dead-letter"),
        );
        validate(
            "LITESCRIBE_DEAD_LETTER_QUEUE",
            !dead_letter_queue.is_empty(),
            "must not be empty",
        )?;

        let max_retries = parse_i32("LITESCRIBE_MAX_RETRIES", 2)?;
        validate("LITESCRIBE_MAX_RETRIES", max_retries >= 0, "must be ≥ 0")?;

        // ── RabbitMQ ──────────────────────────────────────────────────────────
        let rabbitmq_url = env_required("LITESCRIBE_RABBITMQ_URL")?;
        let rabbitmq_api_base_url = env_required("LITESCRIBE_RABBITMQ_API_BASE_URL")?;
        let rabbitmq_user = env_required("LITESCRIBE_RABBITMQ_USER")?;
        let rabbitmq_password = env_secret("LITESCRIBE_RABBITMQ_PASSWORD")?;

        // ── Gateway ───────────────────────────────────────────────────────────
        let gateway_api_base_url = env_required("LITESCRIBE_GATEWAY_API_BASE_URL")?;
        let gateway_api_token = env_secret("LITESCRIBE_GATEWAY_API_TOKEN")?;

        // ── Model ─────────────────────────────────────────────────────────────
        let model_path = env::var("LITESCRIBE_MODEL_PATH").ok().map(PathBuf::from);

        let model_size = env_str("LITESCRIBE_MODEL_SIZE", "base");
        validate(
            "LITESCRIBE_MODEL_SIZE",
            !model_size.is_empty(),
            "must not be empty",
        )?;

        let models_dir = PathBuf::from(env_str("LITESCRIBE_MODELS_DIR", "/app/models"));
        let device = env_str("LITESCRIBE_DEVICE", "cpu");
        let compute_type = env_str("LITESCRIBE_COMPUTE_TYPE", "int8");

        let beam_size = parse_i32("LITESCRIBE_BEAM_SIZE", 5)?;
        validate("LITESCRIBE_BEAM_SIZE", beam_size >= 1, "must be ≥ 1")?;

        let n_threads = parse_i32("LITESCRIBE_CPU_THREADS", 0)?;
        validate("LITESCRIBE_CPU_THREADS", n_threads >= 0, "must be ≥ 0")?;

        // ── Audio ─────────────────────────────────────────────────────────────
        let max_audio_duration_secs =
            parse_f64("LITESCRIBE_AUDIO_MAX_DURATION_SECONDS", 36_000.0)?;
        validate(
            "LITESCRIBE_AUDIO_MAX_DURATION_SECONDS",
            max_audio_duration_secs > 0.0,
            "must be > 0",
        )?;

        let storage_dir = PathBuf::from(env_str("LITESCRIBE_STORAGE_DIR", "/tmp/litescribe"));

        Ok(Self {
            queue,
            dead_letter_queue,
            max_retries,
            rabbitmq_url,
            rabbitmq_api_base_url,
            rabbitmq_user,
            rabbitmq_password,
            gateway_api_base_url,
            gateway_api_token,
            model_path,
            model_size,
            models_dir,
            device,
            compute_type,
            beam_size,
            n_threads,
            max_audio_duration_secs,
            storage_dir,
        })
    }

    // ── Derived helpers ───────────────────────────────────────────────────────

    /// Path of the GGML model file to load.
    ///
    /// `LITESCRIBE_MODEL_PATH` wins when set; otherwise the
    /// `{models_dir}/ggml-{model_size}.bin` convention applies.
    pub fn model_file(&self) -> PathBuf {
        match &self.model_path {
            Some(path) => path.clone(),
            None => self.models_dir.join(format!("ggml-{}.bin", self.model_size)),
        }
    }

    /// Log a startup summary of the loaded configuration. Secrets are never
    /// logged.
    pub fn log_summary(&self) {
        tracing::info!(
            queue        = %self.queue,
            dlq          = %self.dead_letter_queue,
            max_retries  = self.max_retries,
            model        = %self.model_size,
            model_file   = %self.model_file().display(),
            device       = %self.device,
            compute_type = %self.compute_type,
            beam_size    = self.beam_size,
            max_dur_sec  = self.max_audio_duration_secs,
            storage_dir  = %self.storage_dir.display(),
            gateway      = %self.gateway_api_base_url,
            "⚙️  configuration loaded"
        );
    }
}

// ── Private parse helpers ──────────────────────────────────────────────────────

/// Return the env var value as a `String`, or `default` if unset.
fn env_str(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Required plain value; [`ConfigError::Missing`] when unset or empty.
fn env_required(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { var }),
    }
}

/// Required secret: accept `var` directly, or read the file named by
/// `{var}_FILE`. Passing the secret in the environment works but is warned
/// about, since file secrets survive `docker inspect` less readily.
fn env_secret(var: &'static str) -> Result<String, ConfigError> {
    if let Ok(value) = env::var(var) {
        if !value.is_empty() {
            tracing::warn!("{var} is set in the environment; consider {var}_FILE");
            return Ok(value);
        }
    }

    if let Ok(fp) = env::var(format!("{var}_FILE")) {
        let path = Path::new(&fp);
        return std::fs::read_to_string(path)
            .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
            .map_err(|e| ConfigError::SecretFile {
                var,
                message: format!("{}: {e}", path.display()),
            });
    }

    Err(ConfigError::Missing { var })
}

/// Emit a `ConfigError::InvalidValue` if `condition` is false.
fn validate(var: &'static str, condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            var,
            message: message.to_string(),
        })
    }
}

fn parse_i32(var: &'static str, default: i32) -> Result<i32, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse::<i32>().map_err(|_| ConfigError::Parse {
            var,
            raw,
            expected: "integer",
        }),
    }
}

fn parse_f64(var: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse::<f64>().map_err(|_| ConfigError::Parse {
            var,
            raw,
            expected: "decimal number",
        }),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    // Env-var manipulation is process-global; each test uses its own unique
    // variable names so they can run in parallel.

    #[test]
    fn env_str_falls_back_to_default() {
        assert_eq!(env_str("LITESCRIBE_TEST_UNSET_STR", "base"), "base");
    }

    #[test]
    fn env_required_rejects_missing() {
        let err = env_required("LITESCRIBE_TEST_UNSET_REQUIRED").unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn env_secret_reads_file_variant() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cret-token").unwrap();

        env::set_var(
            "LITESCRIBE_TEST_SECRET_A_FILE",
            file.path().to_str().unwrap(),
        );

        let value = env_secret("LITESCRIBE_TEST_SECRET_A").unwrap();
        assert_eq!(value, "s3cret-token");

        env::remove_var("LITESCRIBE_TEST_SECRET_A_FILE");
    }

    #[test]
    fn env_secret_missing_file_is_an_error() {
        env::set_var(
            "LITESCRIBE_TEST_SECRET_B_FILE",
            "/nonexistent/litescribe-secret",
        );

        let err = env_secret("LITESCRIBE_TEST_SECRET_B").unwrap_err();
        assert!(matches!(err, ConfigError::SecretFile { .. }));

        env::remove_var("LITESCRIBE_TEST_SECRET_B_FILE");
    }

    #[test]
    fn parse_i32_rejects_garbage() {
        env::set_var("LITESCRIBE_TEST_I32_BAD", "five");
        let err = parse_i32("LITESCRIBE_TEST_I32_BAD", 1).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        env::remove_var("LITESCRIBE_TEST_I32_BAD");
    }

    #[test]
    fn queue_allow_list_contains_the_five_tiers() {
        for tier in ["tiny", "small", "base", "medium", "large"] {
            assert!(AVAILABLE_QUEUES.contains(&tier));
        }
        assert!(!AVAILABLE_QUEUES.contains(&"huge"));
    }
}
