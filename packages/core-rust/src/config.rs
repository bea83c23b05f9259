//! HTTP server and query-limit configuration for a query-serving node.
//!
//! [`ServerConfig`] is an immutable value: it is built once from a
//! [`ServerConfigOverrides`] document, validated field by field, and then
//! only read. Any reconfiguration means building a new value.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::constraint::{self, Constraint, FieldRule};
use crate::error::ValidationError;
use crate::hardware::{default_num_threads, HostProcessors, ProcessorCount};
use crate::period::{self, Iso8601};

/// Document keys recognized in the server configuration.
pub mod keys {
    pub const NUM_THREADS: &str = "numThreads";
    pub const QUEUE_SIZE: &str = "queueSize";
    pub const ENABLE_REQUEST_LIMIT: &str = "enableRequestLimit";
    pub const MAX_IDLE_TIME: &str = "maxIdleTime";
    pub const DEFAULT_QUERY_TIMEOUT: &str = "defaultQueryTimeout";
    pub const MAX_SCATTER_GATHER_BYTES: &str = "maxScatterGatherBytes";
    pub const MAX_QUERY_TIMEOUT: &str = "maxQueryTimeout";
    pub const MAX_REQUEST_HEADER_SIZE: &str = "maxRequestHeaderSize";
    pub const GRACEFUL_SHUTDOWN_TIMEOUT: &str = "gracefulShutdownTimeout";
    /// Historical spelling kept for compatibility with existing documents.
    pub const UNANNOUNCE_PROPAGATION_DELAY: &str = "unannouncePropogationDelay";
    pub const INFLATE_BUFFER_SIZE: &str = "inflateBufferSize";
    pub const COMPRESSION_LEVEL: &str = "compressionLevel";

    /// All keys, in declared field order.
    pub const ALL: [&str; 12] = [
        NUM_THREADS,
        QUEUE_SIZE,
        ENABLE_REQUEST_LIMIT,
        MAX_IDLE_TIME,
        DEFAULT_QUERY_TIMEOUT,
        MAX_SCATTER_GATHER_BYTES,
        MAX_QUERY_TIMEOUT,
        MAX_REQUEST_HEADER_SIZE,
        GRACEFUL_SHUTDOWN_TIMEOUT,
        UNANNOUNCE_PROPAGATION_DELAY,
        INFLATE_BUFFER_SIZE,
        COMPRESSION_LEVEL,
    ];
}

/// Default request queue depth: effectively unbounded.
pub const DEFAULT_QUEUE_SIZE: u32 = i32::MAX.unsigned_abs();
/// Default idle time before a connection is closed.
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(5 * 60);
/// Default query timeout in milliseconds (5 minutes).
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 300_000;
/// Default scatter-gather byte budget: effectively unbounded.
pub const DEFAULT_MAX_SCATTER_GATHER_BYTES: u64 = i64::MAX.unsigned_abs();
/// Default ceiling on requested query timeouts: effectively unbounded.
pub const DEFAULT_MAX_QUERY_TIMEOUT_MS: u64 = i64::MAX.unsigned_abs();
/// Default maximum request header size in bytes.
pub const DEFAULT_MAX_REQUEST_HEADER_SIZE: u32 = 8 * 1024;
/// Default buffer size for inflating gzip request bodies.
pub const DEFAULT_GZIP_INFLATE_BUFFER_SIZE: u32 = 4096;
/// zlib's "default compression" sentinel.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = -1;

/// One key of a configuration document.
///
/// An absent key and a key explicitly set to `null` are different inputs:
/// the first falls back to the declared default, the second is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Setting<T> {
    /// Key not present; the default applies.
    #[default]
    Unset,
    /// Key present with a `null` value.
    Null,
    /// Key present with a value.
    Value(T),
}

impl<T> Setting<T> {
    /// Returns `true` if the key was not supplied.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns `self` unless it is unset, in which case `base` is returned.
    #[must_use]
    pub fn or(self, base: Self) -> Self {
        match self {
            Self::Unset => base,
            set => set,
        }
    }

    /// Resolves the setting, rejecting an explicit `null`.
    fn require(&self, field: &'static str) -> Result<Option<&T>, ValidationError> {
        match self {
            Self::Unset => Ok(None),
            Self::Null => Err(ValidationError::new(field, "null", Constraint::NonNull)),
            Self::Value(value) => Ok(Some(value)),
        }
    }
}

impl<T> From<T> for Setting<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Unset | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Value))
    }
}

/// Reads a numeric key: any JSON integer, an integral float, or integer text.
fn integer_setting<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Setting<i128>, D::Error> {
    deserializer.deserialize_any(IntegerVisitor)
}

struct IntegerVisitor;

impl<'de> Visitor<'de> for IntegerVisitor {
    type Value = Setting<i128>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Setting::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Setting::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(Setting::Value(i128::from(value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(Setting::Value(i128::from(value)))
    }

    fn visit_i128<E: de::Error>(self, value: i128) -> Result<Self::Value, E> {
        Ok(Setting::Value(value))
    }

    fn visit_u128<E: de::Error>(self, value: u128) -> Result<Self::Value, E> {
        Ok(Setting::Value(i128::try_from(value).unwrap_or(i128::MAX)))
    }

    // JSON numbers beyond u64 arrive as floats.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if value.is_finite() && value.fract() == 0.0 {
            // Saturates at the i128 range, which every rule rejects anyway.
            Ok(Setting::Value(value as i128))
        } else {
            Err(E::invalid_value(Unexpected::Float(value), &self))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value
            .trim()
            .parse()
            .map(Setting::Value)
            .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
    }
}

/// The configuration document: any subset of the twelve keys.
///
/// Durations are ISO-8601 period text (`PT5M`); numbers are integers, given
/// either as JSON numbers or as integer text. Numbers are held wider than any
/// stored field so that out-of-range input is reported by the field's rule
/// rather than failing to parse. Values are checked only when a
/// [`ServerConfig`] is built from the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigOverrides {
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub num_threads: Setting<i128>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub queue_size: Setting<i128>,
    #[serde(default, skip_serializing_if = "Setting::is_unset")]
    pub enable_request_limit: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_unset")]
    pub max_idle_time: Setting<String>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub default_query_timeout: Setting<i128>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub max_scatter_gather_bytes: Setting<i128>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub max_query_timeout: Setting<i128>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub max_request_header_size: Setting<i128>,
    #[serde(default, skip_serializing_if = "Setting::is_unset")]
    pub graceful_shutdown_timeout: Setting<String>,
    #[serde(
        default,
        rename = "unannouncePropogationDelay",
        alias = "unannouncePropagationDelay",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub unannounce_propagation_delay: Setting<String>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub inflate_buffer_size: Setting<i128>,
    #[serde(
        default,
        deserialize_with = "integer_setting",
        skip_serializing_if = "Setting::is_unset"
    )]
    pub compression_level: Setting<i128>,
    /// Keys this document does not recognize. Kept so the document
    /// re-serializes faithfully; ignored with a warning when building.
    #[serde(flatten)]
    pub unrecognized: BTreeMap<String, serde_json::Value>,
}

impl ServerConfigOverrides {
    /// Layers `overlay` on top of `self`: every key set in `overlay` wins.
    #[must_use]
    pub fn merge(self, overlay: Self) -> Self {
        let mut unrecognized = self.unrecognized;
        unrecognized.extend(overlay.unrecognized);
        Self {
            num_threads: overlay.num_threads.or(self.num_threads),
            queue_size: overlay.queue_size.or(self.queue_size),
            enable_request_limit: overlay.enable_request_limit.or(self.enable_request_limit),
            max_idle_time: overlay.max_idle_time.or(self.max_idle_time),
            default_query_timeout: overlay.default_query_timeout.or(self.default_query_timeout),
            max_scatter_gather_bytes: overlay
                .max_scatter_gather_bytes
                .or(self.max_scatter_gather_bytes),
            max_query_timeout: overlay.max_query_timeout.or(self.max_query_timeout),
            max_request_header_size: overlay
                .max_request_header_size
                .or(self.max_request_header_size),
            graceful_shutdown_timeout: overlay
                .graceful_shutdown_timeout
                .or(self.graceful_shutdown_timeout),
            unannounce_propagation_delay: overlay
                .unannounce_propagation_delay
                .or(self.unannounce_propagation_delay),
            inflate_buffer_size: overlay.inflate_buffer_size.or(self.inflate_buffer_size),
            compression_level: overlay.compression_level.or(self.compression_level),
            unrecognized,
        }
    }
}

/// Validated tuning parameters for the HTTP listener and query execution.
///
/// Built once at startup and shared read-only for the life of the process.
/// Two values with the same fields are interchangeable, including as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "ServerConfigOverrides", try_from = "ServerConfigOverrides")]
pub struct ServerConfig {
    num_threads: u32,
    queue_size: u32,
    enable_request_limit: bool,
    max_idle_time: Duration,
    default_query_timeout: u64,
    max_scatter_gather_bytes: u64,
    max_query_timeout: u64,
    max_request_header_size: u32,
    graceful_shutdown_timeout: Duration,
    unannounce_propagation_delay: Duration,
    inflate_buffer_size: u32,
    compression_level: i32,
}

impl ServerConfig {
    /// Builds a configuration from `overrides`, deriving the thread count
    /// default from the host's processors.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered, in declared field
    /// order.
    pub fn new(overrides: &ServerConfigOverrides) -> Result<Self, ValidationError> {
        Self::with_processors(overrides, &HostProcessors)
    }

    /// Builds a configuration using `processors` for the thread count default.
    ///
    /// The processor count is read once, only if `numThreads` is not supplied.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered, in declared field
    /// order.
    pub fn with_processors(
        overrides: &ServerConfigOverrides,
        processors: &dyn ProcessorCount,
    ) -> Result<Self, ValidationError> {
        for key in overrides.unrecognized.keys() {
            warn!(key = %key, "ignoring unrecognized server configuration key");
        }

        Ok(Self {
            num_threads: number(&overrides.num_threads, constraint::NUM_THREADS, || {
                let available = processors.available_processors();
                let derived = default_num_threads(available);
                debug!(
                    processors = available,
                    num_threads = derived,
                    "derived default HTTP thread count"
                );
                derived
            })?,
            queue_size: number(&overrides.queue_size, constraint::QUEUE_SIZE, || {
                DEFAULT_QUEUE_SIZE
            })?,
            enable_request_limit: overrides
                .enable_request_limit
                .require(keys::ENABLE_REQUEST_LIMIT)?
                .copied()
                .unwrap_or(false),
            max_idle_time: duration(
                &overrides.max_idle_time,
                keys::MAX_IDLE_TIME,
                DEFAULT_MAX_IDLE_TIME,
            )?,
            default_query_timeout: number(
                &overrides.default_query_timeout,
                constraint::DEFAULT_QUERY_TIMEOUT,
                || DEFAULT_QUERY_TIMEOUT_MS,
            )?,
            max_scatter_gather_bytes: number(
                &overrides.max_scatter_gather_bytes,
                constraint::MAX_SCATTER_GATHER_BYTES,
                || DEFAULT_MAX_SCATTER_GATHER_BYTES,
            )?,
            max_query_timeout: number(
                &overrides.max_query_timeout,
                constraint::MAX_QUERY_TIMEOUT,
                || DEFAULT_MAX_QUERY_TIMEOUT_MS,
            )?,
            max_request_header_size: number(
                &overrides.max_request_header_size,
                constraint::MAX_REQUEST_HEADER_SIZE,
                || DEFAULT_MAX_REQUEST_HEADER_SIZE,
            )?,
            graceful_shutdown_timeout: duration(
                &overrides.graceful_shutdown_timeout,
                keys::GRACEFUL_SHUTDOWN_TIMEOUT,
                Duration::ZERO,
            )?,
            unannounce_propagation_delay: duration(
                &overrides.unannounce_propagation_delay,
                keys::UNANNOUNCE_PROPAGATION_DELAY,
                Duration::ZERO,
            )?,
            inflate_buffer_size: number(
                &overrides.inflate_buffer_size,
                constraint::INFLATE_BUFFER_SIZE,
                || DEFAULT_GZIP_INFLATE_BUFFER_SIZE,
            )?,
            compression_level: number(
                &overrides.compression_level,
                constraint::COMPRESSION_LEVEL,
                || DEFAULT_COMPRESSION_LEVEL,
            )?,
        })
    }

    /// Returns the full document form of this configuration, every key set.
    #[must_use]
    pub fn to_overrides(&self) -> ServerConfigOverrides {
        ServerConfigOverrides::from(self.clone())
    }

    /// Number of HTTP worker threads.
    #[must_use]
    pub fn num_threads(&self) -> u32 {
        self.num_threads
    }

    /// Maximum number of queued requests.
    #[must_use]
    pub fn queue_size(&self) -> u32 {
        self.queue_size
    }

    /// Whether requests beyond `num_threads + queue_size` are rejected.
    #[must_use]
    pub fn enable_request_limit(&self) -> bool {
        self.enable_request_limit
    }

    /// Idle time after which a connection is closed.
    #[must_use]
    pub fn max_idle_time(&self) -> Duration {
        self.max_idle_time
    }

    /// Timeout applied to queries that do not request one, in milliseconds.
    #[must_use]
    pub fn default_query_timeout(&self) -> u64 {
        self.default_query_timeout
    }

    /// [`default_query_timeout`](Self::default_query_timeout) as a [`Duration`].
    #[must_use]
    pub fn default_query_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.default_query_timeout)
    }

    /// Byte budget for merging scatter-gather results of a single query.
    #[must_use]
    pub fn max_scatter_gather_bytes(&self) -> u64 {
        self.max_scatter_gather_bytes
    }

    /// Largest timeout a query may request, in milliseconds.
    #[must_use]
    pub fn max_query_timeout(&self) -> u64 {
        self.max_query_timeout
    }

    /// [`max_query_timeout`](Self::max_query_timeout) as a [`Duration`].
    #[must_use]
    pub fn max_query_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.max_query_timeout)
    }

    /// Largest accepted request header block, in bytes.
    #[must_use]
    pub fn max_request_header_size(&self) -> u32 {
        self.max_request_header_size
    }

    /// How long shutdown waits for in-flight requests.
    #[must_use]
    pub fn graceful_shutdown_timeout(&self) -> Duration {
        self.graceful_shutdown_timeout
    }

    /// Delay between unannouncing the node and stopping the listener.
    #[must_use]
    pub fn unannounce_propagation_delay(&self) -> Duration {
        self.unannounce_propagation_delay
    }

    /// Buffer size used when inflating gzip request bodies.
    #[must_use]
    pub fn inflate_buffer_size(&self) -> u32 {
        self.inflate_buffer_size
    }

    /// Response compression level; `-1` selects the codec default.
    #[must_use]
    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }
}

impl Default for ServerConfig {
    /// All declared defaults, with the thread count derived from the host.
    fn default() -> Self {
        // An empty document only yields defaults, and no default can fail its rule.
        Self::new(&ServerConfigOverrides::default())
            .expect("declared server configuration defaults are valid")
    }
}

impl TryFrom<ServerConfigOverrides> for ServerConfig {
    type Error = ValidationError;

    fn try_from(overrides: ServerConfigOverrides) -> Result<Self, Self::Error> {
        Self::new(&overrides)
    }
}

impl From<ServerConfig> for ServerConfigOverrides {
    fn from(config: ServerConfig) -> Self {
        let long = |value: u64| Setting::Value(i128::from(value));
        Self {
            num_threads: Setting::Value(i128::from(config.num_threads)),
            queue_size: Setting::Value(i128::from(config.queue_size)),
            enable_request_limit: Setting::Value(config.enable_request_limit),
            max_idle_time: Setting::Value(period::format(config.max_idle_time)),
            default_query_timeout: long(config.default_query_timeout),
            max_scatter_gather_bytes: long(config.max_scatter_gather_bytes),
            max_query_timeout: long(config.max_query_timeout),
            max_request_header_size: Setting::Value(i128::from(config.max_request_header_size)),
            graceful_shutdown_timeout: Setting::Value(period::format(
                config.graceful_shutdown_timeout,
            )),
            unannounce_propagation_delay: Setting::Value(period::format(
                config.unannounce_propagation_delay,
            )),
            inflate_buffer_size: Setting::Value(i128::from(config.inflate_buffer_size)),
            compression_level: Setting::Value(i128::from(config.compression_level)),
            unrecognized: BTreeMap::new(),
        }
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServerConfig{{numThreads={}, queueSize={}, enableRequestLimit={}, \
             maxIdleTime={}, defaultQueryTimeout={}, maxScatterGatherBytes={}, \
             maxQueryTimeout={}, maxRequestHeaderSize={}, gracefulShutdownTimeout={}, \
             unannouncePropagationDelay={}, inflateBufferSize={}, compressionLevel={}}}",
            self.num_threads,
            self.queue_size,
            self.enable_request_limit,
            Iso8601(self.max_idle_time),
            self.default_query_timeout,
            self.max_scatter_gather_bytes,
            self.max_query_timeout,
            self.max_request_header_size,
            Iso8601(self.graceful_shutdown_timeout),
            Iso8601(self.unannounce_propagation_delay),
            self.inflate_buffer_size,
            self.compression_level,
        )
    }
}

/// Resolves a numeric key against its rule, then narrows it to the storage type.
///
/// Defaults are produced already typed and are within every rule.
fn number<T: TryFrom<i64>>(
    setting: &Setting<i128>,
    rule: FieldRule,
    default: impl FnOnce() -> T,
) -> Result<T, ValidationError> {
    let Some(&supplied) = setting.require(rule.field)? else {
        return Ok(default());
    };
    let value = rule.check(supplied)?;
    T::try_from(value)
        .map_err(|_| ValidationError::new(rule.field, value, Constraint::AtMost(rule.max)))
}

/// Resolves a duration key written as ISO-8601 period text.
fn duration(
    setting: &Setting<String>,
    field: &'static str,
    default: Duration,
) -> Result<Duration, ValidationError> {
    match setting.require(field)? {
        None => Ok(default),
        Some(text) => period::parse(text).map_err(|err| {
            debug!(field, %err, "rejected period text");
            ValidationError::new(field, text, Constraint::IsoPeriod)
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::hash::{Hash, Hasher};

    use super::*;
    use crate::hardware::FixedProcessors;

    fn build(overrides: &ServerConfigOverrides) -> Result<ServerConfig, ValidationError> {
        ServerConfig::with_processors(overrides, &FixedProcessors(4))
    }

    fn hash_of(config: &ServerConfig) -> u64 {
        let mut hasher = DefaultHasher::new();
        config.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn empty_overrides_yield_defaults() {
        let config = build(&ServerConfigOverrides::default()).unwrap();
        assert_eq!(config.num_threads(), 40);
        assert_eq!(config.queue_size(), 2_147_483_647);
        assert!(!config.enable_request_limit());
        assert_eq!(config.max_idle_time(), Duration::from_secs(300));
        assert_eq!(config.default_query_timeout(), 300_000);
        assert_eq!(config.default_query_timeout_duration(), Duration::from_secs(300));
        assert_eq!(config.max_scatter_gather_bytes(), 9_223_372_036_854_775_807);
        assert_eq!(config.max_query_timeout(), 9_223_372_036_854_775_807);
        assert_eq!(config.max_request_header_size(), 8192);
        assert_eq!(config.graceful_shutdown_timeout(), Duration::ZERO);
        assert_eq!(config.unannounce_propagation_delay(), Duration::ZERO);
        assert_eq!(config.inflate_buffer_size(), 4096);
        assert_eq!(config.compression_level(), -1);
    }

    #[test]
    fn default_impl_derives_threads_from_host() {
        let config = ServerConfig::default();
        let host = HostProcessors.available_processors();
        assert_eq!(config.num_threads(), default_num_threads(host));
        assert_eq!(config.queue_size(), DEFAULT_QUEUE_SIZE);
        assert_eq!(config.max_idle_time(), DEFAULT_MAX_IDLE_TIME);
        assert_eq!(config.compression_level(), DEFAULT_COMPRESSION_LEVEL);
    }

    #[test]
    fn thread_default_follows_processor_count() {
        let overrides = ServerConfigOverrides::default();
        let one = ServerConfig::with_processors(&overrides, &FixedProcessors(1)).unwrap();
        let sixteen = ServerConfig::with_processors(&overrides, &FixedProcessors(16)).unwrap();
        assert_eq!(one.num_threads(), 40);
        assert_eq!(sixteen.num_threads(), 49);
    }

    #[test]
    fn explicit_thread_count_ignores_processors() {
        let overrides = ServerConfigOverrides {
            num_threads: 7.into(),
            ..ServerConfigOverrides::default()
        };
        let config = ServerConfig::with_processors(&overrides, &FixedProcessors(64)).unwrap();
        assert_eq!(config.num_threads(), 7);
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides = ServerConfigOverrides {
            num_threads: 64.into(),
            queue_size: 128.into(),
            enable_request_limit: true.into(),
            max_idle_time: "PT10M".to_string().into(),
            default_query_timeout: 0.into(),
            max_scatter_gather_bytes: 1_000_000.into(),
            max_query_timeout: 60_000.into(),
            max_request_header_size: 16_384.into(),
            graceful_shutdown_timeout: "PT30S".to_string().into(),
            unannounce_propagation_delay: "PT2S".to_string().into(),
            inflate_buffer_size: 0.into(),
            compression_level: 9.into(),
            unrecognized: BTreeMap::new(),
        };
        let config = build(&overrides).unwrap();
        assert_eq!(config.num_threads(), 64);
        assert_eq!(config.queue_size(), 128);
        assert!(config.enable_request_limit());
        assert_eq!(config.max_idle_time(), Duration::from_secs(600));
        assert_eq!(config.default_query_timeout(), 0);
        assert_eq!(config.max_scatter_gather_bytes(), 1_000_000);
        assert_eq!(config.max_query_timeout(), 60_000);
        assert_eq!(config.max_query_timeout_duration(), Duration::from_secs(60));
        assert_eq!(config.max_request_header_size(), 16_384);
        assert_eq!(config.graceful_shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.unannounce_propagation_delay(), Duration::from_secs(2));
        assert_eq!(config.inflate_buffer_size(), 0);
        assert_eq!(config.compression_level(), 9);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let overrides = ServerConfigOverrides {
            num_threads: 0.into(),
            ..ServerConfigOverrides::default()
        };
        let err = build(&overrides).unwrap_err();
        assert_eq!(err.field, "numThreads");
        assert_eq!(err.value, "0");
        assert_eq!(err.constraint, Constraint::AtLeast(1));
        assert_eq!(err.to_string(), "numThreads must be >= 1, got 0");
    }

    #[test]
    fn compression_level_bounds() {
        let with_level = |level: i128| ServerConfigOverrides {
            compression_level: level.into(),
            ..ServerConfigOverrides::default()
        };
        let err = build(&with_level(10)).unwrap_err();
        assert_eq!(err.field, "compressionLevel");
        assert_eq!(err.constraint, Constraint::AtMost(9));
        assert_eq!(build(&with_level(-1)).unwrap().compression_level(), -1);
        assert_eq!(build(&with_level(0)).unwrap().compression_level(), 0);
        assert!(build(&with_level(-2)).is_err());
    }

    #[test]
    fn each_minimum_is_enforced() {
        let cases: Vec<(ServerConfigOverrides, &str)> = vec![
            (
                ServerConfigOverrides { queue_size: 0.into(), ..Default::default() },
                "queueSize",
            ),
            (
                ServerConfigOverrides { default_query_timeout: (-1).into(), ..Default::default() },
                "defaultQueryTimeout",
            ),
            (
                ServerConfigOverrides { max_scatter_gather_bytes: 0.into(), ..Default::default() },
                "maxScatterGatherBytes",
            ),
            (
                ServerConfigOverrides { max_query_timeout: 0.into(), ..Default::default() },
                "maxQueryTimeout",
            ),
            (
                ServerConfigOverrides { inflate_buffer_size: (-1).into(), ..Default::default() },
                "inflateBufferSize",
            ),
            (
                ServerConfigOverrides { max_request_header_size: (-1).into(), ..Default::default() },
                "maxRequestHeaderSize",
            ),
        ];
        for (overrides, field) in cases {
            let err = build(&overrides).unwrap_err();
            assert_eq!(err.field, field);
            assert!(matches!(err.constraint, Constraint::AtLeast(_)), "{err}");
        }
    }

    #[test]
    fn int_keys_reject_values_beyond_32_bits() {
        let overrides = ServerConfigOverrides {
            queue_size: (i128::from(i32::MAX) + 1).into(),
            ..ServerConfigOverrides::default()
        };
        let err = build(&overrides).unwrap_err();
        assert_eq!(err.field, "queueSize");
        assert_eq!(err.constraint, Constraint::AtMost(2_147_483_647));
    }

    #[test]
    fn every_key_rejects_explicit_null() {
        for key in keys::ALL {
            let overrides: ServerConfigOverrides =
                serde_json::from_str(&format!(r#"{{"{key}": null}}"#)).unwrap();
            let err = build(&overrides).unwrap_err();
            assert_eq!(err.field, key);
            assert_eq!(err.constraint, Constraint::NonNull, "{key}");
            assert_eq!(err.to_string(), format!("{key} must not be null"));
        }
    }

    #[test]
    fn long_key_beyond_64_bits_is_a_maximum_violation() {
        let overrides: ServerConfigOverrides =
            serde_json::from_str(r#"{"maxQueryTimeout": 9223372036854775808}"#).unwrap();
        let err = build(&overrides).unwrap_err();
        assert_eq!(err.field, "maxQueryTimeout");
        assert_eq!(err.value, "9223372036854775808");
        assert_eq!(err.constraint, Constraint::AtMost(i64::MAX));

        let overrides: ServerConfigOverrides =
            serde_json::from_str(r#"{"maxScatterGatherBytes": 1e30}"#).unwrap();
        let err = build(&overrides).unwrap_err();
        assert_eq!(err.field, "maxScatterGatherBytes");
        assert_eq!(err.constraint, Constraint::AtMost(i64::MAX));
    }

    #[test]
    fn integer_text_is_accepted_for_numeric_keys() {
        let overrides: ServerConfigOverrides =
            serde_json::from_str(r#"{"numThreads": "64", "compressionLevel": " -1 "}"#).unwrap();
        assert_eq!(overrides.num_threads, Setting::Value(64));
        let config = build(&overrides).unwrap();
        assert_eq!(config.num_threads(), 64);
        assert_eq!(config.compression_level(), -1);
    }

    #[test]
    fn non_integer_numeric_values_fail_to_parse() {
        let documents = [
            r#"{"numThreads": "sixty"}"#,
            r#"{"numThreads": 1.5}"#,
            r#"{"numThreads": true}"#,
        ];
        for document in documents {
            let err = serde_json::from_str::<ServerConfigOverrides>(document).unwrap_err();
            assert!(err.to_string().contains("expected an integer"), "{document}: {err}");
        }
    }

    #[test]
    fn malformed_period_is_rejected() {
        let overrides = ServerConfigOverrides {
            graceful_shutdown_timeout: "30 seconds".to_string().into(),
            ..ServerConfigOverrides::default()
        };
        let err = build(&overrides).unwrap_err();
        assert_eq!(err.field, "gracefulShutdownTimeout");
        assert_eq!(err.value, "30 seconds");
        assert_eq!(err.constraint, Constraint::IsoPeriod);
    }

    #[test]
    fn first_violation_in_field_order_is_reported() {
        let overrides = ServerConfigOverrides {
            num_threads: 0.into(),
            compression_level: 42.into(),
            ..ServerConfigOverrides::default()
        };
        assert_eq!(build(&overrides).unwrap_err().field, "numThreads");
    }

    #[test]
    fn equal_inputs_give_equal_values_and_hashes() {
        let overrides = ServerConfigOverrides {
            queue_size: 500.into(),
            max_idle_time: "PT1M".to_string().into(),
            ..ServerConfigOverrides::default()
        };
        let a = build(&overrides).unwrap();
        let b = build(&overrides).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn durations_compare_by_value() {
        let minutes = ServerConfigOverrides {
            max_idle_time: "PT1M".to_string().into(),
            ..ServerConfigOverrides::default()
        };
        let seconds = ServerConfigOverrides {
            max_idle_time: "PT60S".to_string().into(),
            ..ServerConfigOverrides::default()
        };
        assert_eq!(build(&minutes).unwrap(), build(&seconds).unwrap());
    }

    #[test]
    fn queue_size_difference_breaks_equality() {
        let a = build(&ServerConfigOverrides {
            queue_size: 10.into(),
            ..ServerConfigOverrides::default()
        })
        .unwrap();
        let b = build(&ServerConfigOverrides {
            queue_size: 11.into(),
            ..ServerConfigOverrides::default()
        })
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn json_round_trip_preserves_value() {
        let config = build(&ServerConfigOverrides {
            num_threads: 12.into(),
            enable_request_limit: true.into(),
            max_idle_time: "PT1H30M".to_string().into(),
            graceful_shutdown_timeout: "PT0.5S".to_string().into(),
            ..ServerConfigOverrides::default()
        })
        .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, decoded);
    }

    #[test]
    fn document_form_uses_declared_keys() {
        let value = serde_json::to_value(build(&ServerConfigOverrides::default()).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        for key in keys::ALL {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), keys::ALL.len());
        assert_eq!(object["maxIdleTime"], "PT5M");
        assert_eq!(object["unannouncePropogationDelay"], "PT0S");
    }

    #[test]
    fn deserializes_partial_document() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"numThreads": 3, "maxIdleTime": "PT10M"}"#).unwrap();
        assert_eq!(config.num_threads(), 3);
        assert_eq!(config.max_idle_time(), Duration::from_secs(600));
        assert_eq!(config.queue_size(), DEFAULT_QUEUE_SIZE);
    }

    #[test]
    fn invalid_document_surfaces_validation_message() {
        let err = serde_json::from_str::<ServerConfig>(r#"{"numThreads": 0}"#).unwrap_err();
        assert!(err.to_string().contains("numThreads must be >= 1, got 0"), "{err}");
    }

    #[test]
    fn overrides_distinguish_null_from_absent() {
        let overrides: ServerConfigOverrides =
            serde_json::from_str(r#"{"maxIdleTime": null}"#).unwrap();
        assert_eq!(overrides.max_idle_time, Setting::Null);
        assert!(overrides.queue_size.is_unset());
    }

    #[test]
    fn corrected_delay_spelling_is_accepted() {
        let overrides: ServerConfigOverrides =
            serde_json::from_str(r#"{"unannouncePropagationDelay": "PT3S"}"#).unwrap();
        let config = build(&overrides).unwrap();
        assert_eq!(config.unannounce_propagation_delay(), Duration::from_secs(3));
    }

    #[test]
    fn unrecognized_keys_are_collected_and_ignored() {
        let overrides: ServerConfigOverrides =
            serde_json::from_str(r#"{"numThreads": 5, "maxThreads": 99}"#).unwrap();
        assert!(overrides.unrecognized.contains_key("maxThreads"));
        assert_eq!(build(&overrides).unwrap().num_threads(), 5);
        let rendered = serde_json::to_value(&overrides).unwrap();
        assert_eq!(rendered["maxThreads"], 99);
        let config_json = serde_json::to_value(build(&overrides).unwrap()).unwrap();
        assert!(config_json.get("maxThreads").is_none());
    }

    #[test]
    fn merge_prefers_overlay_keys() {
        let base = ServerConfigOverrides {
            num_threads: 8.into(),
            queue_size: 100.into(),
            ..ServerConfigOverrides::default()
        };
        let overlay = ServerConfigOverrides {
            queue_size: 200.into(),
            max_idle_time: Setting::Null,
            ..ServerConfigOverrides::default()
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.num_threads, Setting::Value(8));
        assert_eq!(merged.queue_size, Setting::Value(200));
        assert_eq!(merged.max_idle_time, Setting::Null);
        assert!(merged.compression_level.is_unset());
    }

    #[test]
    fn to_overrides_rebuilds_equal_config() {
        let config = build(&ServerConfigOverrides {
            compression_level: 3.into(),
            ..ServerConfigOverrides::default()
        })
        .unwrap();
        let rebuilt = build(&config.to_overrides()).unwrap();
        assert_eq!(config, rebuilt);
    }

    #[test]
    fn display_lists_every_field_in_order() {
        let rendered = build(&ServerConfigOverrides::default()).unwrap().to_string();
        let names = [
            "numThreads",
            "queueSize",
            "enableRequestLimit",
            "maxIdleTime",
            "defaultQueryTimeout",
            "maxScatterGatherBytes",
            "maxQueryTimeout",
            "maxRequestHeaderSize",
            "gracefulShutdownTimeout",
            "unannouncePropagationDelay",
            "inflateBufferSize",
            "compressionLevel",
        ];
        let mut cursor = 0;
        for name in names {
            let found = rendered[cursor..]
                .find(&format!("{name}="))
                .unwrap_or_else(|| panic!("{name} missing or out of order in {rendered}"));
            cursor += found + name.len();
        }
        assert!(rendered.starts_with("ServerConfig{numThreads=40, "));
        assert!(rendered.contains("maxIdleTime=PT5M"));
        assert!(rendered.ends_with("compressionLevel=-1}"));
    }
}
