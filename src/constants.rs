/// ======================= Analysis defaults =======================
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_NODES: usize = 500;
pub const DEFAULT_TRANSACTION_CAP: usize = 10_000;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
pub const DEFAULT_CRAWL_DEPTH: usize = 0;
pub const DEFAULT_MAX_CONCURRENT_ANALYSES: usize = 8;

/// ======================= Propagation defaults =======================
pub const DEFAULT_DECAY_FACTOR: f64 = 0.5;

pub const DEFAULT_CONCENTRATION_WEIGHT: f64 = 0.15;
pub const DEFAULT_CONCENTRATION_SHARE: f64 = 0.8;
pub const DEFAULT_CONCENTRATION_MIN_COUNTERPARTIES: usize = 3;

pub const DEFAULT_VELOCITY_WEIGHT: f64 = 0.3;
pub const DEFAULT_VELOCITY_MAX_PER_HOUR: f64 = 20.0;
pub const DEFAULT_VELOCITY_MIN_TRANSACTIONS: u64 = 10;

pub const DEFAULT_NEW_ADDRESS_WEIGHT: f64 = 0.2;
pub const DEFAULT_NEW_ADDRESS_MAX_AGE_SECONDS: u64 = 86_400;
pub const DEFAULT_NEW_ADDRESS_MIN_VALUE_ETHER: f64 = 100.0;

pub const DEFAULT_LARGE_VALUE_WEIGHT: f64 = 0.1;
pub const DEFAULT_LARGE_VALUE_RATIO: f64 = 0.2;
pub const DEFAULT_LARGE_VALUE_MIN_EDGES: u64 = 5;

pub const DEFAULT_ADDRESS_REUSE_WEIGHT: f64 = 0.1;
pub const DEFAULT_ADDRESS_REUSE_RATIO: f64 = 0.7;
pub const DEFAULT_ADDRESS_REUSE_MIN_TRANSACTIONS: u64 = 10;

/// ======================= Feed defaults =======================
pub const DEFAULT_ETHPLORER_URL: &str = "https://api.ethplorer.io";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_BASE_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_API_KEY_ENV: &str = "ETHPLORER_API_KEY";
// Public rate-limited key accepted by Ethplorer
pub const ETHPLORER_FREE_KEY: &str = "freekey";

/// ======================= Logging defaults =======================
pub const DEFAULT_LOG_DIRECTORY: &str = ".logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// ======================= Built-in blacklist =======================
pub const BUILTIN_BLACKLIST_SOURCE: &str = "builtin";

// Publicly sanctioned mixer contracts and exploit addresses
pub const BUILTIN_BLACKLIST: &[(&str, &str)] = &[
    ("0x722122dF12D4e14e13Ac3b6895a86e84145b6967", "mixer"),
    ("0xd90e2f925DA726b50C4Ed8D0Fb90Ad053324F31b", "mixer"),
    ("0x12D66f87A04A9E220743712cE6d9bB1B5616B8Fc", "mixer"),
    ("0x47CE0C6eD5B0Ce3d3A51fdb1C52DC66a7c3c2936", "mixer"),
    ("0x910Cbd523D972eb0a6f4cAe4618aD62622b39DbF", "mixer"),
    ("0xA160cdAB225685dA1d56aa342Ad8841c3b53f291", "mixer"),
    ("0x098B716B8Aaf21512996dC57EB0615e2383E2f96", "exploit"),
];
