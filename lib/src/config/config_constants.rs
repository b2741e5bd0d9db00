// lib/src/config/config_constants.rs

pub const DEFAULT_CONFIG_PATH: &str = "./clinic.yaml";
pub const ENV_PREFIX: &str = "CLINIC";
pub const ENV_SEPARATOR: &str = "__";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_DATA_DIRECTORY: &str = "./data";
pub const DEFAULT_SLED_CACHE_CAPACITY: u64 = 256 * 1024 * 1024;

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;
pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;
pub const DEFAULT_OTP_TTL_MINUTES: i64 = 10;
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;
pub const GENERATED_SECRET_LEN: usize = 48;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_MAIL_FROM_NAME: &str = "DR Clinic";

pub const DEFAULT_PYTHON: &str = "python";
pub const DEFAULT_SCRIPT_PATH: &str = "./predict.py";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_PREDICTOR_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
