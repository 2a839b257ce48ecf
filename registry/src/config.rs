/// Scope of the admission check: which running executions count toward the
/// 1.0 capacity ceiling when a new one registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionScope {
    /// Sum running factors within the draft's (location, environment) pair.
    Scoped,
    /// Sum running factors across every location and environment.
    Global,
}

impl AdmissionScope {
    fn from_env(value: &str) -> anyhow::Result<Self> {
        match value {
            "scoped" => Ok(Self::Scoped),
            "global" => Ok(Self::Global),
            other => Err(anyhow::anyhow!(
                "Invalid REGISTRY_ADMISSION_SCOPE '{other}'. Expected 'scoped' or 'global'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the registry listens on
    pub port: u16,
    /// Path to the registry SQLite database
    pub database_url: String,
    /// Whether admission sums running load per (location, environment) or
    /// across the whole system.
    pub admission_scope: AdmissionScope,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_parse("REGISTRY_PORT", 8080)?,
            database_url: env_str("REGISTRY_DATABASE_URL", "sqlite:./data/registry.db"),
            admission_scope: AdmissionScope::from_env(&env_str(
                "REGISTRY_ADMISSION_SCOPE",
                "scoped",
            ))?,
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}
