use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub log_json: bool,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to the review Postgres instance")?;
        Self::from_vars(database_url, |name| std::env::var(name).ok())
    }

    fn from_vars(
        database_url: String,
        var: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let max_connections = match var("REVIEW_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("REVIEW_MAX_CONNECTIONS is not a number: {value}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            max_connections,
            log_json: var("REVIEW_LOG_JSON")
                .as_deref()
                .and_then(parse_bool)
                .unwrap_or(false),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
