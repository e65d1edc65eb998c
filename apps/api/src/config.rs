use anyhow::{Context, Result};

use crate::llm_client::{ApiKeys, ModelSpec};

const DEFAULT_MODEL: &str = "groq:llama-3.3-70b-versatile";
const MIN_CACHE_TTL_SECS: u64 = 120;
const MAX_CACHE_TTL_SECS: u64 = 300;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_prices: StripePrices,
    pub llm_keys: ApiKeys,
    pub default_model: ModelSpec,
    pub fallback_models: Vec<ModelSpec>,
    pub app_url: String,
    pub cache_ttl_secs: u64,
    pub rate_limit_per_minute: u32,
    pub free_resume_limit: i32,
    pub request_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

/// Stripe Price ids per access tier.
#[derive(Debug, Clone, Default)]
pub struct StripePrices {
    pub two_day: Option<String>,
    pub seven_day: Option<String>,
    pub thirty_day: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let default_model = optional_env("LLM_DEFAULT_MODEL")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
            .parse::<ModelSpec>()
            .map_err(anyhow::Error::msg)
            .context("LLM_DEFAULT_MODEL must be provider:model")?;

        let fallback_models = parse_model_list(&optional_env("LLM_FALLBACK_MODELS").unwrap_or_default())
            .context("LLM_FALLBACK_MODELS must be a comma-separated list of provider:model")?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            supabase_url: require_env("SUPABASE_URL")?.trim_end_matches('/').to_string(),
            supabase_anon_key: require_env("SUPABASE_ANON_KEY")?,
            stripe_secret_key: require_env("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,
            stripe_prices: StripePrices {
                two_day: optional_env("STRIPE_PRICE_2DAY"),
                seven_day: optional_env("STRIPE_PRICE_7DAY"),
                thirty_day: optional_env("STRIPE_PRICE_30DAY"),
            },
            llm_keys: ApiKeys {
                anthropic: optional_env("ANTHROPIC_API_KEY"),
                groq: optional_env("GROQ_API_KEY"),
                openai: optional_env("OPENAI_API_KEY"),
            },
            default_model,
            fallback_models,
            app_url: optional_env("APP_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            cache_ttl_secs: clamp_cache_ttl(parse_env("CACHE_TTL_SECS", MAX_CACHE_TTL_SECS)?),
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 20)?,
            free_resume_limit: parse_env("FREE_RESUME_LIMIT", 1)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 60)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_model_list(raw: &str) -> Result<Vec<ModelSpec>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ModelSpec>().map_err(anyhow::Error::msg))
        .collect()
}

fn clamp_cache_ttl(secs: u64) -> u64 {
    secs.clamp(MIN_CACHE_TTL_SECS, MAX_CACHE_TTL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::Provider;

    #[test]
    fn test_parse_model_list() {
        let models =
            parse_model_list(" groq:llama-3.1-8b-instant, anthropic:claude-haiku-4-5 ,,").unwrap();
        assert_eq!(
            models,
            vec![
                ModelSpec::new(Provider::Groq, "llama-3.1-8b-instant"),
                ModelSpec::new(Provider::Anthropic, "claude-haiku-4-5"),
            ]
        );
        assert!(parse_model_list("").unwrap().is_empty());
        assert!(parse_model_list("groq:").is_err());
    }

    #[test]
    fn test_cache_ttl_is_clamped_to_two_to_five_minutes() {
        assert_eq!(clamp_cache_ttl(10), 120);
        assert_eq!(clamp_cache_ttl(200), 200);
        assert_eq!(clamp_cache_ttl(3600), 300);
    }

    #[test]
    fn test_default_model_parses() {
        let spec: ModelSpec = DEFAULT_MODEL.parse().unwrap();
        assert_eq!(spec.provider, Provider::Groq);
    }
}
