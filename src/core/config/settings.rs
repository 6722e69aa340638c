use super::parsing::{
    env_optional, env_or_default, is_supported_sheet_extension, parse_bool, parse_cors_origins,
    parse_environment, parse_grading_provider, parse_string_list, parse_u16, parse_u32,
    parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GradingProvider,
    GradingSettings, RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelemetrySettings, UploadSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EDUBOARD_HOST", "0.0.0.0");
        let port = env_or_default("EDUBOARD_PORT", "8000");

        let environment = parse_environment(
            env_optional("EDUBOARD_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_optional("EDUBOARD_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "EduBoard API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let session_expire_minutes = parse_u64(
            "SESSION_EXPIRE_MINUTES",
            env_or_default("SESSION_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");
        let session_cookie_secure = env_optional("SESSION_COOKIE_SECURE")
            .map(|value| parse_bool(&value))
            .unwrap_or_else(|| environment.is_production());

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "eduboard");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "eduboard_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let provider = parse_grading_provider(env_optional("GRADING_PROVIDER"))?;
        let grading_api_key = env_or_default("GRADING_API_KEY", "");
        let grading_base_url = env_or_default("GRADING_BASE_URL", "");
        let grading_model = env_or_default("GRADING_MODEL", "gpt-4o-mini");
        let grading_max_tokens =
            parse_u32("GRADING_MAX_TOKENS", env_or_default("GRADING_MAX_TOKENS", "4000"))?;
        let grading_request_timeout = parse_u64(
            "GRADING_REQUEST_TIMEOUT",
            env_or_default("GRADING_REQUEST_TIMEOUT", "120"),
        )?;
        let grading_max_retries =
            parse_u32("GRADING_MAX_RETRIES", env_or_default("GRADING_MAX_RETRIES", "3"))?;
        let mock_seed = env_optional("MOCK_GRADING_SEED")
            .map(|value| parse_u64("MOCK_GRADING_SEED", value))
            .transpose()?;
        let mock_step_delay_ms = parse_u64(
            "MOCK_GRADING_STEP_DELAY_MS",
            env_or_default("MOCK_GRADING_STEP_DELAY_MS", "250"),
        )?;

        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;
        let allowed_sheet_extensions = parse_string_list(
            env_optional("ALLOWED_SHEET_EXTENSIONS"),
            &["jpg", "jpeg", "png", "pdf"],
        );
        let max_sheets_per_evaluation = parse_u64(
            "MAX_SHEETS_PER_EVALUATION",
            env_or_default("MAX_SHEETS_PER_EVALUATION", "60"),
        )?;

        let first_superuser_email = env_or_default("FIRST_SUPERUSER_EMAIL", "admin@eduboard.local");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("EDUBOARD_LOG_LEVEL", "info");
        let json = env_optional("EDUBOARD_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                session_expire_minutes,
                algorithm,
                session_cookie_secure,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            grading: GradingSettings {
                provider,
                api_key: grading_api_key,
                base_url: grading_base_url,
                model: grading_model,
                max_tokens: grading_max_tokens,
                request_timeout_seconds: grading_request_timeout,
                max_retries: grading_max_retries,
                mock_seed,
                mock_step_delay_ms,
            },
            uploads: UploadSettings {
                max_upload_size_mb,
                allowed_sheet_extensions,
                max_sheets_per_evaluation,
            },
            admin: AdminSettings { first_superuser_email, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn uploads(&self) -> &UploadSettings {
        &self.uploads
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.uploads.allowed_sheet_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_SHEET_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.uploads.allowed_sheet_extensions {
            if !is_supported_sheet_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_SHEET_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.uploads.max_upload_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_UPLOAD_SIZE_MB",
                value: "0".to_string(),
            });
        }

        if self.uploads.max_sheets_per_evaluation == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_SHEETS_PER_EVALUATION",
                value: "0".to_string(),
            });
        }

        if self.security.algorithm != "HS256" {
            return Err(ConfigError::InvalidValue {
                field: "ALGORITHM",
                value: self.security.algorithm.clone(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }
        if self.grading.provider == GradingProvider::Http {
            if self.grading.api_key.is_empty() {
                return Err(ConfigError::MissingSecret("GRADING_API_KEY"));
            }
            if self.grading.base_url.is_empty() {
                return Err(ConfigError::MissingSecret("GRADING_BASE_URL"));
            }
        }

        Ok(())
    }
}
