use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output selected by `FANSITE_ENV`: JSON lines in production,
/// human-readable everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("FANSITE_ENV") {
            Ok(v) if v == "production" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Default filter for a service. Crate names use `-` but tracing targets
/// are module paths, so `fansite-chat` becomes `fansite_chat`.
pub fn default_filter(service_name: &str) -> String {
    let target = service_name.replace('-', "_");
    format!("info,{target}=debug,fansite_shared=debug,tower_http=debug")
}

pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(service_name)));

    match LogFormat::from_env() {
        LogFormat::Json => {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    tracing::info!(service = service_name, "tracing initialized");
}
