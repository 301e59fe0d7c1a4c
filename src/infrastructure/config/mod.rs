mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, OtelConfig, RepositoryConfig, ServerConfig, Settings,
    StorageConfig,
};
