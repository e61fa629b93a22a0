mod auth;
mod mailrules;

pub use auth::AuthConfig;
pub use mailrules::Config;
