//! Runtime settings from environment variables (a `.env` file is loaded first by the binary).

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
    #[error("{0} is required when MEDCMS_UPLOAD_BACKEND=s3")]
    Missing(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadBackend {
    Local { root: PathBuf },
    S3 { bucket: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// PostgreSQL schema holding every CMS table. Must be a valid identifier.
    pub schema: String,
    pub bind: SocketAddr,
    pub max_connections: u32,
    pub upload_backend: UploadBackend,
    /// Prefix joined with the stored key to build public URLs.
    pub public_url: String,
    /// Hard cap on any request body; per-field image rules are checked separately.
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(get: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/medcms".into());

        let schema = get("MEDCMS_SCHEMA").unwrap_or_else(|| "cms".into());
        let ident = regex::Regex::new(r"^[a-z_][a-z0-9_]*$").map_err(|e| SettingsError::Invalid {
            var: "MEDCMS_SCHEMA",
            message: e.to_string(),
        })?;
        if !ident.is_match(&schema) {
            return Err(SettingsError::Invalid {
                var: "MEDCMS_SCHEMA",
                message: format!("'{}' is not a lowercase identifier", schema),
            });
        }

        let bind = get("MEDCMS_BIND")
            .unwrap_or_else(|| "0.0.0.0:3000".into())
            .parse::<SocketAddr>()
            .map_err(|e| SettingsError::Invalid {
                var: "MEDCMS_BIND",
                message: e.to_string(),
            })?;

        let max_connections = parse_or(&get, "MEDCMS_MAX_CONNECTIONS", 5u32)?;
        let max_upload_bytes = parse_or(&get, "MEDCMS_MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?;

        let upload_backend = match get("MEDCMS_UPLOAD_BACKEND").as_deref().unwrap_or("local") {
            "local" => UploadBackend::Local {
                root: PathBuf::from(get("MEDCMS_UPLOAD_DIR").unwrap_or_else(|| "./storage/uploads".into())),
            },
            "s3" => UploadBackend::S3 {
                bucket: get("MEDCMS_UPLOAD_BUCKET")
                    .filter(|s| !s.is_empty())
                    .ok_or(SettingsError::Missing("MEDCMS_UPLOAD_BUCKET"))?,
            },
            other => {
                return Err(SettingsError::Invalid {
                    var: "MEDCMS_UPLOAD_BACKEND",
                    message: format!("expected local or s3, got '{}'", other),
                })
            }
        };

        let public_url = get("MEDCMS_PUBLIC_URL").unwrap_or_else(|| "/storage/uploads".into());

        Ok(Settings {
            database_url,
            schema,
            bind,
            max_connections,
            upload_backend,
            public_url: public_url.trim_end_matches('/').to_string(),
            max_upload_bytes,
        })
    }
}

fn parse_or<F, T>(get: &F, var: &'static str, default: T) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(s) => s.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
            var,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let s = Settings::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(s.schema, "cms");
        assert_eq!(s.bind.port(), 3000);
        assert_eq!(s.max_connections, 5);
        assert_eq!(s.public_url, "/storage/uploads");
        assert!(matches!(s.upload_backend, UploadBackend::Local { .. }));
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let err = Settings::from_lookup(lookup(&[("MEDCMS_UPLOAD_BACKEND", "s3")])).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("MEDCMS_UPLOAD_BUCKET")));
        let s = Settings::from_lookup(lookup(&[
            ("MEDCMS_UPLOAD_BACKEND", "s3"),
            ("MEDCMS_UPLOAD_BUCKET", "media"),
            ("MEDCMS_PUBLIC_URL", "https://cdn.example.com/"),
        ]))
        .expect("s3 settings");
        assert_eq!(s.upload_backend, UploadBackend::S3 { bucket: "media".into() });
        assert_eq!(s.public_url, "https://cdn.example.com");
    }

    #[test]
    fn rejects_bad_schema_and_numbers() {
        assert!(Settings::from_lookup(lookup(&[("MEDCMS_SCHEMA", "bad-name")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("MEDCMS_MAX_CONNECTIONS", "many")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("MEDCMS_BIND", "nowhere")])).is_err());
    }
}
