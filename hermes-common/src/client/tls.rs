use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ConfigError, UnknownVariant};
use crate::settings::Settings;

pub const TRUSTSTORE_PATH: &str = "httpclient.ssl.truststore.path";
pub const TRUSTSTORE_PASSWORD: &str = "httpclient.ssl.truststore.password";
pub const TRUSTSTORE_TYPE: &str = "httpclient.ssl.truststore.type";
pub const TRUSTSTORE_ALGORITHM: &str = "httpclient.ssl.truststore.algorithm";
pub const TRUSTSTORE_ALWAYS_TRUST: &str = "httpclient.ssl.truststore.always.trust";

/// 信任库文件格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustStoreType {
    #[default]
    Pem,
    Der,
}

impl FromStr for TrustStoreType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pem" => Ok(TrustStoreType::Pem),
            "der" => Ok(TrustStoreType::Der),
            _ => Err(UnknownVariant::new("trust store type", s)),
        }
    }
}

/// TLS 信任配置
///
/// - 指定信任库时，证书作为额外的根证书加入
/// - `always_trust` 关闭证书校验，属于显式开启的风险选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub truststore_path: Option<PathBuf>,
    pub truststore_password: Option<String>,
    pub truststore_type: TrustStoreType,
    pub truststore_algorithm: Option<String>,
    pub always_trust: bool,
}

impl TlsSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let truststore_type = match settings.get_string(TRUSTSTORE_TYPE) {
            None => TrustStoreType::default(),
            Some(value) => value.parse::<TrustStoreType>().map_err(|_| {
                ConfigError::invalid_value(TRUSTSTORE_TYPE, value, "supported types are PEM and DER")
            })?,
        };

        let tls = Self {
            truststore_path: settings.get_string(TRUSTSTORE_PATH).map(PathBuf::from),
            truststore_password: settings.get_string(TRUSTSTORE_PASSWORD).map(str::to_string),
            truststore_type,
            truststore_algorithm: settings.get_string(TRUSTSTORE_ALGORITHM).map(str::to_string),
            always_trust: settings.get_bool(TRUSTSTORE_ALWAYS_TRUST, false)?,
        };
        if tls.truststore_password.is_some() || tls.truststore_algorithm.is_some() {
            log::warn!(
                "'{}' and '{}' do not apply to PEM/DER trust stores and are ignored",
                TRUSTSTORE_PASSWORD,
                TRUSTSTORE_ALGORITHM
            );
        }
        Ok(tls)
    }

    fn read_truststore(&self) -> Result<Option<(String, Vec<u8>)>, ConfigError> {
        let Some(path) = &self.truststore_path else {
            return Ok(None);
        };
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| ConfigError::TrustStore {
            path: display.clone(),
            message: e.to_string(),
        })?;
        Ok(Some((display, bytes)))
    }

    /// 应用到 reqwest 客户端构建器
    pub(crate) fn configure_reqwest(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, ConfigError> {
        if self.always_trust {
            log::warn!("TLS certificate verification is disabled ('{}' = true)", TRUSTSTORE_ALWAYS_TRUST);
            return Ok(builder.danger_accept_invalid_certs(true));
        }

        let Some((path, bytes)) = self.read_truststore()? else {
            return Ok(builder);
        };
        let certificate = match self.truststore_type {
            TrustStoreType::Pem => reqwest::Certificate::from_pem(&bytes),
            TrustStoreType::Der => reqwest::Certificate::from_der(&bytes),
        }
        .map_err(|e| ConfigError::TrustStore {
            path,
            message: e.to_string(),
        })?;
        Ok(builder.add_root_certificate(certificate))
    }

    /// 应用到 ureq agent 配置
    ///
    /// ureq 后端只支持 `always_trust`，指定信任库文件会被拒绝。
    pub(crate) fn ureq_tls_config(&self) -> Result<Option<ureq::tls::TlsConfig>, ConfigError> {
        if self.always_trust {
            log::warn!("TLS certificate verification is disabled ('{}' = true)", TRUSTSTORE_ALWAYS_TRUST);
            return Ok(Some(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            ));
        }
        if let Some(path) = &self.truststore_path {
            return Err(ConfigError::TrustStore {
                path: path.display().to_string(),
                message: "custom trust stores are only supported by the reqwest implementation"
                    .to_string(),
            });
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tls = TlsSettings::from_settings(&Settings::new()).unwrap();
        assert_eq!(tls, TlsSettings::default());
        assert!(!tls.always_trust);
    }

    #[test]
    fn test_unsupported_truststore_type() {
        let settings = Settings::new().with(TRUSTSTORE_TYPE, "JKS");
        assert!(matches!(
            TlsSettings::from_settings(&settings),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_always_trust_configures_reqwest() {
        let settings = Settings::new().with(TRUSTSTORE_ALWAYS_TRUST, "true");
        let tls = TlsSettings::from_settings(&settings).unwrap();
        assert!(tls.always_trust);

        let builder = tls.configure_reqwest(reqwest::Client::builder()).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_missing_truststore_file() {
        let settings = Settings::new().with(TRUSTSTORE_PATH, "/nonexistent/truststore.pem");
        let tls = TlsSettings::from_settings(&settings).unwrap();

        let result = tls.configure_reqwest(reqwest::Client::builder());
        assert!(matches!(result, Err(ConfigError::TrustStore { .. })));
    }

    #[test]
    fn test_ureq_rejects_custom_truststore() {
        let tls = TlsSettings {
            truststore_path: Some(PathBuf::from("/tmp/ca.pem")),
            ..Default::default()
        };
        assert!(tls.ureq_tls_config().is_err());
        assert!(TlsSettings::default().ureq_tls_config().unwrap().is_none());
    }
}
