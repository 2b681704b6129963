//! Image step configuration
//!
//! The field names accepted in JSON files follow the builder template keys
//! (`no_create_image`, `image_name`, `image_precopy`, `orka_endpoint`).

use std::path::Path;

use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// Settings that control how the VM image is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Do not create an image at all
    #[serde(rename = "no_create_image")]
    pub skip_image_creation: bool,

    /// Name of the image to create when saving
    pub image_name: String,

    /// The image was copied earlier in the pipeline; only commit it back
    #[serde(rename = "image_precopy")]
    pub use_precopy: bool,

    /// Base URL of the Orka API, e.g. `http://10.221.188.100`
    #[serde(rename = "orka_endpoint")]
    pub endpoint: String,
}

impl ImageConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
        let config: ImageConfig = serde_json::from_slice(&buf)
            .with_context(|| format!("Parsing {}", path.display()))?;
        Ok(config)
    }

    /// Check the configuration is usable and normalize the endpoint.
    pub fn validate(&mut self) -> Result<()> {
        if self.skip_image_creation {
            return Ok(());
        }
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(eyre!("An Orka endpoint is required"));
        }
        let parsed =
            url::Url::parse(endpoint).wrap_err_with(|| format!("Invalid endpoint: {endpoint}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(eyre!(
                "Unsupported endpoint scheme '{}': {endpoint}",
                parsed.scheme()
            ));
        }
        self.endpoint = endpoint.to_owned();
        if !self.use_precopy && self.image_name.trim().is_empty() {
            return Err(eyre!("An image name is required unless pre-copy is used"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn config(endpoint: &str) -> ImageConfig {
        ImageConfig {
            skip_image_creation: false,
            image_name: "base.img".to_string(),
            use_precopy: false,
            endpoint: endpoint.to_string(),
        }
    }

    #[test]
    fn test_deserialize_template_keys() {
        let json = r#"{
            "no_create_image": false,
            "image_name": "sonoma-base.img",
            "image_precopy": true,
            "orka_endpoint": "http://10.221.188.100"
        }"#;
        let config: ImageConfig = serde_json::from_str(json).unwrap();
        similar_asserts::assert_eq!(
            config,
            ImageConfig {
                skip_image_creation: false,
                image_name: "sonoma-base.img".to_string(),
                use_precopy: true,
                endpoint: "http://10.221.188.100".to_string(),
            }
        );
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ImageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ImageConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"orka_endpoint": "http://orka.example", "image_name": "x.img"}"#)
            .unwrap();
        let config = ImageConfig::from_file(f.path()).unwrap();
        assert_eq!(config.endpoint, "http://orka.example");
        assert_eq!(config.image_name, "x.img");
        assert!(!config.use_precopy);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(b"not json").unwrap();
        assert!(ImageConfig::from_file(bad.path()).is_err());
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let mut c = config("http://10.221.188.100/ ");
        c.validate().unwrap();
        assert_eq!(c.endpoint, "http://10.221.188.100");
    }

    #[test]
    fn test_validate_rejects_bad_endpoints() {
        assert!(config("").validate().is_err());
        assert!(config("not a url").validate().is_err());
        assert!(config("ftp://orka.example").validate().is_err());
    }

    #[test]
    fn test_validate_image_name() {
        let mut c = config("http://orka.example");
        c.image_name = String::new();
        assert!(c.validate().is_err());
        c.use_precopy = true;
        c.validate().unwrap();
    }

    #[test]
    fn test_validate_skip_ignores_everything_else() {
        let mut c = ImageConfig {
            skip_image_creation: true,
            ..Default::default()
        };
        c.validate().unwrap();
    }
}
