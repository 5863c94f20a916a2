//! Настройки приложения (settings.json).
//! schemaVersion: 1

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::attention::AttentionConfig;
use crate::algorithm::intent::IntentConfig;
use crate::algorithm::nearest_word::LocatorConfig;
use crate::algorithm::warp::MAX_WARP_COMPENSATION;
use crate::capture::pipeline::PipelineOptions;
use crate::capture::region::CaptureConfig;
use crate::error::{ReaderError, Result};
use crate::reader::sampler::SamplerConfig;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_true() -> bool {
    true
}

/// Корневой объект settings.json. Отсутствующие секции берутся по умолчанию.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSettings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub attention: AttentionConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Начальное значение компенсации (0.0–0.5).
    #[serde(default, alias = "warp_compensation")]
    pub warp_compensation: f64,
    #[serde(default = "default_ocr_language", alias = "ocr_language")]
    pub ocr_language: String,
    /// Просить у сервиса потоковый ответ.
    #[serde(default = "default_true", alias = "stream_explanations")]
    pub stream_explanations: bool,
    /// Прикладывать снимок области к запросу объяснения.
    #[serde(default = "default_true", alias = "attach_image")]
    pub attach_image: bool,
    #[serde(default = "default_true", alias = "attention_enabled")]
    pub attention_enabled: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings {
            schema_version: SCHEMA_VERSION,
            intent: IntentConfig::default(),
            locator: LocatorConfig::default(),
            attention: AttentionConfig::default(),
            sampler: SamplerConfig::default(),
            capture: CaptureConfig::default(),
            warp_compensation: 0.0,
            ocr_language: default_ocr_language(),
            stream_explanations: true,
            attach_image: true,
            attention_enabled: true,
        }
    }
}

impl ReaderSettings {
    /// Загружает настройки; при отсутствии файла возвращает значения по умолчанию.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("settings: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| ReaderError::io(path, e))?;
        let settings: ReaderSettings =
            serde_json::from_str(&raw).map_err(|e| ReaderError::json(path, e))?;

        if settings.schema_version != SCHEMA_VERSION {
            return Err(ReaderError::Schema {
                what: "settings",
                expected: SCHEMA_VERSION,
                found: settings.schema_version,
            });
        }

        log::info!("settings: loaded {}", path.display());
        Ok(settings.sanitized())
    }

    /// Загружает из стандартного пути `{config_dir}/readpoint/settings.json`.
    pub fn load_default() -> Result<Self> {
        match default_settings_file() {
            Some(path) => Self::load(&path),
            None => {
                log::warn!("settings: no config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Сохраняет настройки в `path` (pretty JSON), создавая папку при необходимости.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReaderError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ReaderError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| ReaderError::io(path, e))?;

        log::info!("settings: saved {}", path.display());
        Ok(())
    }

    /// Параметры конвейера захвата, собранные из настроек.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            language: self.ocr_language.clone(),
            stream: self.stream_explanations,
            include_image: self.attach_image,
            max_encoded_width: self.capture.max_encoded_width,
            locator: self.locator.clone(),
        }
    }

    fn sanitized(mut self) -> Self {
        if !self.warp_compensation.is_finite() {
            self.warp_compensation = 0.0;
        }
        self.warp_compensation = self.warp_compensation.clamp(0.0, MAX_WARP_COMPENSATION);
        if self.ocr_language.trim().is_empty() {
            self.ocr_language = default_ocr_language();
        }
        self
    }
}

pub fn default_settings_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("readpoint").join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Каталог под тест, удаляется при выходе из области видимости.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("readpoint-settings-{}", uuid::Uuid::new_v4())))
        }

        fn file(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new();
        let path = dir.file("absent.json");
        let settings = ReaderSettings::load(&path).unwrap();
        assert_eq!(settings, ReaderSettings::default());
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let dir = TempDir::new();
        let path = dir.file("partial.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"schemaVersion":1,"intent":{"lightMs":1000},"warp_compensation":0.9}"#,
        )
        .unwrap();

        let settings = ReaderSettings::load(&path).unwrap();
        assert_eq!(settings.intent.light_ms, 1000);
        assert_eq!(settings.intent.hard_ms, 5_500);
        assert_eq!(settings.locator, LocatorConfig::default());
        assert_eq!(settings.warp_compensation, MAX_WARP_COMPENSATION);
        assert!(settings.stream_explanations);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new();
        let path = dir.file("nested/settings.json");
        let mut settings = ReaderSettings::default();
        settings.ocr_language = "rus".to_string();
        settings.attention.grid_size_px = 40.0;
        settings.save(&path).unwrap();

        let loaded = ReaderSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.pipeline_options().language, "rus");

        let root = dir.0.clone();
        drop(dir);
        assert!(!root.exists());
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let dir = TempDir::new();
        let path = dir.file("future.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"schemaVersion":7}"#).unwrap();

        let err = ReaderSettings::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Schema {
                expected: 1,
                found: 7,
                ..
            }
        ));
    }
}
