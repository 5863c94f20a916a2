//! Загрузка/сохранение журналов сессий (session.json).

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ReaderError, Result};
use crate::models::events::{SessionEvent, SessionFile, SCHEMA_VERSION};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListItem {
    pub session_id: String,
    pub start_time_ms: u64,
    pub event_count: usize,
    /// Длительность по последнему событию (мс).
    pub duration_ms: u64,
    pub session_path: String,
}

/// Новый пустой журнал с UUID и текущим временем старта.
pub fn new_session_file(screen_width: u32, screen_height: u32) -> SessionFile {
    SessionFile {
        schema_version: SCHEMA_VERSION,
        session_id: uuid::Uuid::new_v4().to_string(),
        start_time_ms: chrono::Utc::now().timestamp_millis().max(0) as u64,
        screen_width,
        screen_height,
        events: Vec::new(),
    }
}

/// Загружает журнал сессии из файла.
pub fn load_session(path: &Path) -> Result<SessionFile> {
    log::info!("load_session: path={}", path.display());

    let raw = std::fs::read_to_string(path).map_err(|e| ReaderError::io(path, e))?;
    let session: SessionFile =
        serde_json::from_str(&raw).map_err(|e| ReaderError::json(path, e))?;

    if session.schema_version != SCHEMA_VERSION {
        return Err(ReaderError::Schema {
            what: "session",
            expected: SCHEMA_VERSION,
            found: session.schema_version,
        });
    }

    Ok(session)
}

/// Сохраняет журнал. Без `path` используется стандартный путь
/// `{data_dir}/readpoint/sessions/{session_id}.json`.
pub fn save_session(session: &SessionFile, path: Option<&Path>) -> Result<PathBuf> {
    if session.schema_version != SCHEMA_VERSION {
        return Err(ReaderError::Schema {
            what: "session",
            expected: SCHEMA_VERSION,
            found: session.schema_version,
        });
    }

    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_session_file(&session.session_id)?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ReaderError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(session).map_err(|e| ReaderError::json(&path, e))?;
    std::fs::write(&path, json).map_err(|e| ReaderError::io(&path, e))?;

    log::info!(
        "save_session: id={} events={} path={}",
        session.session_id,
        session.events.len(),
        path.display()
    );
    Ok(path)
}

/// Список журналов в папке `root`, новые первыми. Битые файлы пропускаются.
pub fn list_sessions(root: &Path) -> Result<Vec<SessionListItem>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::<SessionListItem>::new();
    let entries = std::fs::read_dir(root).map_err(|e| ReaderError::io(root, e))?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("list_sessions: failed to read dir entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !path.is_file() || !is_json {
            continue;
        }

        let session = match load_session(&path) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("list_sessions: skip {}: {e}", path.display());
                continue;
            }
        };

        sessions.push(SessionListItem {
            duration_ms: session.events.iter().map(SessionEvent::ts).max().unwrap_or(0),
            event_count: session.events.len(),
            session_id: session.session_id,
            start_time_ms: session.start_time_ms,
            session_path: path.to_string_lossy().to_string(),
        });
    }

    sessions.sort_by(|a, b| {
        b.start_time_ms
            .cmp(&a.start_time_ms)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    Ok(sessions)
}

pub fn default_session_file(session_id: &str) -> Result<PathBuf> {
    Ok(sessions_root()?.join(format!("{session_id}.json")))
}

pub fn sessions_root() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .ok_or_else(|| ReaderError::InvalidInput("Failed to resolve data directory".to_string()))?;
    Ok(base.join("readpoint").join("sessions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::InputMode;
    use crate::models::level::DetailLevel;

    /// Временный каталог теста, удаляется при drop.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("readpoint-sessions-{}", uuid::Uuid::new_v4())))
        }

        fn path(&self) -> &Path {
            &self.0
        }

        fn join(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn sample_session(start_time_ms: u64) -> SessionFile {
        let mut session = new_session_file(1280, 720);
        session.start_time_ms = start_time_ms;
        session.events = vec![
            SessionEvent::PointerSample {
                ts: 100,
                x: 10.0,
                y: 20.0,
                input_mode: InputMode::Fingertip,
                nearest_word: Some("cell".to_string()),
                pressure: None,
                level: None,
                interest_score: 12.5,
            },
            SessionEvent::ExplainTriggered {
                ts: 5_500,
                level: DetailLevel::Hard,
            },
        ];
        session
    }

    #[test]
    fn save_and_load_keep_events() {
        let dir = TempDir::new();
        let session = sample_session(1_000);
        let path = save_session(&session, Some(&dir.join("one.json"))).unwrap();

        let loaded = load_session(&path).unwrap();
        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.events, session.events);
        assert_eq!((loaded.screen_width, loaded.screen_height), (1280, 720));
    }

    #[test]
    fn load_rejects_other_schema_versions() {
        let dir = TempDir::new();
        std::fs::create_dir_all(dir.path()).unwrap();
        let path = dir.join("old.json");
        let mut session = sample_session(0);
        session.schema_version = 0;
        std::fs::write(&path, serde_json::to_string(&session).unwrap()).unwrap();

        assert!(matches!(
            load_session(&path),
            Err(ReaderError::Schema { found: 0, .. })
        ));
        assert!(save_session(&session, Some(&path)).is_err());
    }

    #[test]
    fn list_sorts_newest_first_and_skips_garbage() {
        let dir = TempDir::new();
        save_session(&sample_session(1_000), Some(&dir.join("a.json"))).unwrap();
        save_session(&sample_session(9_000), Some(&dir.join("b.json"))).unwrap();
        std::fs::write(dir.join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let listed = list_sessions(dir.path()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].start_time_ms, 9_000);
        assert_eq!(listed[0].event_count, 2);
        assert_eq!(listed[0].duration_ms, 5_500);

        assert!(list_sessions(&dir.join("missing")).unwrap().is_empty());

        let root = dir.path().to_path_buf();
        drop(dir);
        assert!(!root.exists());
    }
}
