//! Схема журнала сессии чтения (session.json).
//! schemaVersion: 1

use serde::{Deserialize, Serialize};

use crate::models::level::DetailLevel;

pub const SCHEMA_VERSION: u32 = 1;

/// Источник указателя.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Кончик указательного пальца из hand-tracking.
    Fingertip,
    /// Стилус с давлением.
    Stylus,
    Mouse,
}

/// Почему завершилась сессия удержания.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionEndReason {
    /// Указатель пропал из кадра или стилус поднят.
    Lost,
    /// Указатель ушёл дальше допуска от стартовой позиции.
    Drift,
}

/// Событие журнала сессии.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Сэмпл позиции указателя (~10 Гц).
    PointerSample {
        /// Миллисекунды от начала сессии.
        ts: u64,
        x: f64,
        y: f64,
        #[serde(rename = "inputMode", alias = "input_mode")]
        input_mode: InputMode,
        #[serde(rename = "nearestWord", alias = "nearest_word")]
        nearest_word: Option<String>,
        pressure: Option<f64>,
        level: Option<DetailLevel>,
        #[serde(rename = "interestScore", alias = "interest_score")]
        interest_score: f64,
    },
    /// Разовый захват области кадра.
    Capture { ts: u64, x: f64, y: f64 },
    /// Смена уровня детализации.
    LevelChange {
        ts: u64,
        from: Option<DetailLevel>,
        to: DetailLevel,
    },
    /// Запрос объяснения отправлен.
    ExplainTriggered { ts: u64, level: DetailLevel },
    /// Завершение сессии удержания.
    PointerSessionEnded { ts: u64, reason: SessionEndReason },
    /// Голосовая заметка пользователя.
    VoiceAnnotation { ts: u64, text: String },
    /// Тема, выбранная пользователем.
    TopicSelected { ts: u64, topic: String },
    /// Сводка OCR по странице.
    PageOcrSummary {
        ts: u64,
        #[serde(rename = "wordCount", alias = "word_count")]
        word_count: usize,
        #[serde(rename = "textPreview", alias = "text_preview")]
        text_preview: String,
    },
}

impl SessionEvent {
    /// Возвращает временную метку события.
    pub fn ts(&self) -> u64 {
        match self {
            SessionEvent::PointerSample { ts, .. } => *ts,
            SessionEvent::Capture { ts, .. } => *ts,
            SessionEvent::LevelChange { ts, .. } => *ts,
            SessionEvent::ExplainTriggered { ts, .. } => *ts,
            SessionEvent::PointerSessionEnded { ts, .. } => *ts,
            SessionEvent::VoiceAnnotation { ts, .. } => *ts,
            SessionEvent::TopicSelected { ts, .. } => *ts,
            SessionEvent::PageOcrSummary { ts, .. } => *ts,
        }
    }

    /// Копия события с меткой времени `ts`.
    pub fn with_ts(mut self, new_ts: u64) -> Self {
        match &mut self {
            SessionEvent::PointerSample { ts, .. }
            | SessionEvent::Capture { ts, .. }
            | SessionEvent::LevelChange { ts, .. }
            | SessionEvent::ExplainTriggered { ts, .. }
            | SessionEvent::PointerSessionEnded { ts, .. }
            | SessionEvent::VoiceAnnotation { ts, .. }
            | SessionEvent::TopicSelected { ts, .. }
            | SessionEvent::PageOcrSummary { ts, .. } => *ts = new_ts,
        }
        self
    }
}

/// Корневой контейнер файла session.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
    pub schema_version: u32,
    /// UUID сессии.
    pub session_id: String,
    /// Unix timestamp (мс) старта сессии, точка синхронизации.
    pub start_time_ms: u64,
    /// Размер поверхности оверлея.
    pub screen_width: u32,
    pub screen_height: u32,
    pub events: Vec<SessionEvent>,
}
