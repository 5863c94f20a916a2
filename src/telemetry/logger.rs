//! Журнал сессии чтения: сэмплы указателя и дискретные события.
//!
//! Архитектура:
//!   1. `start_session` создаёт канал и поток-процессор (`readpoint-session-log`).
//!      Процессор переводит абсолютные метки времени в относительные и копит события.
//!   2. `record` вызывается из сэмплера и движка; без активной сессии событие отбрасывается.
//!   3. `stop_session` отправляет `LogInput::Stop` и сбрасывает канал.
//!      Вызывающий ждёт JoinHandle процессора и получает итоговый `Vec<SessionEvent>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ReaderError, Result};
use crate::models::events::SessionEvent;

const CHANNEL_CAPACITY: usize = 8192;

// ─── Внутренние типы ─────────────────────────────────────────────────────────

/// Сообщение процессору сессии.
pub enum LogInput {
    Event {
        /// Абсолютное Unix-время события (мс).
        ts_abs: u64,
        event: SessionEvent,
    },
    /// Сигнал завершения: процессор выходит из цикла и возвращает накопленные события.
    Stop,
}

// ─── Разделяемое состояние ────────────────────────────────────────────────────

/// Состояние, разделяемое между сэмплером, движком и управляющим кодом.
pub struct SessionLogger {
    /// Канал в текущий процессор сессии; `None`, если запись не идёт.
    current_tx: Mutex<Option<SyncSender<LogInput>>>,
    /// True, пока запись на паузе и входящие события игнорируются.
    is_paused: AtomicBool,
}

impl SessionLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current_tx: Mutex::new(None),
            is_paused: AtomicBool::new(false),
        })
    }

    pub fn is_active(&self) -> bool {
        self.tx_slot().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Relaxed)
    }

    fn tx_slot(&self) -> MutexGuard<'_, Option<SyncSender<LogInput>>> {
        self.current_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ─── Управление сессией ───────────────────────────────────────────────────────

/// Начинает новую сессию журнала.
///
/// Создаёт канал и запускает поток-процессор. Возвращает `JoinHandle`, при
/// `.join()` которого получаем `Vec<SessionEvent>` с метками от `start_ms`.
pub fn start_session(
    logger: &Arc<SessionLogger>,
    start_ms: u64,
) -> std::thread::JoinHandle<Vec<SessionEvent>> {
    logger.is_paused.store(false, Ordering::Relaxed);
    let (tx, rx) = sync_channel::<LogInput>(CHANNEL_CAPACITY);
    if logger.tx_slot().replace(tx).is_some() {
        log::warn!("session log restarted while a session was active");
    }

    std::thread::Builder::new()
        .name("readpoint-session-log".to_string())
        .spawn(move || {
            let mut events = Vec::<SessionEvent>::new();

            for input in rx {
                match input {
                    LogInput::Stop => break,
                    LogInput::Event { ts_abs, event } => {
                        events.push(event.with_ts(ts_abs.saturating_sub(start_ms)));
                    }
                }
            }

            log::info!("session log closed with {} events", events.len());
            events
        })
        .expect("Failed to spawn session log thread")
}

/// Передаёт событие процессору. Возвращает `false`, если событие отброшено.
///
/// Не блокирует: при переполненном канале событие теряется.
pub fn record(logger: &SessionLogger, ts_abs: u64, event: SessionEvent) -> bool {
    if logger.is_paused() {
        return false;
    }

    // Клонируем Sender под блокировкой и сразу её отпускаем.
    let Some(tx) = logger.tx_slot().clone() else {
        return false;
    };

    match tx.try_send(LogInput::Event { ts_abs, event }) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log::debug!("session log channel full, dropping event");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Сигнализирует текущей сессии завершиться: отправляет `Stop` и сбрасывает канал.
/// После этого вызывающий должен дождаться `JoinHandle` процессора.
pub fn stop_session(logger: &SessionLogger) {
    logger.is_paused.store(false, Ordering::Relaxed);
    let tx = logger.tx_slot().take();
    if let Some(tx) = tx {
        tx.send(LogInput::Stop).ok();
    }
}

pub fn set_paused(logger: &SessionLogger, paused: bool) {
    logger.is_paused.store(paused, Ordering::Relaxed);
}

/// Дожидается процессора после `stop_session` и забирает накопленные события.
pub fn join_session(
    handle: std::thread::JoinHandle<Vec<SessionEvent>>,
) -> Result<Vec<SessionEvent>> {
    handle.join().map_err(|_| {
        log::error!("session log thread panicked, events lost");
        ReaderError::WorkerPanicked("session log")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::level::DetailLevel;

    fn explain(ts: u64) -> SessionEvent {
        SessionEvent::ExplainTriggered {
            ts,
            level: DetailLevel::Medium,
        }
    }

    #[test]
    fn collects_events_with_session_relative_timestamps() {
        let logger = SessionLogger::new();
        let handle = start_session(&logger, 10_000);

        assert!(record(&logger, 10_250, explain(0)));
        assert!(record(
            &logger,
            10_900,
            SessionEvent::VoiceAnnotation {
                ts: 0,
                text: "check this".to_string(),
            }
        ));
        // До старта сессии зажимается в 0.
        assert!(record(&logger, 9_000, explain(0)));

        stop_session(&logger);
        let events = handle.join().expect("processor thread");
        let stamps: Vec<u64> = events.iter().map(SessionEvent::ts).collect();
        assert_eq!(stamps, vec![250, 900, 0]);
        assert!(!logger.is_active());
    }

    #[test]
    fn drops_events_without_session_or_while_paused() {
        let logger = SessionLogger::new();
        assert!(!record(&logger, 1, explain(0)));

        let handle = start_session(&logger, 0);
        set_paused(&logger, true);
        assert!(!record(&logger, 5, explain(0)));
        set_paused(&logger, false);
        assert!(record(&logger, 6, explain(0)));

        stop_session(&logger);
        let events = handle.join().expect("processor thread");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ts(), 6);
    }

    #[test]
    fn join_reports_panicked_processor() {
        let handle = std::thread::spawn(|| -> Vec<SessionEvent> { panic!("processor died") });
        assert!(matches!(
            join_session(handle),
            Err(ReaderError::WorkerPanicked("session log"))
        ));

        let logger = SessionLogger::new();
        let handle = start_session(&logger, 0);
        assert!(record(&logger, 3, explain(0)));
        stop_session(&logger);
        assert_eq!(join_session(handle).unwrap().len(), 1);
    }
}
