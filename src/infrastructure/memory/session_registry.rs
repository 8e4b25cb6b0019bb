//! In-Memory Session Registry
//!
//! 播放会话的内存注册表：session_id → 会话句柄。
//! 带后台闲置清扫，过期会话级联取消其全部在途任务。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::application::PlaybackSession;

/// Session Registry 错误
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

struct SessionEntry {
    session: PlaybackSession,
    last_activity: DateTime<Utc>,
}

/// 会话注册表
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// 注册会话，key 取会话自身 id
    pub fn insert(&self, session: PlaybackSession) {
        let id = session.id().to_string();
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                session,
                last_activity: Utc::now(),
            },
        );
        tracing::info!(session_id = %id, "Session registered");
    }

    /// 取会话句柄并刷新活跃时间
    pub fn get(&self, id: &str) -> Result<PlaybackSession, SessionError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.last_activity = Utc::now();
        Ok(entry.session.clone())
    }

    /// 关闭并移除会话（级联取消在途任务）。幂等语义交由调用方。
    pub fn close(&self, id: &str) -> Result<(), SessionError> {
        match self.sessions.remove(id) {
            Some((_, entry)) => {
                entry.session.close();
                tracing::info!(session_id = %id, "Session removed");
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// 关闭所有闲置超过 idle_timeout 的会话，返回清理数量
    pub fn close_expired(&self, idle_timeout: Duration) -> usize {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000));

        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now - entry.last_activity >= timeout)
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for id in expired {
            if let Some((_, entry)) = self.sessions.remove(&id) {
                entry.session.close();
                tracing::info!(session_id = %id, "Idle session expired");
            }
        }
        count
    }

    /// 启动后台闲置清扫任务
    pub fn start_expiry_sweep(self: &Arc<Self>, interval: Duration, idle_timeout: Duration) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = registry.close_expired(idle_timeout);
                if removed > 0 {
                    tracing::debug!(removed = removed, "Expiry sweep finished");
                }
            }
        });
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
