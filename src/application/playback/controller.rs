//! 播放会话控制器
//!
//! 驱动领域层状态机并执行其副作用：取缓存、发起/取消合成、
//! 启停音源、预取下一块。状态整体放在一把 tokio Mutex 之后，
//! 所有转移串行执行；合成与播放等待都在锁外进行。
//!
//! 取消模型：每次"推进"（toggle/skip/jump/stop/set_text 引发的
//! 取消类副作用）使代数 epoch 自增，并取消上一代的取音与音源
//! token。过期任务在每个 await 点之后核对 epoch，不匹配即放弃，
//! 绝不更新缓存、绝不触发自动推进。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::cache::{cache_key, AudioCache, DEFAULT_CACHE_CAPACITY};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    AudioSinkPort, PlaybackOutcome, SynthesisRequest, TtsCredentials, TtsEnginePort,
};
use crate::domain::{
    apply, segment, Effect, PlaybackEvent, PlaybackPhase, SegmentConfig, DEFAULT_MAX_BLOCK_CHARS,
};

/// 会话配置
#[derive(Debug, Clone)]
pub struct PlaybackSessionConfig {
    pub voice: String,
    pub speed: f32,
    pub max_block_chars: usize,
    pub cache_capacity: usize,
    /// 当前块开播/位置变更后，预取下一块前的等待
    pub prefetch_delay: Duration,
    /// 调用方提供的后端凭据，随会话生存，不落盘
    pub credentials: TtsCredentials,
}

impl Default for PlaybackSessionConfig {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            speed: 1.0,
            max_block_chars: DEFAULT_MAX_BLOCK_CHARS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            prefetch_delay: Duration::from_millis(250),
            credentials: TtsCredentials::default(),
        }
    }
}

/// 对外暴露的会话状态快照
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub phase: PlaybackPhase,
    pub current_index: usize,
    pub total_blocks: usize,
    pub is_processing: bool,
    pub current_text: Option<String>,
    pub last_error: Option<String>,
    pub cached_blocks: usize,
}

/// 锁内状态
struct Core {
    state: crate::domain::PlaybackState,
    cache: AudioCache,
    /// 推进代数，取消类副作用使其自增
    epoch: u64,
    /// 文档代数，换文档（清缓存）时自增，过期预取据此丢弃
    doc_seq: u64,
    /// 在途的当前块取音（全局至多一个）
    fetch_cancel: Option<CancellationToken>,
    /// 活跃音源（全局至多一个）
    source_cancel: Option<CancellationToken>,
    /// 在途预取（至多一个，尽力而为）
    prefetch_inflight: bool,
}

struct SessionInner {
    id: String,
    config: PlaybackSessionConfig,
    tts: Arc<dyn TtsEnginePort>,
    sink: Arc<dyn AudioSinkPort>,
    core: Mutex<Core>,
    /// 会话级 token，close 时级联取消一切在途任务
    shutdown: CancellationToken,
}

/// 播放会话
///
/// 句柄可廉价克隆；一个会话独占一份缓存与一套推进状态
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    pub fn new(
        id: impl Into<String>,
        config: PlaybackSessionConfig,
        tts: Arc<dyn TtsEnginePort>,
        sink: Arc<dyn AudioSinkPort>,
    ) -> Self {
        let cache_capacity = config.cache_capacity;
        Self {
            inner: Arc::new(SessionInner {
                id: id.into(),
                config,
                tts,
                sink,
                core: Mutex::new(Core {
                    state: crate::domain::PlaybackState::new(),
                    cache: AudioCache::new(cache_capacity),
                    epoch: 0,
                    doc_seq: 0,
                    fetch_cancel: None,
                    source_cancel: None,
                    prefetch_inflight: false,
                }),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// 装载新文档：分块、复位、清缓存、预取第 0/1 块
    pub async fn set_text(&self, text: &str) -> Result<StateSnapshot, ApplicationError> {
        if text.trim().is_empty() {
            return Err(ApplicationError::invalid_input("text must not be empty"));
        }
        let blocks = segment(
            text,
            &SegmentConfig {
                max_block_chars: self.inner.config.max_block_chars,
            },
        );
        if blocks.is_empty() {
            return Err(ApplicationError::invalid_input(
                "text contains no speakable content",
            ));
        }
        tracing::info!(
            session_id = %self.inner.id,
            blocks = blocks.len(),
            "Document loaded"
        );
        Ok(self.dispatch(PlaybackEvent::SetText { blocks }).await)
    }

    pub async fn toggle_play(&self) -> StateSnapshot {
        self.dispatch(PlaybackEvent::TogglePlay).await
    }

    pub async fn skip_forward(&self) -> StateSnapshot {
        self.dispatch(PlaybackEvent::SkipForward).await
    }

    pub async fn skip_backward(&self) -> StateSnapshot {
        self.dispatch(PlaybackEvent::SkipBackward).await
    }

    pub async fn jump_to(&self, index: usize, autoplay: bool) -> StateSnapshot {
        self.dispatch(PlaybackEvent::JumpTo { index, autoplay }).await
    }

    pub async fn stop(&self) -> StateSnapshot {
        self.dispatch(PlaybackEvent::Stop).await
    }

    pub async fn status(&self) -> StateSnapshot {
        let core = self.inner.core.lock().await;
        Self::snapshot(&core)
    }

    /// 取某一块的缓存音频（供 HTTP 层回放），命中会刷新 LRU 访问序
    pub async fn cached_audio(&self, index: usize) -> Option<Vec<u8>> {
        let mut core = self.inner.core.lock().await;
        let key = core.state.blocks.get(index).map(|b| cache_key(&b.text))?;
        core.cache.get(&key).map(|audio| audio.to_vec())
    }

    /// 关闭会话：级联取消所有在途取音、预取与音源。幂等。
    pub fn close(&self) {
        self.inner.shutdown.cancel();
        tracing::debug!(session_id = %self.inner.id, "Session closed");
    }

    // ------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------

    async fn dispatch(&self, event: PlaybackEvent) -> StateSnapshot {
        let mut core = self.inner.core.lock().await;
        let effects = Self::transition(&mut core, event);
        Self::run_effects(&self.inner, &mut core, effects);
        Self::snapshot(&core)
    }

    fn transition(core: &mut Core, event: PlaybackEvent) -> Vec<Effect> {
        let (next, effects) = apply(&core.state, event);
        core.state = next;
        effects
    }

    fn snapshot(core: &Core) -> StateSnapshot {
        StateSnapshot {
            phase: core.state.phase,
            current_index: core.state.current_index,
            total_blocks: core.state.blocks.len(),
            is_processing: core.state.is_processing,
            current_text: core.state.current_block().map(|b| b.text.clone()),
            last_error: core.state.last_error.clone(),
            cached_blocks: core.cache.len(),
        }
    }

    /// 执行转移副作用。持锁调用；耗时工作一律 spawn 出去。
    fn run_effects(inner: &Arc<SessionInner>, core: &mut Core, effects: Vec<Effect>) {
        // 取消类副作用意味着上一代推进作废
        if effects
            .iter()
            .any(|e| matches!(e, Effect::CancelFetch | Effect::StopSource))
        {
            core.epoch += 1;
        }

        for effect in effects {
            match effect {
                Effect::CancelFetch => {
                    if let Some(token) = core.fetch_cancel.take() {
                        token.cancel();
                    }
                }
                Effect::StopSource => {
                    if let Some(token) = core.source_cancel.take() {
                        token.cancel();
                    }
                }
                Effect::ClearCache => {
                    core.cache.clear();
                    core.doc_seq += 1;
                }
                Effect::PlayCurrent => {
                    tokio::spawn(Self::play_current(inner.clone(), core.epoch));
                }
                Effect::PrefetchNext => {
                    let next_index = core.state.current_index + 1;
                    tokio::spawn(Self::prefetch(
                        inner.clone(),
                        next_index,
                        inner.config.prefetch_delay,
                    ));
                }
                Effect::PrefetchInitial => {
                    let inner = inner.clone();
                    let delay = inner.config.prefetch_delay;
                    tokio::spawn(async move {
                        Self::prefetch(inner.clone(), 0, Duration::ZERO).await;
                        Self::prefetch(inner, 1, delay).await;
                    });
                }
            }
        }
    }

    /// 取当前块音频并播放；epoch 不匹配时在任意阶段放弃
    async fn play_current(inner: Arc<SessionInner>, epoch: u64) {
        let (request, key, cached, index) = {
            let mut core = inner.core.lock().await;
            if core.epoch != epoch {
                return;
            }
            let Some(block) = core.state.current_block() else {
                return;
            };
            let key = cache_key(&block.text);
            let request = SynthesisRequest {
                text: block.text.clone(),
                voice: inner.config.voice.clone(),
                speed: inner.config.speed,
            };
            let index = core.state.current_index;
            let cached = core.cache.get(&key).map(|audio| audio.to_vec());
            (request, key, cached, index)
        };

        let audio = if let Some(audio) = cached {
            audio
        } else {
            let token = {
                let mut core = inner.core.lock().await;
                if core.epoch != epoch {
                    return;
                }
                let _ = Self::transition(&mut core, PlaybackEvent::FetchStarted);
                let token = inner.shutdown.child_token();
                core.fetch_cancel = Some(token.clone());
                token
            };

            tracing::debug!(session_id = %inner.id, index = index, "Fetching audio for current block");
            let result = inner
                .tts
                .synthesize(&request, &inner.config.credentials, &token)
                .await;

            let mut core = inner.core.lock().await;
            if core.epoch != epoch {
                // skip/stop 已接管：结果作废，不更新缓存，不推进
                return;
            }
            core.fetch_cancel = None;
            match result {
                Ok(audio) => {
                    core.cache.insert(key, audio.clone());
                    let _ = Self::transition(&mut core, PlaybackEvent::FetchCompleted);
                    audio
                }
                Err(err) if err.is_cancelled() => {
                    // 取消通常伴随 epoch 变更走不到这里；兜底收回取音标记
                    core.state.is_processing = false;
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %inner.id,
                        index = index,
                        error = %err,
                        "Synthesis failed, pausing playback"
                    );
                    let _ = Self::transition(
                        &mut core,
                        PlaybackEvent::FetchFailed {
                            message: err.to_string(),
                        },
                    );
                    return;
                }
            }
        };

        // 启动音源（全局至多一个）
        let source_token = {
            let mut core = inner.core.lock().await;
            if core.epoch != epoch {
                return;
            }
            if let Some(stale) = core.source_cancel.take() {
                stale.cancel();
            }
            let token = inner.shutdown.child_token();
            core.source_cancel = Some(token.clone());
            token
        };

        // 当前块开播后低优先级预取下一块，不阻塞播放
        tokio::spawn(Self::prefetch(
            inner.clone(),
            index + 1,
            inner.config.prefetch_delay,
        ));

        let outcome = inner.sink.play(&audio, &source_token).await;

        let mut core = inner.core.lock().await;
        if core.epoch != epoch {
            // 被打断的音源的收尾事件，不得二次推进
            return;
        }
        core.source_cancel = None;

        match outcome {
            Ok(PlaybackOutcome::Completed) => {
                let effects = Self::transition(&mut core, PlaybackEvent::SourceEnded);
                Self::run_effects(&inner, &mut core, effects);
            }
            Ok(PlaybackOutcome::Interrupted) => {}
            Err(err) => {
                tracing::warn!(session_id = %inner.id, error = %err, "Audio sink failed");
                let _ = Self::transition(
                    &mut core,
                    PlaybackEvent::FetchFailed {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    /// 尽力而为的预取：只填缓存，失败吞掉，绝不影响正确性
    async fn prefetch(inner: Arc<SessionInner>, index: usize, delay: Duration) {
        if !delay.is_zero() {
            tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let (request, key, doc_seq) = {
            let mut core = inner.core.lock().await;
            let Some(block) = core.state.blocks.get(index) else {
                return;
            };
            let key = cache_key(&block.text);
            if core.cache.contains(&key) || core.prefetch_inflight {
                return;
            }
            let request = SynthesisRequest {
                text: block.text.clone(),
                voice: inner.config.voice.clone(),
                speed: inner.config.speed,
            };
            core.prefetch_inflight = true;
            (request, key, core.doc_seq)
        };

        let token = inner.shutdown.child_token();
        let result = inner
            .tts
            .synthesize(&request, &inner.config.credentials, &token)
            .await;

        let mut core = inner.core.lock().await;
        core.prefetch_inflight = false;
        match result {
            Ok(audio) => {
                // 文档已切换的话直接丢弃，避免旧文档音频串进新缓存
                if core.doc_seq == doc_seq {
                    core.cache.insert(key, audio);
                    tracing::debug!(session_id = %inner.id, index = index, "Prefetch completed");
                }
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                tracing::debug!(
                    session_id = %inner.id,
                    index = index,
                    error = %err,
                    "Prefetch failed (ignored)"
                );
            }
        }
    }
}
