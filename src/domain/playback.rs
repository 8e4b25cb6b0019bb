//! 播放状态机
//!
//! 交互播放的核心状态与转移逻辑。转移函数是纯函数：
//! `(状态, 事件) -> (新状态, 副作用列表)`，不做任何 I/O，
//! 副作用由应用层的会话控制器解释执行，因此可以独立测试。

use serde::Serialize;

use super::segmenter::Block;

/// 播放阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// 空闲：尚未播放，或 stop 之后
    Idle,
    /// 播放中：存在活跃音源
    Playing,
    /// 暂停
    Paused,
    /// 取音中：为当前块拉取/合成音频
    Processing,
    /// 已结束：播完最后一块，直到下一次 set_text 前保持终态
    Stopped,
}

impl PlaybackPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackPhase::Idle => "idle",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Paused => "paused",
            PlaybackPhase::Processing => "processing",
            PlaybackPhase::Stopped => "stopped",
        }
    }
}

/// 播放会话状态
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub current_index: usize,
    pub blocks: Vec<Block>,
    /// 当前块的取音请求是否在途（全局至多一个）
    pub is_processing: bool,
    /// 最近一次合成失败的描述，成功播放或重置后清空
    pub last_error: Option<String>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            current_index: 0,
            blocks: Vec::new(),
            is_processing: false,
            last_error: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase, PlaybackPhase::Playing | PlaybackPhase::Processing)
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.blocks.get(self.current_index)
    }

    fn clamp_index(&self, index: usize) -> usize {
        if self.blocks.is_empty() {
            0
        } else {
            index.min(self.blocks.len() - 1)
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// 播放事件
///
/// 前六个来自调用方（UI/HTTP），后三个由控制器在取音流程中回报
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    SetText { blocks: Vec<Block> },
    TogglePlay,
    SkipForward,
    SkipBackward,
    JumpTo { index: usize, autoplay: bool },
    Stop,
    /// 活跃音源自然播完（控制器已按代数过滤过期事件）
    SourceEnded,
    /// 控制器开始为当前块取音
    FetchStarted,
    /// 当前块音频就绪，音源即将启动
    FetchCompleted,
    /// 当前块取音失败（取消不会产生此事件）
    FetchFailed { message: String },
}

/// 转移副作用，由控制器执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// 取消在途取音请求
    CancelFetch,
    /// 停掉活跃音源
    StopSource,
    /// 清空音频缓存（文档切换）
    ClearCache,
    /// 取当前块音频并开始播放
    PlayCurrent,
    /// 低优先级预取下一块
    PrefetchNext,
    /// 新文档就绪后预取第 0 块与第 1 块
    PrefetchInitial,
}

/// 状态转移
///
/// 所有路径都维持不变量：blocks 非空时 current_index 恒在界内；
/// 取消/失败/完成都会把 is_processing 收回 false。
pub fn apply(state: &PlaybackState, event: PlaybackEvent) -> (PlaybackState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        PlaybackEvent::SetText { blocks } => {
            effects.push(Effect::CancelFetch);
            effects.push(Effect::StopSource);
            effects.push(Effect::ClearCache);
            next.phase = PlaybackPhase::Idle;
            next.current_index = 0;
            next.is_processing = false;
            next.last_error = None;
            let has_blocks = !blocks.is_empty();
            next.blocks = blocks;
            if has_blocks {
                effects.push(Effect::PrefetchInitial);
            }
        }

        PlaybackEvent::TogglePlay => match state.phase {
            PlaybackPhase::Idle | PlaybackPhase::Paused => {
                if !state.blocks.is_empty() {
                    next.phase = PlaybackPhase::Playing;
                    next.last_error = None;
                    effects.push(Effect::PlayCurrent);
                }
            }
            PlaybackPhase::Playing | PlaybackPhase::Processing => {
                effects.push(Effect::CancelFetch);
                effects.push(Effect::StopSource);
                next.phase = PlaybackPhase::Paused;
                next.is_processing = false;
            }
            // 终态：只有 set_text 能离开
            PlaybackPhase::Stopped => {}
        },

        PlaybackEvent::SkipForward | PlaybackEvent::SkipBackward => {
            if state.blocks.is_empty() {
                return (next, effects);
            }
            effects.push(Effect::CancelFetch);
            effects.push(Effect::StopSource);
            next.is_processing = false;

            let target = match event {
                PlaybackEvent::SkipForward => state.current_index.saturating_add(1),
                _ => state.current_index.saturating_sub(1),
            };
            next.current_index = state.clamp_index(target);

            if state.is_playing() {
                next.phase = PlaybackPhase::Playing;
                effects.push(Effect::PlayCurrent);
            } else {
                // 从终态挪动位置即视为重新拿起，落到可恢复的暂停态
                if state.phase == PlaybackPhase::Stopped {
                    next.phase = PlaybackPhase::Paused;
                }
                // 位置变了就预取，降低下一次起播延迟
                effects.push(Effect::PrefetchNext);
            }
        }

        PlaybackEvent::JumpTo { index, autoplay } => {
            if state.blocks.is_empty() {
                return (next, effects);
            }
            effects.push(Effect::CancelFetch);
            effects.push(Effect::StopSource);
            next.is_processing = false;
            next.current_index = state.clamp_index(index);

            if autoplay {
                next.phase = PlaybackPhase::Playing;
                effects.push(Effect::PlayCurrent);
            } else {
                if state.is_playing() || state.phase == PlaybackPhase::Stopped {
                    next.phase = PlaybackPhase::Paused;
                }
                effects.push(Effect::PrefetchNext);
            }
        }

        PlaybackEvent::Stop => {
            effects.push(Effect::CancelFetch);
            effects.push(Effect::StopSource);
            next.phase = PlaybackPhase::Idle;
            next.current_index = 0;
            next.blocks = Vec::new();
            next.is_processing = false;
            next.last_error = None;
        }

        PlaybackEvent::SourceEnded => {
            if state.phase == PlaybackPhase::Playing {
                if state.current_index + 1 < state.blocks.len() {
                    next.current_index = state.current_index + 1;
                    effects.push(Effect::PlayCurrent);
                } else {
                    next.phase = PlaybackPhase::Stopped;
                }
            }
        }

        PlaybackEvent::FetchStarted => {
            if state.is_playing() {
                next.phase = PlaybackPhase::Processing;
            }
            next.is_processing = true;
        }

        PlaybackEvent::FetchCompleted => {
            next.is_processing = false;
            if state.phase == PlaybackPhase::Processing {
                next.phase = PlaybackPhase::Playing;
            }
        }

        PlaybackEvent::FetchFailed { message } => {
            next.is_processing = false;
            next.phase = PlaybackPhase::Paused;
            next.last_error = Some(message);
        }
    }

    debug_assert!(
        next.blocks.is_empty() || next.current_index < next.blocks.len(),
        "current_index out of range"
    );

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(n: usize) -> Vec<Block> {
        (0..n).map(|i| Block::new(format!("block {}", i))).collect()
    }

    fn with_text(n: usize) -> PlaybackState {
        let (state, _) = apply(
            &PlaybackState::new(),
            PlaybackEvent::SetText { blocks: blocks(n) },
        );
        state
    }

    #[test]
    fn test_set_text_resets_and_clears_cache() {
        let mut state = with_text(3);
        state.current_index = 2;
        state.phase = PlaybackPhase::Playing;

        let (next, effects) = apply(&state, PlaybackEvent::SetText { blocks: blocks(5) });

        assert_eq!(next.phase, PlaybackPhase::Idle);
        assert_eq!(next.current_index, 0);
        assert_eq!(next.blocks.len(), 5);
        assert!(effects.contains(&Effect::ClearCache));
        assert!(effects.contains(&Effect::PrefetchInitial));
    }

    #[test]
    fn test_set_text_empty_skips_prefetch() {
        let (next, effects) = apply(
            &PlaybackState::new(),
            PlaybackEvent::SetText { blocks: vec![] },
        );
        assert!(next.blocks.is_empty());
        assert!(!effects.contains(&Effect::PrefetchInitial));
    }

    #[test]
    fn test_toggle_from_idle_starts_playing() {
        let state = with_text(2);
        let (next, effects) = apply(&state, PlaybackEvent::TogglePlay);
        assert_eq!(next.phase, PlaybackPhase::Playing);
        assert!(effects.contains(&Effect::PlayCurrent));
    }

    #[test]
    fn test_toggle_with_no_text_is_noop() {
        let (next, effects) = apply(&PlaybackState::new(), PlaybackEvent::TogglePlay);
        assert_eq!(next.phase, PlaybackPhase::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_toggle_from_playing_pauses_and_stops_source() {
        let mut state = with_text(2);
        state.phase = PlaybackPhase::Playing;

        let (next, effects) = apply(&state, PlaybackEvent::TogglePlay);
        assert_eq!(next.phase, PlaybackPhase::Paused);
        assert!(effects.contains(&Effect::StopSource));
        assert!(effects.contains(&Effect::CancelFetch));
    }

    #[test]
    fn test_toggle_in_stopped_is_noop() {
        let mut state = with_text(2);
        state.phase = PlaybackPhase::Stopped;
        let (next, effects) = apply(&state, PlaybackEvent::TogglePlay);
        assert_eq!(next.phase, PlaybackPhase::Stopped);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ended_auto_advances() {
        let mut state = with_text(3);
        state.phase = PlaybackPhase::Playing;
        state.current_index = 1;

        let (next, effects) = apply(&state, PlaybackEvent::SourceEnded);
        assert_eq!(next.current_index, 2);
        assert_eq!(next.phase, PlaybackPhase::Playing);
        assert!(effects.contains(&Effect::PlayCurrent));
    }

    #[test]
    fn test_ended_on_last_block_stops() {
        let mut state = with_text(3);
        state.phase = PlaybackPhase::Playing;
        state.current_index = 2;

        let (next, effects) = apply(&state, PlaybackEvent::SourceEnded);
        assert_eq!(next.phase, PlaybackPhase::Stopped);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ended_while_paused_is_ignored() {
        // 暂停瞬间残留的 ended 事件不得推进位置
        let mut state = with_text(3);
        state.phase = PlaybackPhase::Paused;
        state.current_index = 1;

        let (next, _) = apply(&state, PlaybackEvent::SourceEnded);
        assert_eq!(next.current_index, 1);
        assert_eq!(next.phase, PlaybackPhase::Paused);
    }

    #[test]
    fn test_skip_forward_clamps_at_end() {
        let mut state = with_text(2);
        state.current_index = 1;
        let (next, _) = apply(&state, PlaybackEvent::SkipForward);
        assert_eq!(next.current_index, 1);
    }

    #[test]
    fn test_skip_backward_clamps_at_zero() {
        let state = with_text(2);
        let (next, _) = apply(&state, PlaybackEvent::SkipBackward);
        assert_eq!(next.current_index, 0);
    }

    #[test]
    fn test_skip_while_playing_cancels_and_replays() {
        let mut state = with_text(3);
        state.phase = PlaybackPhase::Processing;
        state.is_processing = true;

        let (next, effects) = apply(&state, PlaybackEvent::SkipForward);
        assert_eq!(next.current_index, 1);
        assert_eq!(next.phase, PlaybackPhase::Playing);
        assert!(!next.is_processing);
        assert_eq!(effects[0], Effect::CancelFetch);
        assert_eq!(effects[1], Effect::StopSource);
        assert!(effects.contains(&Effect::PlayCurrent));
    }

    #[test]
    fn test_skip_while_paused_prefetches_only() {
        let mut state = with_text(3);
        state.phase = PlaybackPhase::Paused;

        let (next, effects) = apply(&state, PlaybackEvent::SkipForward);
        assert_eq!(next.phase, PlaybackPhase::Paused);
        assert!(effects.contains(&Effect::PrefetchNext));
        assert!(!effects.contains(&Effect::PlayCurrent));
    }

    #[test]
    fn test_skip_backward_from_stopped_resumes_as_paused() {
        let mut state = with_text(3);
        state.phase = PlaybackPhase::Stopped;
        state.current_index = 2;

        let (next, _) = apply(&state, PlaybackEvent::SkipBackward);
        assert_eq!(next.current_index, 1);
        assert_eq!(next.phase, PlaybackPhase::Paused);
    }

    #[test]
    fn test_skip_with_empty_blocks_is_noop() {
        let (next, effects) = apply(&PlaybackState::new(), PlaybackEvent::SkipForward);
        assert_eq!(next.current_index, 0);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_jump_with_autoplay() {
        let state = with_text(5);
        let (next, effects) = apply(
            &state,
            PlaybackEvent::JumpTo {
                index: 3,
                autoplay: true,
            },
        );
        assert_eq!(next.current_index, 3);
        assert_eq!(next.phase, PlaybackPhase::Playing);
        assert!(effects.contains(&Effect::PlayCurrent));
    }

    #[test]
    fn test_jump_clamps_out_of_range_index() {
        let state = with_text(3);
        let (next, _) = apply(
            &state,
            PlaybackEvent::JumpTo {
                index: 99,
                autoplay: false,
            },
        );
        assert_eq!(next.current_index, 2);
    }

    #[test]
    fn test_stop_clears_text_and_returns_to_idle() {
        let mut state = with_text(4);
        state.phase = PlaybackPhase::Playing;
        state.current_index = 3;

        let (next, effects) = apply(&state, PlaybackEvent::Stop);
        assert_eq!(next.phase, PlaybackPhase::Idle);
        assert_eq!(next.current_index, 0);
        assert!(next.blocks.is_empty());
        assert!(effects.contains(&Effect::CancelFetch));
        assert!(effects.contains(&Effect::StopSource));
    }

    #[test]
    fn test_fetch_lifecycle_flags() {
        let mut state = with_text(2);
        state.phase = PlaybackPhase::Playing;

        let (state, _) = apply(&state, PlaybackEvent::FetchStarted);
        assert!(state.is_processing);
        assert_eq!(state.phase, PlaybackPhase::Processing);

        let (state, _) = apply(&state, PlaybackEvent::FetchCompleted);
        assert!(!state.is_processing);
        assert_eq!(state.phase, PlaybackPhase::Playing);
    }

    #[test]
    fn test_fetch_failure_pauses_with_error() {
        let mut state = with_text(2);
        state.phase = PlaybackPhase::Processing;
        state.is_processing = true;

        let (next, _) = apply(
            &state,
            PlaybackEvent::FetchFailed {
                message: "upstream 502".to_string(),
            },
        );
        assert_eq!(next.phase, PlaybackPhase::Paused);
        assert!(!next.is_processing);
        assert_eq!(next.last_error.as_deref(), Some("upstream 502"));
    }

    #[test]
    fn test_toggle_after_failure_retries() {
        // 失败后用户再次 toggle 即可重试
        let mut state = with_text(2);
        state.phase = PlaybackPhase::Paused;
        state.last_error = Some("boom".to_string());

        let (next, effects) = apply(&state, PlaybackEvent::TogglePlay);
        assert_eq!(next.phase, PlaybackPhase::Playing);
        assert!(next.last_error.is_none());
        assert!(effects.contains(&Effect::PlayCurrent));
    }
}
