//! 有声书装配器
//!
//! 逐章（严格串行）走外部工具链：原始字节落盘 → 转码为规范 PCM →
//! 测长 → 立即删除原始中间文件，同时累计章节时间轴；随后渲染章节
//! 元数据与拼接清单，调用一次封装子进程产出带章节标记的单一容器，
//! 最后以磁盘流的方式交给调用方，不整体读进内存。
//!
//! 临时资源的释放完全由 WorkSet 的 Drop 承担：流被读完、任何一步
//! 失败、客户端中途断开，三种收场走的都是同一条释放路径。

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    AudioPipelinePort, ExportFormat, PcmSpec, PipelineError, RetryPolicy, SynthesisRequest,
    TtsCredentials, TtsEnginePort,
};
use crate::domain::{clean_text, ChapterMark, Timeline};

use super::workset::WorkSet;

/// 待装配章节：调用方已备好的原始音频
#[derive(Debug, Clone)]
pub struct ChapterInput {
    pub title: String,
    pub raw_audio: Vec<u8>,
}

/// 待合成章节：由导出路径自行合成后装配
#[derive(Debug, Clone)]
pub struct TextChapter {
    pub title: String,
    pub text: String,
}

/// 装配器配置
#[derive(Debug, Clone, Default)]
pub struct AssemblerConfig {
    /// 规范中间 PCM 规格
    pub pcm: PcmSpec,
    /// 导出路径的合成重试策略
    pub retry: RetryPolicy,
    /// 工作目录父路径，None 用系统临时目录
    pub work_dir: Option<std::path::PathBuf>,
}

/// 装配产物：磁盘流 + 元信息
///
/// 流持有工作集，读尽或中途丢弃都会触发整目录清理
#[derive(Debug)]
pub struct AudiobookOutput {
    pub stream: AudiobookStream,
    pub content_type: &'static str,
    pub total_secs: f64,
    pub chapters: Vec<ChapterMark>,
}

/// 封装产物的磁盘字节流
#[derive(Debug)]
pub struct AudiobookStream {
    inner: ReaderStream<tokio::fs::File>,
    _workset: WorkSet,
}

impl AudiobookStream {
    fn new(file: tokio::fs::File, workset: WorkSet) -> Self {
        Self {
            inner: ReaderStream::new(file),
            _workset: workset,
        }
    }
}

impl Stream for AudiobookStream {
    type Item = <ReaderStream<tokio::fs::File> as Stream>::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// 有声书装配器
pub struct AudiobookAssembler {
    pipeline: Arc<dyn AudioPipelinePort>,
    tts: Arc<dyn TtsEnginePort>,
    config: AssemblerConfig,
}

impl AudiobookAssembler {
    pub fn new(
        pipeline: Arc<dyn AudioPipelinePort>,
        tts: Arc<dyn TtsEnginePort>,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            pipeline,
            tts,
            config,
        }
    }

    /// 装配调用方给定的原始音频章节
    pub async fn assemble(
        &self,
        chapters: Vec<ChapterInput>,
        format: ExportFormat,
        cancel: &CancellationToken,
    ) -> Result<AudiobookOutput, ApplicationError> {
        if chapters.is_empty() {
            return Err(ApplicationError::invalid_input("no chapters supplied"));
        }
        if let Some(index) = chapters.iter().position(|c| c.raw_audio.is_empty()) {
            return Err(ApplicationError::invalid_input(format!(
                "chapter {} carries no audio data",
                index
            )));
        }

        // 作用域式获取：从这里开始任何 return 都由 Drop 兜底清理
        let workset = WorkSet::create(self.config.work_dir.as_deref())?;
        let mut timeline = Timeline::new();

        // 章节严格串行处理，约束临时盘与内存峰值，
        // 时间轴累计顺序天然正确，无需额外同步
        for (index, chapter) in chapters.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled.into());
            }

            let raw_path = workset.raw_chapter_path(index);
            tokio::fs::write(&raw_path, &chapter.raw_audio).await?;

            let pcm_path = workset.pcm_chapter_path(index);
            self.pipeline
                .transcode_to_pcm(&raw_path, &pcm_path, &self.config.pcm, cancel)
                .await?;
            let duration_secs = self.pipeline.probe_duration(&pcm_path, cancel).await?;

            // 原始中间文件立即删除，大文档导出时临时盘占用不翻倍
            tokio::fs::remove_file(&raw_path).await?;

            timeline.push(title_or_default(&chapter.title, index), duration_secs);
            tracing::debug!(
                chapter = index,
                duration_secs = duration_secs,
                "Chapter transcoded"
            );
        }

        tokio::fs::write(workset.metadata_path(), timeline.render_metadata()).await?;

        let pcm_paths: Vec<_> = (0..chapters.len())
            .map(|i| workset.pcm_chapter_path(i))
            .collect();
        tokio::fs::write(workset.concat_list_path(), render_concat_list(&pcm_paths)).await?;

        let output_path = workset.output_path(format);
        self.pipeline
            .mux_chapters(
                &workset.concat_list_path(),
                &workset.metadata_path(),
                &output_path,
                format,
                cancel,
            )
            .await?;

        let file = tokio::fs::File::open(&output_path).await?;
        tracing::info!(
            chapters = chapters.len(),
            total_secs = timeline.total_secs(),
            format = %format,
            "Audiobook assembled"
        );

        Ok(AudiobookOutput {
            content_type: format.content_type(),
            total_secs: timeline.total_secs(),
            chapters: timeline.marks().to_vec(),
            stream: AudiobookStream::new(file, workset),
        })
    }

    /// 先合成再装配：每章一次合成调用，带有界重试
    pub async fn assemble_from_text(
        &self,
        chapters: Vec<TextChapter>,
        voice: &str,
        speed: f32,
        credentials: &TtsCredentials,
        format: ExportFormat,
        cancel: &CancellationToken,
    ) -> Result<AudiobookOutput, ApplicationError> {
        if chapters.is_empty() {
            return Err(ApplicationError::invalid_input("no chapters supplied"));
        }

        let mut inputs = Vec::with_capacity(chapters.len());
        for (index, chapter) in chapters.into_iter().enumerate() {
            let cleaned = clean_text(&chapter.text);
            if cleaned.is_empty() {
                return Err(ApplicationError::invalid_input(format!(
                    "chapter {} has no speakable content",
                    index
                )));
            }

            let request = SynthesisRequest {
                text: cleaned,
                voice: voice.to_string(),
                speed,
            };
            // 批量导出对瞬时后端抖动做有界退避重试；Cancelled 直接上抛
            let audio = self
                .tts
                .synthesize_with_retry(&request, credentials, &self.config.retry, cancel)
                .await?;

            tracing::debug!(chapter = index, audio_bytes = audio.len(), "Chapter synthesized");
            inputs.push(ChapterInput {
                title: chapter.title,
                raw_audio: audio,
            });
        }

        self.assemble(inputs, format, cancel).await
    }
}

fn title_or_default(title: &str, index: usize) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        format!("Chapter {}", index + 1)
    } else {
        trimmed.to_string()
    }
}

/// 渲染拼接清单：每行 `file '<path>'`，单引号按 shell 约定转义
fn render_concat_list(paths: &[std::path::PathBuf]) -> String {
    let mut out = String::new();
    for path in paths {
        let escaped = path.display().to_string().replace('\'', "'\\''");
        out.push_str("file '");
        out.push_str(&escaped);
        out.push_str("'\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::TtsError;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// 记录调用顺序的假工具链；输出文件真实落盘
    struct FakePipeline {
        log: StdMutex<Vec<String>>,
        durations: Vec<f64>,
        fail_at_mux: bool,
        raw_files_seen_at_mux: StdMutex<Vec<String>>,
    }

    impl FakePipeline {
        fn new(durations: Vec<f64>) -> Arc<Self> {
            Arc::new(Self {
                log: StdMutex::new(Vec::new()),
                durations,
                fail_at_mux: false,
                raw_files_seen_at_mux: StdMutex::new(Vec::new()),
            })
        }

        fn failing_at_mux(durations: Vec<f64>) -> Arc<Self> {
            Arc::new(Self {
                log: StdMutex::new(Vec::new()),
                durations,
                fail_at_mux: true,
                raw_files_seen_at_mux: StdMutex::new(Vec::new()),
            })
        }
    }

    fn chapter_index(path: &Path) -> usize {
        let stem = path.file_stem().unwrap().to_string_lossy();
        stem.rsplit('_').next().unwrap().parse().unwrap()
    }

    #[async_trait]
    impl AudioPipelinePort for FakePipeline {
        async fn transcode_to_pcm(
            &self,
            input: &Path,
            output: &Path,
            _spec: &PcmSpec,
            _cancel: &CancellationToken,
        ) -> Result<(), PipelineError> {
            assert!(input.exists(), "raw chapter file must exist for transcode");
            self.log
                .lock()
                .unwrap()
                .push(format!("transcode {}", chapter_index(output)));
            std::fs::write(output, b"pcm").unwrap();
            Ok(())
        }

        async fn probe_duration(
            &self,
            path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<f64, PipelineError> {
            let index = chapter_index(path);
            self.log.lock().unwrap().push(format!("probe {}", index));
            Ok(self.durations[index])
        }

        async fn mux_chapters(
            &self,
            concat_list: &Path,
            metadata: &Path,
            output: &Path,
            _format: ExportFormat,
            _cancel: &CancellationToken,
        ) -> Result<(), PipelineError> {
            assert!(concat_list.exists());
            assert!(metadata.exists());
            self.log.lock().unwrap().push("mux".to_string());

            // 记录此刻残留的原始中间文件（应该一个都没有）
            let dir = concat_list.parent().unwrap();
            let leftovers: Vec<String> = std::fs::read_dir(dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|name| name.starts_with("raw_"))
                .collect();
            *self.raw_files_seen_at_mux.lock().unwrap() = leftovers;

            if self.fail_at_mux {
                return Err(PipelineError::MuxFailed("exit status 1".into()));
            }
            std::fs::write(output, b"muxed").unwrap();
            Ok(())
        }
    }

    /// 前 N 次失败随后成功的假引擎
    struct FlakyTts {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FlakyTts {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TtsEnginePort for FlakyTts {
        async fn synthesize(
            &self,
            _request: &SynthesisRequest,
            _credentials: &TtsCredentials,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, TtsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(TtsError::ServiceError {
                    status: 500,
                    message: "transient".into(),
                });
            }
            Ok(vec![7u8; 32])
        }

        async fn list_voices(&self, _credentials: &TtsCredentials) -> Result<Vec<String>, TtsError> {
            Ok(Vec::new())
        }
    }

    fn assembler_in(
        parent: &Path,
        pipeline: Arc<FakePipeline>,
        tts: Arc<FlakyTts>,
    ) -> AudiobookAssembler {
        let config = AssemblerConfig {
            work_dir: Some(parent.to_path_buf()),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: std::time::Duration::from_millis(1),
                max_backoff: std::time::Duration::from_millis(4),
            },
            ..Default::default()
        };
        AudiobookAssembler::new(pipeline, tts, config)
    }

    fn chapters(n: usize) -> Vec<ChapterInput> {
        (0..n)
            .map(|i| ChapterInput {
                title: format!("Chapter {}", i + 1),
                raw_audio: vec![i as u8; 16],
            })
            .collect()
    }

    fn dir_entry_count(path: &Path) -> usize {
        std::fs::read_dir(path).unwrap().count()
    }

    #[tokio::test]
    async fn test_assemble_produces_timeline_and_streams_output() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![10.0, 5.5, 20.25]);
        let assembler = assembler_in(parent.path(), pipeline.clone(), FlakyTts::new(0));

        let output = assembler
            .assemble(chapters(3), ExportFormat::M4b, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.content_type, "audio/mp4");
        let marks = &output.chapters;
        assert_eq!(
            (marks[0].start_ms, marks[0].end_ms),
            (0, 10000)
        );
        assert_eq!((marks[1].start_ms, marks[1].end_ms), (10000, 15500));
        assert_eq!((marks[2].start_ms, marks[2].end_ms), (15500, 35750));

        // 流式读尽
        let mut stream = output.stream;
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(bytes, b"muxed");

        // 流耗尽并 drop 后工作目录整体消失
        drop(stream);
        assert_eq!(dir_entry_count(parent.path()), 0);
    }

    #[tokio::test]
    async fn test_chapters_processed_strictly_in_order() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![1.0, 2.0, 3.0]);
        let assembler = assembler_in(parent.path(), pipeline.clone(), FlakyTts::new(0));

        let _output = assembler
            .assemble(chapters(3), ExportFormat::M4b, &CancellationToken::new())
            .await
            .unwrap();

        let log = pipeline.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "transcode 0",
                "probe 0",
                "transcode 1",
                "probe 1",
                "transcode 2",
                "probe 2",
                "mux"
            ]
        );
    }

    #[tokio::test]
    async fn test_raw_intermediates_deleted_before_mux() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![1.0, 1.0]);
        let assembler = assembler_in(parent.path(), pipeline.clone(), FlakyTts::new(0));

        let _output = assembler
            .assemble(chapters(2), ExportFormat::M4b, &CancellationToken::new())
            .await
            .unwrap();

        assert!(pipeline.raw_files_seen_at_mux.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mux_failure_cleans_up_workset() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::failing_at_mux(vec![1.0]);
        let assembler = assembler_in(parent.path(), pipeline, FlakyTts::new(0));

        let err = assembler
            .assemble(chapters(1), ExportFormat::M4b, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "mux_failed");
        // 失败路径同样不留任何临时文件
        assert_eq!(dir_entry_count(parent.path()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_cleans_up_workset() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![1.0]);
        let assembler = assembler_in(parent.path(), pipeline, FlakyTts::new(0));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = assembler
            .assemble(chapters(1), ExportFormat::M4b, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(dir_entry_count(parent.path()), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_midway_cleans_up() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![1.0]);
        let assembler = assembler_in(parent.path(), pipeline, FlakyTts::new(0));

        let output = assembler
            .assemble(chapters(1), ExportFormat::M4b, &CancellationToken::new())
            .await
            .unwrap();

        // 一个字节都不读，直接丢弃（模拟客户端断开）
        drop(output);
        assert_eq!(dir_entry_count(parent.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_chapter_list_rejected() {
        let parent = tempfile::tempdir().unwrap();
        let assembler = assembler_in(parent.path(), FakePipeline::new(vec![]), FlakyTts::new(0));

        let err = assembler
            .assemble(Vec::new(), ExportFormat::M4b, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn test_export_synthesis_retries_transient_failures() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![2.0]);
        let tts = FlakyTts::new(2);
        let assembler = assembler_in(parent.path(), pipeline, tts.clone());

        let output = assembler
            .assemble_from_text(
                vec![TextChapter {
                    title: "Only".into(),
                    text: "Some chapter text.".into(),
                }],
                "alloy",
                1.0,
                &TtsCredentials::default(),
                ExportFormat::Mp3,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // 两次瞬时失败 + 一次成功
        assert_eq!(tts.calls.load(Ordering::SeqCst), 3);
        assert_eq!(output.content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_export_synthesis_gives_up_after_max_attempts() {
        let parent = tempfile::tempdir().unwrap();
        let pipeline = FakePipeline::new(vec![2.0]);
        let tts = FlakyTts::new(99);
        let assembler = assembler_in(parent.path(), pipeline, tts.clone());

        let err = assembler
            .assemble_from_text(
                vec![TextChapter {
                    title: "Only".into(),
                    text: "Some chapter text.".into(),
                }],
                "alloy",
                1.0,
                &TtsCredentials::default(),
                ExportFormat::M4b,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "synthesis_failed");
        assert_eq!(tts.calls.load(Ordering::SeqCst), 3);
        // 合成阶段失败时工作集尚未创建或已清理，目录保持干净
        assert_eq!(dir_entry_count(parent.path()), 0);
    }

    #[test]
    fn test_concat_list_escapes_single_quotes() {
        let paths = vec![std::path::PathBuf::from("/tmp/o'clock/chapter_0000.wav")];
        let list = render_concat_list(&paths);
        assert_eq!(list, "file '/tmp/o'\\''clock/chapter_0000.wav'\n");
    }

    #[test]
    fn test_blank_title_gets_default() {
        assert_eq!(title_or_default("  ", 2), "Chapter 3");
        assert_eq!(title_or_default("Named", 0), "Named");
    }
}
