//! 章节时间轴
//!
//! 对转码后的章节时长做累计求和，得到每章的起止时间戳（毫秒，截断），
//! 并渲染容器封装步骤所需的章节元数据文档（FFMETADATA 格式）。

/// 单个章节标记
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMark {
    pub start_ms: u64,
    pub end_ms: u64,
    pub title: String,
}

/// 章节时间轴
///
/// 不变量：第 i 章的 start_ms 恒等于第 i-1 章的 end_ms，首章从 0 开始。
/// 内部用 f64 秒做累计，起止毫秒都从同一个累计值截断得出，
/// 保证相邻章节的边界严格相等。
#[derive(Debug, Default)]
pub struct Timeline {
    marks: Vec<ChapterMark>,
    elapsed_secs: f64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一章，按输入顺序累计时钟
    pub fn push(&mut self, title: impl Into<String>, duration_secs: f64) {
        let start_ms = truncate_ms(self.elapsed_secs);
        self.elapsed_secs += duration_secs;
        let end_ms = truncate_ms(self.elapsed_secs);

        self.marks.push(ChapterMark {
            start_ms,
            end_ms,
            title: title.into(),
        });
    }

    pub fn marks(&self) -> &[ChapterMark] {
        &self.marks
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// 总时长（秒）
    pub fn total_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// 渲染章节元数据文档
    ///
    /// 行式文本：版本标记行开头，每章一个区块，字段顺序固定为
    /// 区块标记、时间基（毫秒）、起点、终点、标题。
    pub fn render_metadata(&self) -> String {
        let mut doc = String::from(";FFMETADATA1\n");
        for mark in &self.marks {
            doc.push_str("[CHAPTER]\n");
            doc.push_str("TIMEBASE=1/1000\n");
            doc.push_str(&format!("START={}\n", mark.start_ms));
            doc.push_str(&format!("END={}\n", mark.end_ms));
            doc.push_str(&format!("title={}\n", escape_metadata_value(&mark.title)));
        }
        doc
    }
}

/// 秒 → 毫秒，截断而非四舍五入
#[inline]
fn truncate_ms(secs: f64) -> u64 {
    (secs * 1000.0) as u64
}

/// 元数据值转义：`=`、`;`、`#`、`\` 与换行需要反斜杠转义
fn escape_metadata_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '=' | ';' | '#' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\\n"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_timeline() {
        let mut timeline = Timeline::new();
        timeline.push("One", 10.0);
        timeline.push("Two", 5.5);
        timeline.push("Three", 20.25);

        let marks = timeline.marks();
        assert_eq!(marks[0].start_ms, 0);
        assert_eq!(marks[0].end_ms, 10000);
        assert_eq!(marks[1].start_ms, 10000);
        assert_eq!(marks[1].end_ms, 15500);
        assert_eq!(marks[2].start_ms, 15500);
        assert_eq!(marks[2].end_ms, 35750);
    }

    #[test]
    fn test_adjacent_boundaries_are_exactly_equal() {
        // 非整数时长下相邻边界也必须严格相等
        let durations = [3.333, 7.777, 0.001, 12.9];
        let mut timeline = Timeline::new();
        for (i, d) in durations.iter().enumerate() {
            timeline.push(format!("ch{}", i), *d);
        }

        let marks = timeline.marks();
        for pair in marks.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(marks[0].start_ms, 0);
    }

    #[test]
    fn test_milliseconds_truncated_not_rounded() {
        let mut timeline = Timeline::new();
        timeline.push("c", 1.9996);
        // 1999.6ms 截断为 1999，而不是四舍五入的 2000
        assert_eq!(timeline.marks()[0].end_ms, 1999);
    }

    #[test]
    fn test_metadata_document_layout() {
        let mut timeline = Timeline::new();
        timeline.push("Intro", 1.0);
        timeline.push("Body", 2.0);

        let doc = timeline.render_metadata();
        let expected = ";FFMETADATA1\n\
                        [CHAPTER]\n\
                        TIMEBASE=1/1000\n\
                        START=0\n\
                        END=1000\n\
                        title=Intro\n\
                        [CHAPTER]\n\
                        TIMEBASE=1/1000\n\
                        START=1000\n\
                        END=3000\n\
                        title=Body\n";
        assert_eq!(doc, expected);
    }

    #[test]
    fn test_metadata_title_escaping() {
        let mut timeline = Timeline::new();
        timeline.push("a=b; #1 \\ done", 1.0);

        let doc = timeline.render_metadata();
        assert!(doc.contains("title=a\\=b\\; \\#1 \\\\ done\n"));
    }

    #[test]
    fn test_empty_timeline_renders_only_header() {
        let timeline = Timeline::new();
        assert_eq!(timeline.render_metadata(), ";FFMETADATA1\n");
        assert!(timeline.is_empty());
    }
}
