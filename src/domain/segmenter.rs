//! 文本分割器
//!
//! 将文档原文切分为可朗读的有界长度文本块：
//! 1. 按段落（换行）切分
//! 2. 段内文本清洗（URL 占位、断词连字符修复、去强调符、空白折叠）
//! 3. 按句子切分后贪心装配，单块不超过最大字符数
//!
//! 纯函数，无任何隐藏状态，相同输入必然产生相同输出。

/// 交互播放模式下的默认单块最大字符数
pub const DEFAULT_MAX_BLOCK_CHARS: usize = 300;

/// 分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 单块最大字符数（按 Unicode 字符计）
    pub max_block_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_block_chars: DEFAULT_MAX_BLOCK_CHARS,
        }
    }
}

/// 可朗读文本块
///
/// 顺序敏感：块序列的先后即朗读顺序。块内容已经过清洗，
/// 可直接作为缓存 key 与合成请求正文使用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub text: String,
}

impl Block {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 句末标点（含全角）
#[inline]
fn is_sentence_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

/// 句末标点之后允许跟随的收尾字符（引号、括号）
#[inline]
fn is_trailing_closer(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '」' | '』'
    )
}

/// URL 方案前缀
const URL_PREFIXES: &[&str] = &["https://", "http://", "www."];

/// 查找下一个 URL 起始位置
///
/// 要求前一个字符不是字母数字，避免把词中间的 "www." 误判为链接
fn find_url_start(s: &str) -> Option<usize> {
    URL_PREFIXES
        .iter()
        .filter_map(|prefix| {
            let mut from = 0;
            while let Some(rel) = s[from..].find(prefix) {
                let idx = from + rel;
                let boundary = s[..idx]
                    .chars()
                    .next_back()
                    .map(|c| !c.is_alphanumeric())
                    .unwrap_or(true);
                if boundary {
                    return Some(idx);
                }
                from = idx + prefix.len();
            }
            None
        })
        .min()
}

/// 提取 URL 的主机名部分，用于生成占位文本
fn url_host(url: &str) -> &str {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let end = without_scheme
        .find(|c| matches!(c, '/' | '?' | '#' | ':'))
        .unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

/// 将 URL 替换为可朗读的占位文本（"link to example.com"）
///
/// URL token 取到下一个空白为止，token 末尾的句读符号保留在原文中，
/// 保证后续句子切分不受影响。
fn replace_urls(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = find_url_start(rest) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let token_end = tail
            .find(char::is_whitespace)
            .unwrap_or(tail.len());
        let token = &tail[..token_end];
        // 去掉粘连在 URL 末尾的标点
        let url = token.trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));

        let host = url_host(url);
        if host.is_empty() {
            out.push_str(token);
        } else {
            out.push_str("link to ");
            out.push_str(host);
            out.push_str(&token[url.len()..]);
        }
        rest = &tail[token_end..];
    }
    out.push_str(rest);
    out
}

/// 修复断词连字符：字母数字 + '-' + 空白 + 字母数字 → 去掉连字符与空白，拼回整词
fn repair_hyphenation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '-' && i > 0 && chars[i - 1].is_alphanumeric() {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].is_alphanumeric() {
                i = j;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// 去除强调标记字符（Markdown 风格的 `*` 与 `_`）
fn strip_emphasis(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '*' | '_')).collect()
}

/// 折叠连续空白为单个空格并去除首尾空白
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 文本清洗：替换 URL → 修复断词 → 去强调符 → 折叠空白
///
/// 清洗后的文本即缓存 key 的归一化形式
pub fn clean_text(text: &str) -> String {
    let replaced = replace_urls(text);
    let repaired = repair_hyphenation(&replaced);
    let stripped = strip_emphasis(&repaired);
    collapse_whitespace(&stripped)
}

/// 将清洗后的段落切分为自然句
///
/// 句边界：句末标点（可带引号/括号收尾）之后紧跟空白或段尾。
/// 没有句末标点的段落整体作为一句返回。
fn split_sentences(paragraph: &str) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        current.push(ch);

        if is_sentence_terminator(ch) {
            // 吸收收尾引号/括号
            let mut j = i + 1;
            while j < chars.len() && is_trailing_closer(chars[j]) {
                current.push(chars[j]);
                j += 1;
            }
            // 后面是空白或段尾才算句边界
            if j >= chars.len() || chars[j].is_whitespace() {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
            i = j;
            continue;
        }
        i += 1;
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// 将句子贪心装配为不超过 max_chars 的块
///
/// 单句超限时该句独占一块，不再强行切开
fn pack_sentences(sentences: Vec<String>, max_chars: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let len = sentence.chars().count();
        if current.is_empty() {
            current = sentence;
            current_len = len;
        } else if current_len + 1 + len <= max_chars {
            current.push(' ');
            current.push_str(&sentence);
            current_len += 1 + len;
        } else {
            blocks.push(Block::new(std::mem::take(&mut current)));
            current = sentence;
            current_len = len;
        }
    }

    if !current.is_empty() {
        blocks.push(Block::new(current));
    }
    blocks
}

/// 对文档文本分块
///
/// 分割策略：
/// 1. 按换行切段，丢弃空段，块永不跨段
/// 2. 段内清洗后，不超限的段落整段成块（跳过句子分析）
/// 3. 超限段落按句切分后贪心装配
pub fn segment(text: &str, config: &SegmentConfig) -> Vec<Block> {
    let mut blocks = Vec::new();

    for line in text.lines() {
        let cleaned = clean_text(line);
        if cleaned.is_empty() {
            continue;
        }

        if cleaned.chars().count() <= config.max_block_chars {
            blocks.push(Block::new(cleaned));
            continue;
        }

        let sentences = split_sentences(&cleaned);
        blocks.extend(pack_sentences(sentences, config.max_block_chars));
    }

    blocks
}

/// 使用默认配置分块（便捷方法）
pub fn segment_default(text: &str) -> Vec<Block> {
    segment(text, &SegmentConfig::default())
}
