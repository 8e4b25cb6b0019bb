//! 导出请求的临时工作集
//!
//! 每个导出请求独占一个唯一命名的临时目录，存放原始章节、
//! 规范 PCM、拼接清单、元数据与封装产物。目录随 WorkSet 的
//! Drop 整体递归删除：成功、失败、客户端中途取消都走同一条
//! 释放路径，不存在散落在分支里的手工清理。

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::application::ports::ExportFormat;

/// 一次导出请求的临时工作目录
#[derive(Debug)]
pub struct WorkSet {
    dir: TempDir,
}

impl WorkSet {
    /// 在系统临时目录（或指定父目录）下创建唯一工作目录
    pub fn create(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lectern-export-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "Export work set created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// 第 index 章的原始音频落盘路径（转码后立即删除）
    pub fn raw_chapter_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("raw_{:04}.bin", index))
    }

    /// 第 index 章的规范 PCM 路径
    pub fn pcm_chapter_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("chapter_{:04}.wav", index))
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.dir.path().join("concat.txt")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.path().join("chapters.ffmeta")
    }

    pub fn output_path(&self, format: ExportFormat) -> PathBuf {
        self.dir
            .path()
            .join(format!("audiobook.{}", format.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workset_dir_removed_on_drop() {
        let workset = WorkSet::create(None).unwrap();
        let path = workset.path().to_path_buf();
        assert!(path.is_dir());

        std::fs::write(workset.raw_chapter_path(0), b"data").unwrap();
        drop(workset);

        assert!(!path.exists());
    }

    #[test]
    fn test_paths_are_inside_workset() {
        let workset = WorkSet::create(None).unwrap();
        assert!(workset.raw_chapter_path(3).starts_with(workset.path()));
        assert!(workset.pcm_chapter_path(3).starts_with(workset.path()));
        assert!(workset
            .output_path(ExportFormat::M4b)
            .to_string_lossy()
            .ends_with("audiobook.m4b"));
    }

    #[test]
    fn test_worksets_are_unique() {
        let a = WorkSet::create(None).unwrap();
        let b = WorkSet::create(None).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
