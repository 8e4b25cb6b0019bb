//! 批量导出服务

mod assembler;
mod workset;

pub use assembler::{
    AssemblerConfig, AudiobookAssembler, AudiobookOutput, AudiobookStream, ChapterInput,
    TextChapter,
};
pub use workset::WorkSet;
