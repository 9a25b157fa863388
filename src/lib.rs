pub mod assembler;
pub mod compiler;
pub mod error;
pub mod fs;
pub mod indexer;
pub mod resolver;
pub mod rewriter;

pub use assembler::{load_artifact, save_artifact, AssembleOptions, Assembler, ExportMap};
pub use compiler::{CompileOptions, Compiler, Unit};
pub use error::{LoaderError, Result};
pub use indexer::{Indexer, IndexifyOptions};
pub use resolver::{resolve, Resolved};
pub use rewriter::{ModuleConfig, RewriteOutcome, Rewriter};
