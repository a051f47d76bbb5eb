//! Loading an environment: builtin library, preprocessing, type tree.

use std::sync::Arc;

use dmkit_foundation::{LoadConfig, Result, Value};
use tracing::{debug, info};

use crate::builder::TreeBuilder;
use crate::eval::EvalContext;
use crate::lexer::tokenize;
use crate::parser::parse_tokens;
use crate::preprocess::{DefineTable, Preprocessor};
use crate::reader::{FileCache, MemoryReader, SourceReader};
use crate::stddef::{STDDEF, STDDEF_FILE};
use crate::types::{TypeId, TypeRegistry};

/// A load progress report.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    /// How far along the load is, from 0 to 1.
    pub fraction: f32,
    /// What is happening now.
    pub message: String,
}

/// A loaded project: its type tree and the macros left defined at the end.
#[derive(Debug)]
pub struct Environment {
    /// The finalized type tree.
    pub types: TypeRegistry,
    /// Macros defined after the last file was processed.
    pub defines: DefineTable,
    /// Every file pulled in by `#include`, in processing order.
    pub files: Vec<Arc<str>>,
}

impl Environment {
    /// Loads the project whose entry file is `entry`.
    ///
    /// `progress`, when given, is called between phases.
    ///
    /// # Errors
    ///
    /// Returns the first fatal preprocessing, syntax or type tree error.
    pub fn load(
        reader: Arc<dyn SourceReader>,
        entry: &str,
        config: &LoadConfig,
        mut progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<Self> {
        let mut report = |fraction: f32, message: String| {
            debug!(fraction, "{message}");
            if let Some(callback) = progress.as_deref_mut() {
                callback(Progress { fraction, message });
            }
        };

        let cache = Arc::new(FileCache::new(reader));
        let mut preprocessor = Preprocessor::new(cache, config.clone());
        let mut types = TypeRegistry::new();

        if config.include_stddef {
            report(0.0, "Loading builtin library".to_string());
            let tokens =
                preprocessor.preprocess(&tokenize(STDDEF_FILE, STDDEF), STDDEF_FILE, false)?;
            TreeBuilder::new(&mut types).build(&tokens)?;
        }

        report(0.05, format!("Preprocessing {entry}"));
        let tokens = preprocessor.preprocess_file(entry)?;

        report(0.9, "Building type tree".to_string());
        TreeBuilder::new(&mut types).build(&tokens)?;

        report(0.95, "Evaluating variables".to_string());
        types.finalize()?;

        let files = preprocessor.included_files().to_vec();
        report(1.0, "Done".to_string());
        info!(
            entry,
            types = types.len(),
            files = files.len(),
            "environment loaded"
        );
        Ok(Self {
            types,
            defines: preprocessor.into_defines(),
            files,
        })
    }

    /// Number of types, including the root.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Finds a type by path.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<TypeId> {
        self.types.lookup(path)
    }

    /// Evaluates `text` as an expression, with this environment's macros
    /// expanded and its root variables visible.
    ///
    /// # Errors
    ///
    /// Returns a `Syntax` error for malformed text and a `NonConstant` error
    /// if the result is not a constant.
    pub fn eval_text(&self, text: &str) -> Result<Value> {
        let cache = Arc::new(FileCache::new(Arc::new(MemoryReader::new())));
        let mut preprocessor =
            Preprocessor::new(cache, LoadConfig::bare()).with_defines(self.defines.clone());
        let tokens = preprocessor.preprocess(&tokenize("<expression>", text), "<expression>", false)?;
        parse_tokens(&tokens)?.evaluate_constant(&EvalContext::with_types(&self.types))
    }
}

/// Evaluates `text` as a standalone constant expression.
///
/// # Errors
///
/// Returns a `Syntax` error for malformed text and a `NonConstant` error if
/// the result is not a constant.
pub fn eval_text(text: &str) -> Result<Value> {
    parse_tokens(&tokenize("<expression>", text))?.evaluate_constant(&EvalContext::new())
}
