//! WebAssembly module compilation and process-wide caching.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's
//! [`Module`] with content hashing and compile-time metadata, and
//! [`ModuleCache`], which guarantees the deployed guest image is fetched
//! and compiled at most once per process.
//!
//! # Caching contract
//!
//! Every event needs the compiled module, but compilation is the expensive
//! step of the lifecycle. The cache memoizes the first successful
//! compilation; concurrent first callers all await the same in-flight
//! compilation rather than racing duplicate ones. A failed compilation is
//! not memoized: the image is immutable for the life of the process, so
//! later events deterministically re-observe the same failure.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use wasmtime::{Engine, Module};

use edge_bridge_common::BridgeError;

use crate::WasmEngine;

/// A compiled WebAssembly guest module.
///
/// This struct wraps a Wasmtime [`Module`] with additional metadata for
/// caching and debugging purposes.
///
/// # Thread Safety
///
/// `CompiledModule` is thread-safe and can be shared across concurrent
/// instantiations. The underlying Wasmtime module is also thread-safe.
#[derive(Clone)]
pub struct CompiledModule {
    /// The compiled Wasmtime module.
    inner: Module,

    /// Hash of the original Wasm bytes.
    content_hash: String,

    /// When this module was compiled.
    compiled_at: Instant,
}

impl CompiledModule {
    /// Compile a module from WebAssembly bytes.
    ///
    /// # Arguments
    ///
    /// * `engine` - The Wasmtime engine to use for compilation
    /// * `bytes` - The raw WebAssembly bytes
    ///
    /// # Errors
    ///
    /// Returns an error if compilation fails (e.g., invalid Wasm).
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, BridgeError> {
        let start = Instant::now();

        // Validate Wasm magic number
        Self::validate_wasm_header(bytes)?;

        let module = Module::new(engine, bytes)
            .map_err(|e| BridgeError::module_load(format!("Module compilation failed: {e}")))?;

        let content_hash = compute_hash(bytes);
        let duration = start.elapsed();

        info!(
            content_hash = %content_hash,
            duration_ms = duration.as_millis(),
            "Guest module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    ///
    /// This is primarily for testing purposes.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation fails.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, BridgeError> {
        let start = Instant::now();

        let module = Module::new(engine, wat)
            .map_err(|e| BridgeError::module_load(format!("WAT compilation failed: {e}")))?;

        let content_hash = compute_hash(wat.as_bytes());
        let duration = start.elapsed();

        debug!(
            content_hash = %content_hash,
            duration_ms = duration.as_millis(),
            "WAT module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Get the content hash of the original Wasm bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get when this module was compiled.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }

    /// Get the inner Wasmtime module.
    pub fn module(&self) -> &Module {
        &self.inner
    }

    /// Validate WebAssembly header (magic number).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), BridgeError> {
        if bytes.len() < 8 {
            return Err(BridgeError::module_load("Invalid Wasm: file too small"));
        }

        // Check magic number: \0asm
        if &bytes[0..4] != b"\0asm" {
            return Err(BridgeError::module_load("Invalid Wasm: bad magic number"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Where the deployed guest image comes from.
#[derive(Clone)]
pub enum ModuleSource {
    /// Read the image from a file on disk.
    File(PathBuf),
    /// Use in-memory Wasm bytes.
    Bytes(Vec<u8>),
    /// Compile inline WAT text (tests).
    Wat(String),
    /// Fetch the image through a provider (e.g., a bundle store).
    Provider(Arc<dyn ModuleProvider>),
}

impl std::fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Wat(wat) => f.debug_tuple("Wat").field(&wat.len()).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Fetches the raw guest image bytes on first use.
#[async_trait]
pub trait ModuleProvider: Send + Sync {
    /// Fetch the raw WebAssembly bytes of the deployed image.
    async fn fetch(&self) -> Result<Vec<u8>, BridgeError>;
}

/// Process-wide compile-once cache for the deployed guest module.
///
/// The first [`get`](Self::get) fetches and compiles the image; all later
/// calls (and all concurrent first calls) share that single compilation.
#[derive(Debug)]
pub struct ModuleCache {
    engine: WasmEngine,
    source: ModuleSource,
    cell: OnceCell<Arc<CompiledModule>>,
}

impl ModuleCache {
    /// Create a cache for the given image source.
    ///
    /// Nothing is fetched or compiled until the first [`get`](Self::get).
    pub fn new(engine: WasmEngine, source: ModuleSource) -> Self {
        Self {
            engine,
            source,
            cell: OnceCell::new(),
        }
    }

    /// Get the compiled module, compiling it on first use.
    ///
    /// Concurrent callers during the first compilation all await the same
    /// in-flight attempt; exactly one fetch/compile happens. A failure is
    /// returned to every waiter and is not memoized.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ModuleLoad`] if the image cannot be read or
    /// compiled.
    pub async fn get(&self) -> Result<Arc<CompiledModule>, BridgeError> {
        self.cell
            .get_or_try_init(|| async {
                let compiled = self.compile().await?;
                Ok(Arc::new(compiled))
            })
            .await
            .cloned()
    }

    /// Returns `true` if the module has already been compiled.
    pub fn is_compiled(&self) -> bool {
        self.cell.initialized()
    }

    async fn compile(&self) -> Result<CompiledModule, BridgeError> {
        match &self.source {
            ModuleSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    BridgeError::module_load(format!(
                        "Failed to read module from {}: {e}",
                        path.display()
                    ))
                })?;
                CompiledModule::from_bytes(self.engine.inner(), &bytes)
            }
            ModuleSource::Bytes(bytes) => CompiledModule::from_bytes(self.engine.inner(), bytes),
            ModuleSource::Wat(wat) => CompiledModule::from_wat(self.engine.inner(), wat),
            ModuleSource::Provider(provider) => {
                let bytes = provider.fetch().await?;
                CompiledModule::from_bytes(self.engine.inner(), &bytes)
            }
        }
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
