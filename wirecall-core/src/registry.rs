//! # Descriptor Registry
//!
//! This module holds the Protobuf schema shared by every call. It is populated on demand
//! from binary `FileDescriptorSet`s supplied with each call and queried by fully-qualified
//! message name.
//!
//! ## Semantics
//!
//! * **Append-only**: a registered file or type is never replaced. Re-registering an
//!   identical file is a no-op, registering a different file under a known name is a
//!   [`RegistryError::FileRedefined`] error.
//! * **Per-file short-circuit**: before a new file is registered, the call's request type
//!   is looked up. If it already resolves, the file is validated but not registered. The
//!   check runs once per file, so later files of the same set are still visited.
//! * **Top-level types**: only the top-level messages of a file are entered in the
//!   name → type map. Nested messages remain reachable as field types.
//!
//! ## Concurrency
//!
//! The schema lives in an immutable [`Snapshot`] behind an `Arc`. Writers are serialized
//! and publish a new snapshot per registered file, readers clone the current `Arc` and
//! never observe a half-registered file.
use base64::{Engine, engine::general_purpose::STANDARD};
use parking_lot::{Mutex, RwLock};
use prost::Message;
use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::{collections::HashMap, sync::Arc};

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("Registry file #{index} is not valid base64: '{source}'")]
    InvalidBase64 {
        index: usize,
        source: base64::DecodeError,
    },
    #[error("Registry file #{index} is not a valid FileDescriptorSet: '{source}'")]
    MalformedDescriptor {
        index: usize,
        source: prost::DecodeError,
    },
    #[error("Descriptor file '{file}' conflicts with the registered schema: '{source}'")]
    DescriptorConflict {
        file: String,
        source: prost_reflect::DescriptorError,
    },
    #[error("Descriptor file '{file}' is already registered with a different definition")]
    FileRedefined { file: String },
}

/// A fully-qualified message name that could not be resolved.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Message type '{0}' not found in the registry")]
pub struct TypeNotFound(pub String);

/// Immutable view of the registered schema.
#[derive(Debug, Clone)]
struct Snapshot {
    pool: DescriptorPool,
    /// Raw files as they were submitted, keyed by file name.
    files: HashMap<String, FileDescriptorProto>,
    /// Registered message types, keyed by fully-qualified name.
    types: HashMap<String, MessageDescriptor>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            pool: DescriptorPool::new(),
            files: HashMap::new(),
            types: HashMap::new(),
        }
    }
}

/// Thread-safe store of message types, shared by every call of a process.
#[derive(Debug)]
pub struct Registry {
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            writer: Mutex::new(()),
        }
    }

    /// Decodes base64 encoded descriptor sets and loads them with [`Registry::load`].
    ///
    /// Line breaks (`\r`, `\n`) are ignored, so wrapped or newline-terminated entries load.
    /// Every entry is decoded before anything is registered, so an invalid entry leaves
    /// the registry untouched.
    pub fn load_base64<S: AsRef<str>>(
        &self,
        registry_files: &[S],
        request_type: &str,
    ) -> Result<(), RegistryError> {
        let blobs = registry_files
            .iter()
            .enumerate()
            .map(|(index, encoded)| {
                let encoded: String = encoded
                    .as_ref()
                    .chars()
                    .filter(|c| !matches!(c, '\r' | '\n'))
                    .collect();

                STANDARD
                    .decode(encoded)
                    .map_err(|source| RegistryError::InvalidBase64 { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.load(&blobs, request_type)
    }

    /// Registers every file of the given binary `FileDescriptorSet`s, in order.
    ///
    /// # Arguments
    ///
    /// * `blobs` - Encoded `FileDescriptorSet`s.
    /// * `request_type` - The fully-qualified request type of the current call, used for
    ///   the per-file short-circuit.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All files were registered or skipped.
    /// * `Err(RegistryError)` - A set could not be decoded or a file conflicts with the
    ///   registered schema. Files registered before the failure stay registered.
    pub fn load<B: AsRef<[u8]>>(
        &self,
        blobs: &[B],
        request_type: &str,
    ) -> Result<(), RegistryError> {
        let sets = blobs
            .iter()
            .enumerate()
            .map(|(index, blob)| {
                FileDescriptorSet::decode(blob.as_ref())
                    .map_err(|source| RegistryError::MalformedDescriptor { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let _writer = self.writer.lock();

        for file in sets.into_iter().flat_map(|set| set.file) {
            self.register_file(file, request_type)?;
        }

        Ok(())
    }

    fn register_file(
        &self,
        file: FileDescriptorProto,
        request_type: &str,
    ) -> Result<(), RegistryError> {
        let current = self.snapshot();
        let name = file.name().to_string();

        if let Some(existing) = current.files.get(&name) {
            if *existing == file {
                tracing::debug!(file = %name, "descriptor file already registered");
                return Ok(());
            }
            return Err(RegistryError::FileRedefined { file: name });
        }

        let mut pool = current.pool.clone();
        pool.add_file_descriptor_proto(file.clone())
            .map_err(|source| RegistryError::DescriptorConflict {
                file: name.clone(),
                source,
            })?;

        if current.types.contains_key(request_type) {
            tracing::debug!(file = %name, request_type, "request type already registered, skipping file");
            return Ok(());
        }

        let mut types = current.types.clone();
        if let Some(registered) = pool.get_file_by_name(&name) {
            tracing::debug!(file = %name, package = registered.package_name(), "loading package");

            for message in registered.messages() {
                types
                    .entry(message.full_name().to_string())
                    .or_insert(message);
            }
        }

        let mut files = current.files.clone();
        files.insert(name, file);

        *self.snapshot.write() = Arc::new(Snapshot { pool, files, types });
        Ok(())
    }

    /// Looks up a registered message type by its fully-qualified name (e.g. `echo.EchoRequest`).
    pub fn resolve(&self, type_name: &str) -> Result<MessageDescriptor, TypeNotFound> {
        self.snapshot()
            .types
            .get(type_name)
            .cloned()
            .ok_or_else(|| TypeNotFound(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.snapshot().types.contains_key(type_name)
    }

    /// Fully-qualified names of every registered message type, sorted.
    pub fn message_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().types.keys().cloned().collect();
        names.sort();
        names
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }
}
