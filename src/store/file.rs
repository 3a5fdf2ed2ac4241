//! Simple file-backed [`TokenCache`] for single-node deployments.
//!
//! Persists a JSON snapshot after every mutation, giving cached refresh
//! secrets the same durability a database-backed cache would without
//! requiring one.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Resource, TokenRecord, TokenSubject},
	store::{CacheFuture, CacheKey, CompareAndSwapOutcome, StoreError, TokenCache, memory},
};

/// Persists cached records to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileCache {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<CacheKey, TokenRecord>>>,
}
impl FileCache {
	/// Opens (or creates) a cache at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<CacheKey, TokenRecord>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		let entries: Vec<(CacheKey, TokenRecord)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<CacheKey, TokenRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize cache snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenCache for FileCache {
	fn save(&self, record: TokenRecord) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			let key = CacheKey::new(&record.subject, &record.resource);
			let mut guard = self.inner.write();

			guard.insert(key, record);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn fetch<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
	) -> CacheFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			let key = CacheKey::new(subject, resource);

			Ok(self.inner.read().get(&key).cloned())
		})
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> CacheFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let key = CacheKey::new(subject, resource);
			let mut guard = self.inner.write();
			let outcome = match guard.get(&key) {
				Some(existing)
					if memory::refresh_matches(
						existing.refresh_token.as_ref(),
						expected_refresh,
					) =>
					CompareAndSwapOutcome::Updated,
				Some(_) => CompareAndSwapOutcome::RefreshMismatch,
				None => CompareAndSwapOutcome::Missing,
			};

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				guard.insert(key, replacement);
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn revoke<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
		instant: OffsetDateTime,
	) -> CacheFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			let key = CacheKey::new(subject, resource);
			let mut guard = self.inner.write();
			let result = match guard.get_mut(&key) {
				Some(record) => {
					record.revoke(instant);

					let cloned = record.clone();

					self.persist_locked(&guard)?;

					Some(cloned)
				},
				None => None,
			};

			Ok(result)
		})
	}
}
