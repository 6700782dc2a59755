use std::collections::BTreeSet;

use bytes::Bytes;

use super::inner::PlayerInnerHolder;

/// Generation token for asynchronous work.
///
/// Every piece of work captures the epoch it was started in and must re-check it
/// after each suspension point. Epochs only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
	pub const fn get(&self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for Epoch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Indices of segments appended during one epoch.
#[derive(Debug, Clone, Default)]
pub struct LoadedSegments {
	generation: Epoch,
	indices: BTreeSet<usize>,
}

impl LoadedSegments {
	fn new(generation: Epoch) -> Self {
		Self {
			generation,
			indices: BTreeSet::new(),
		}
	}

	pub fn generation(&self) -> Epoch {
		self.generation
	}

	pub fn contains(&self, index: usize) -> bool {
		self.indices.contains(&index)
	}

	pub fn len(&self) -> usize {
		self.indices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
		self.indices.iter().copied()
	}
}

/// The most recently appended segment and whether the scheduler stopped right after it.
#[derive(Debug, Clone)]
pub struct PartialSegment {
	pub finished: bool,
	pub segment: usize,
	pub bytes: Bytes,
}

pub type FirstAppendCallback = Box<dyn FnOnce(&PlayerInnerHolder)>;

pub struct EpochController {
	current: Epoch,
	loaded: LoadedSegments,
	partial: Option<PartialSegment>,
	// Raw bytes of the last partial record from a previous epoch, so a reload
	// of the same segment does not refetch it.
	retained: Option<(usize, Bytes)>,
	init_appended: bool,
	first_append: Option<FirstAppendCallback>,
}

impl Default for EpochController {
	fn default() -> Self {
		Self::new()
	}
}

impl EpochController {
	pub fn new() -> Self {
		Self {
			current: Epoch::default(),
			loaded: LoadedSegments::new(Epoch::default()),
			partial: None,
			retained: None,
			init_appended: false,
			first_append: None,
		}
	}

	pub fn current(&self) -> Epoch {
		self.current
	}

	pub fn is_current(&self, epoch: Epoch) -> bool {
		self.current == epoch
	}

	/// Starts a new epoch, invalidating all in-flight work of the previous one.
	pub fn bump(&mut self) -> Epoch {
		self.current = Epoch(self.current.0 + 1);
		self.loaded = LoadedSegments::new(self.current);

		if let Some(partial) = self.partial.take() {
			self.retained = Some((partial.segment, partial.bytes));
		}

		self.init_appended = false;
		self.first_append = None;

		tracing::debug!(epoch = %self.current, "epoch bumped");

		self.current
	}

	/// Starts a new epoch for a different source, dropping all cached segment bytes.
	pub fn bump_for_source(&mut self) -> Epoch {
		self.partial = None;
		self.retained = None;
		self.bump()
	}

	pub fn loaded(&self) -> &LoadedSegments {
		&self.loaded
	}

	/// Records a completed segment. Returns true when it is the first one of the epoch.
	pub fn record_loaded(&mut self, index: usize) -> bool {
		let first = self.loaded.is_empty();
		self.loaded.indices.insert(index);
		first
	}

	pub fn partial(&self) -> Option<&PartialSegment> {
		self.partial.as_ref()
	}

	pub fn set_partial(&mut self, segment: usize, bytes: Bytes) {
		self.partial = Some(PartialSegment {
			finished: false,
			segment,
			bytes,
		});
	}

	/// Marks that the scheduler stopped after the partial segment.
	pub fn finish_partial(&mut self) {
		if let Some(partial) = self.partial.as_mut() {
			partial.finished = true;
		}
	}

	pub fn is_finished(&self) -> bool {
		self.partial.as_ref().is_some_and(|p| p.finished)
	}

	/// Bytes that can be reused instead of fetching `index` again.
	pub fn cached_bytes(&self, index: usize) -> Option<Bytes> {
		match (&self.partial, &self.retained) {
			(Some(partial), _) if partial.segment == index => Some(partial.bytes.clone()),
			(_, Some((segment, bytes))) if *segment == index => Some(bytes.clone()),
			_ => None,
		}
	}

	pub fn init_appended(&self) -> bool {
		self.init_appended
	}

	pub fn mark_init_appended(&mut self) {
		self.init_appended = true;
	}

	pub fn set_first_append(&mut self, callback: FirstAppendCallback) {
		self.first_append = Some(callback);
	}

	pub fn take_first_append(&mut self) -> Option<FirstAppendCallback> {
		self.first_append.take()
	}
}
