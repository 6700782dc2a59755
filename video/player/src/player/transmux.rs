use std::cell::RefCell;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use tokio::sync::Mutex;

use super::epoch::Epoch;
use super::errors::{PlayerResult, TransmuxError};
use super::inner::PlayerInnerHolder;
use super::manifest::Segment;

/// One fragmented-MP4 unit produced by the transmuxer.
#[derive(Debug, Clone)]
pub struct TransmuxedFragment {
	/// Present whenever the transmuxer (re)emits the initialization segment.
	pub init_segment: Option<Bytes>,
	pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmuxerConfig {
	pub remux: bool,
	pub base_media_decode_time: f64,
	pub keep_original_timestamps: bool,
}

impl Default for TransmuxerConfig {
	fn default() -> Self {
		Self {
			remux: true,
			base_media_decode_time: 0.0,
			keep_original_timestamps: false,
		}
	}
}

/// Converts MPEG-TS segments into fragmented MP4.
#[async_trait::async_trait(?Send)]
pub trait Transmuxer {
	/// Rebases the output timeline, in seconds.
	fn set_base_media_decode_time(&self, seconds: f64);

	/// Pushes one segment and flushes. Yields zero or more fragments.
	async fn transmux(&self, data: Bytes) -> Result<Vec<TransmuxedFragment>, TransmuxError>;
}

pub struct TransmuxPipeline {
	transmuxer: Rc<dyn Transmuxer>,
	push_lock: Mutex<()>,
	init_segment: RefCell<Option<Bytes>>,
}

impl TransmuxPipeline {
	pub fn new(transmuxer: Rc<dyn Transmuxer>) -> Self {
		Self {
			transmuxer,
			push_lock: Mutex::new(()),
			init_segment: RefCell::new(None),
		}
	}

	/// Forgets the initialization segment of the previous source.
	pub fn reset(&self) {
		self.init_segment.borrow_mut().take();
	}

	pub fn rebase(&self, seconds: f64) {
		tracing::debug!(seconds, "rebasing transmuxer");
		self.transmuxer.set_base_media_decode_time(seconds);
	}

	/// Transmuxes `raw` and appends every fragment it yields before returning.
	///
	/// Pushes are serialized so fragments of two segments never interleave. The first
	/// append of an epoch is prefixed with the initialization segment.
	#[tracing::instrument(skip(self, inner, segment, raw), fields(%epoch, segment = segment.index))]
	pub async fn push(&self, inner: &PlayerInnerHolder, epoch: Epoch, segment: &Segment, raw: Bytes) -> PlayerResult<()> {
		let _guard = self.push_lock.lock().await;
		inner.ensure_current(epoch)?;

		let fragments = self.transmuxer.transmux(raw.clone()).await?;
		inner.ensure_current(epoch)?;

		if fragments.is_empty() {
			tracing::warn!(bytes = raw.len(), "transmuxer produced no output");
		}

		let platform = inner.platform();
		let mut appended = 0;

		for fragment in fragments {
			if let Some(init) = fragment.init_segment {
				*self.init_segment.borrow_mut() = Some(init);
			}

			let needs_init = !inner.borrow().epoch.init_appended();
			let data = if needs_init {
				let init = self.init_segment.borrow().clone().ok_or(TransmuxError::MissingInit)?;

				let mut data = BytesMut::with_capacity(init.len() + fragment.data.len());
				data.extend_from_slice(&init);
				data.extend_from_slice(&fragment.data);
				data.freeze()
			} else {
				fragment.data
			};

			appended += data.len();
			platform.sink.append(inner, epoch, data).await?;

			if needs_init {
				inner.borrow_mut().epoch.mark_init_appended();
			}
		}

		platform.sink.complete_segment(inner, epoch, segment, raw, appended)
	}
}
