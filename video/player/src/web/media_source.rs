use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use tokio::sync::{mpsc, Notify};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlVideoElement, MediaSource, MediaSourceReadyState, SourceBuffer};

use super::util::{register_events, Holder};
use crate::player::errors::SinkError;
use crate::player::sink::{MediaSink, SinkState};

fn js_error(err: JsValue) -> SinkError {
	SinkError::Platform(format!("{err:?}"))
}

struct SourceBufferHolder {
	sb: Holder<SourceBuffer>,
	updateend: Rc<Notify>,
}

impl SourceBufferHolder {
	fn new(media_source: &MediaSource, mime: &str) -> Result<Self, JsValue> {
		let sb = media_source.add_source_buffer(mime)?;
		let updateend = Rc::new(Notify::new());

		let cleanup = register_events!(sb, {
			"updateend" => {
				let updateend = updateend.clone();
				move |_| updateend.notify_waiters()
			},
		});

		Ok(Self {
			sb: Holder::new(sb, cleanup),
			updateend,
		})
	}
}

/// [`MediaSink`] backed by a `MediaSource` attached to a video element.
pub struct MediaSourceSink {
	element: HtmlVideoElement,
	media_source: RefCell<Option<Holder<MediaSource>>>,
	object_url: RefCell<Option<String>>,
	buffer: RefCell<Option<SourceBufferHolder>>,
}

impl MediaSourceSink {
	pub fn new(element: HtmlVideoElement) -> Self {
		Self {
			element,
			media_source: RefCell::new(None),
			object_url: RefCell::new(None),
			buffer: RefCell::new(None),
		}
	}

	fn with_buffer<T>(&self, f: impl FnOnce(&SourceBuffer) -> Result<T, JsValue>) -> Result<T, SinkError> {
		let buffer = self.buffer.borrow();
		let buffer = buffer.as_ref().ok_or(SinkError::NotOpen)?;
		f(&buffer.sb).map_err(js_error)
	}

	fn with_media_source<T>(&self, f: impl FnOnce(&MediaSource) -> Result<T, JsValue>) -> Result<T, SinkError> {
		let media_source = self.media_source.borrow();
		let media_source = media_source.as_ref().ok_or(SinkError::NotOpen)?;
		f(media_source).map_err(js_error)
	}

	fn release(&self) {
		self.buffer.borrow_mut().take();
		self.media_source.borrow_mut().take();
		if let Some(url) = self.object_url.borrow_mut().take() {
			web_sys::Url::revoke_object_url(&url).ok();
		}
	}
}

impl Drop for MediaSourceSink {
	fn drop(&mut self) {
		self.release();
	}
}

#[async_trait::async_trait(?Send)]
impl MediaSink for MediaSourceSink {
	async fn open(&self) -> Result<(), SinkError> {
		self.release();

		let media_source = MediaSource::new().map_err(js_error)?;
		let (tx, mut rx) = mpsc::channel(1);

		let cleanup = register_events!(media_source, {
			"sourceopen" => move |_| {
				tx.try_send(()).ok();
			},
		});

		let url = web_sys::Url::create_object_url_with_source(&media_source).map_err(js_error)?;
		self.element.set_src(&url);
		self.object_url.replace(Some(url));
		self.media_source.replace(Some(Holder::new(media_source, cleanup)));

		rx.recv().await.ok_or(SinkError::NotOpen)
	}

	fn is_type_supported(&self, mime: &str) -> bool {
		MediaSource::is_type_supported(mime)
	}

	fn add_buffer_handle(&self, mime: &str) -> Result<(), SinkError> {
		let buffer = {
			let media_source = self.media_source.borrow();
			let media_source = media_source.as_ref().ok_or(SinkError::NotOpen)?;
			SourceBufferHolder::new(media_source, mime).map_err(js_error)?
		};

		self.buffer.replace(Some(buffer));
		Ok(())
	}

	async fn append_buffer(&self, data: Bytes) -> Result<(), SinkError> {
		let (sb, updateend) = {
			let buffer = self.buffer.borrow();
			let buffer = buffer.as_ref().ok_or(SinkError::NotOpen)?;
			(SourceBuffer::clone(&buffer.sb), buffer.updateend.clone())
		};

		// Only completions after this point count, stale updateend events are dropped.
		let completed = updateend.notified();

		let mut data = data.to_vec();
		sb.append_buffer_with_u8_array(data.as_mut_slice()).map_err(js_error)?;
		completed.await;

		Ok(())
	}

	fn abort(&self) -> Result<(), SinkError> {
		self.with_buffer(|sb| sb.abort())
	}

	fn set_timestamp_offset(&self, seconds: f64) -> Result<(), SinkError> {
		self.with_buffer(|sb| {
			sb.set_timestamp_offset(seconds);
			Ok(())
		})
	}

	fn set_duration(&self, seconds: f64) -> Result<(), SinkError> {
		self.with_media_source(|ms| {
			ms.set_duration(seconds);
			Ok(())
		})
	}

	fn end_of_stream(&self) -> Result<(), SinkError> {
		self.with_media_source(|ms| ms.end_of_stream())
	}

	async fn reopen(&self, mime: &str) -> Result<(), SinkError> {
		self.open().await?;
		self.add_buffer_handle(mime)
	}

	fn ready_state(&self) -> SinkState {
		match self.media_source.borrow().as_ref().map(|ms| ms.ready_state()) {
			Some(MediaSourceReadyState::Open) => SinkState::Open,
			Some(MediaSourceReadyState::Ended) => SinkState::Ended,
			_ => SinkState::Closed,
		}
	}
}
