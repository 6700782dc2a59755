use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use wasm_bindgen::prelude::*;

use crate::player::errors::TransmuxError;
use crate::player::transmux::{TransmuxedFragment, Transmuxer, TransmuxerConfig};

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_namespace = ["muxjs", "mp4"], js_name = Transmuxer)]
	type JsTransmuxer;

	#[wasm_bindgen(constructor, js_namespace = ["muxjs", "mp4"], js_class = "Transmuxer", catch)]
	fn new(options: &JsValue) -> Result<JsTransmuxer, JsValue>;

	#[wasm_bindgen(method)]
	fn on(this: &JsTransmuxer, event: &str, f: &js_sys::Function);

	#[wasm_bindgen(method, catch)]
	fn push(this: &JsTransmuxer, data: &js_sys::Uint8Array) -> Result<(), JsValue>;

	#[wasm_bindgen(method, catch)]
	fn flush(this: &JsTransmuxer) -> Result<(), JsValue>;

	#[wasm_bindgen(method, js_name = setBaseMediaDecodeTime)]
	fn set_base_media_decode_time(this: &JsTransmuxer, time: f64);
}

fn read_bytes(segment: &JsValue, key: &str) -> Result<Bytes, JsValue> {
	let value = js_sys::Reflect::get(segment, &JsValue::from_str(key))?;
	if value.is_undefined() || value.is_null() {
		return Ok(Bytes::new());
	}

	Ok(Bytes::from(js_sys::Uint8Array::new(&value).to_vec()))
}

fn read_segment(segment: &JsValue) -> Result<TransmuxedFragment, JsValue> {
	let init_segment = read_bytes(segment, "initSegment")?;

	Ok(TransmuxedFragment {
		init_segment: (!init_segment.is_empty()).then_some(init_segment),
		data: read_bytes(segment, "data")?,
	})
}

/// [`Transmuxer`] backed by the `muxjs.mp4.Transmuxer` global.
pub struct MuxJsTransmuxer {
	inner: JsTransmuxer,
	output: Rc<RefCell<Vec<Result<TransmuxedFragment, TransmuxError>>>>,
	_ondata: Closure<dyn FnMut(JsValue)>,
}

impl MuxJsTransmuxer {
	pub fn new(config: TransmuxerConfig) -> Result<Self, JsValue> {
		let options = serde_wasm_bindgen::to_value(&config)?;
		let inner = JsTransmuxer::new(&options)?;
		let output = Rc::new(RefCell::new(Vec::new()));

		let ondata = Closure::<dyn FnMut(JsValue)>::new({
			let output = output.clone();
			move |segment: JsValue| {
				let fragment = read_segment(&segment).map_err(|err| TransmuxError::Rejected(format!("{err:?}")));

				output.borrow_mut().push(fragment);
			}
		});

		inner.on("data", ondata.as_ref().unchecked_ref());

		Ok(Self {
			inner,
			output,
			_ondata: ondata,
		})
	}
}

#[async_trait::async_trait(?Send)]
impl Transmuxer for MuxJsTransmuxer {
	fn set_base_media_decode_time(&self, seconds: f64) {
		self.inner.set_base_media_decode_time(seconds);
	}

	async fn transmux(&self, data: Bytes) -> Result<Vec<TransmuxedFragment>, TransmuxError> {
		self.output.borrow_mut().clear();

		let array = js_sys::Uint8Array::from(data.as_ref());
		self.inner
			.push(&array)
			.map_err(|err| TransmuxError::Rejected(format!("{err:?}")))?;
		self.inner
			.flush()
			.map_err(|err| TransmuxError::Rejected(format!("{err:?}")))?;

		self.output.borrow_mut().drain(..).collect()
	}
}
