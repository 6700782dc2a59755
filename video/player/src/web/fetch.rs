use bytes::Bytes;
use js_sys::ArrayBuffer;
use tokio::sync::mpsc;
use url::Url;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{XmlHttpRequest, XmlHttpRequestResponseType};

use crate::player::errors::FetchError;
use crate::player::fetch::{AbortHandle, HttpClient, HttpResponse};

fn js_error(err: JsValue) -> FetchError {
	FetchError::Network(format!("{err:?}"))
}

/// [`HttpClient`] backed by `XMLHttpRequest`.
#[derive(Debug, Default)]
pub struct XhrClient;

struct InflightRequest {
	xhr: XmlHttpRequest,
	_onloadend: Closure<dyn FnMut()>,
}

impl InflightRequest {
	fn start(url: &Url, tx: mpsc::Sender<()>) -> Result<Self, JsValue> {
		let xhr = XmlHttpRequest::new()?;
		xhr.set_response_type(XmlHttpRequestResponseType::Arraybuffer);
		xhr.open("GET", url.as_str())?;
		xhr.set_request_header("Cache-Control", "no-cache")?;

		let onloadend = Closure::<dyn FnMut()>::new(move || {
			tx.try_send(()).ok();
		});
		xhr.set_onloadend(Some(onloadend.as_ref().unchecked_ref()));

		xhr.send()?;

		Ok(Self {
			xhr,
			_onloadend: onloadend,
		})
	}

	fn response(&self) -> Result<HttpResponse, FetchError> {
		let status = self.xhr.status().map_err(js_error)?;
		if status == 0 {
			return Err(FetchError::Network("request did not complete".into()));
		}

		let response = self.xhr.response().map_err(js_error)?;
		let body = response
			.dyn_ref::<ArrayBuffer>()
			.map(|buf| Bytes::from(js_sys::Uint8Array::new(buf).to_vec()))
			.unwrap_or_default();

		Ok(HttpResponse { status, body })
	}
}

impl Drop for InflightRequest {
	fn drop(&mut self) {
		self.xhr.set_onloadend(None);
		if self.xhr.ready_state() != XmlHttpRequest::DONE {
			self.xhr.abort().ok();
		}
	}
}

#[async_trait::async_trait(?Send)]
impl HttpClient for XhrClient {
	async fn get(&self, url: &Url, abort: &AbortHandle) -> Result<HttpResponse, FetchError> {
		let (tx, mut rx) = mpsc::channel(1);
		let request = InflightRequest::start(url, tx).map_err(js_error)?;

		tokio::select! {
			_ = abort.cancelled() => Err(FetchError::Aborted),
			_ = rx.recv() => request.response(),
		}
	}
}
