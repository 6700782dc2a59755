use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{HtmlVideoElement, MediaSource};

use super::fetch::XhrClient;
use super::media_source::MediaSourceSink;
use super::transmuxer::MuxJsTransmuxer;
use super::util::Holder;
use super::video::{forward_events, VideoSurface};
use crate::player::errors::PlayerError;
use crate::player::events::{EventType, ListenerId, PlayerEvent};
use crate::player::inner::Platform;
use crate::player::transmux::TransmuxerConfig;
use crate::player::{Player, PlayerSettings};

#[wasm_bindgen(start)]
pub fn main() {
	console_error_panic_hook::set_once();
}

#[wasm_bindgen(typescript_custom_section)]
const _: &'static str = r#"
type PlayerEvents = {
	init: () => void;
	manifestparsed: (evt: ManifestSummary) => void;
	firstsegmentloaded: (evt: SegmentEvent) => void;
	segmentloaded: (evt: SegmentEvent) => void;
	ready: () => void;
	statechanged: (evt: StateChange) => void;
	error: (evt: EventError) => void;
};

class Player {
	constructor(el: HTMLVideoElement, settings?: PlayerSettings);

	static isSupported(codecs?: string): boolean;

	setSource(src: string): Promise<void>;
	seekToTime(time: number, forceReload?: boolean): Promise<void>;
	play(): Promise<void>;
	pause(): Promise<void>;
	destroy(): void;

	on<K extends keyof PlayerEvents>(event: K, f: PlayerEvents[K]): void;
	once<K extends keyof PlayerEvents>(event: K, f: PlayerEvents[K]): void;
	off<K extends keyof PlayerEvents>(event: K, f: PlayerEvents[K]): void;

	readonly state: PlaybackState;
}
"#;

fn to_js(err: PlayerError) -> JsValue {
	JsValue::from_str(&err.to_string())
}

fn event_value(event: &PlayerEvent) -> Option<JsValue> {
	let value = match event {
		PlayerEvent::Init | PlayerEvent::Ready => return None,
		PlayerEvent::ManifestParsed(summary) => serde_wasm_bindgen::to_value(summary),
		PlayerEvent::FirstSegmentLoaded(segment) | PlayerEvent::SegmentLoaded(segment) => {
			serde_wasm_bindgen::to_value(segment)
		}
		PlayerEvent::StateChanged(change) => serde_wasm_bindgen::to_value(change),
		PlayerEvent::Error(error) => serde_wasm_bindgen::to_value(error),
	};

	match value {
		Ok(value) => Some(value),
		Err(err) => {
			tracing::error!("failed to serialize event: {err}");
			Some(JsValue::undefined())
		}
	}
}

#[wasm_bindgen(js_name = Player, skip_typescript)]
pub struct WasmPlayer {
	player: Player,
	listeners: RefCell<Vec<(EventType, js_sys::Function, ListenerId)>>,
	_events: Holder<HtmlVideoElement>,
}

#[wasm_bindgen(js_class = Player)]
impl WasmPlayer {
	#[wasm_bindgen(constructor)]
	pub fn new(element: HtmlVideoElement, settings: JsValue) -> Result<WasmPlayer, JsValue> {
		let settings: PlayerSettings = if settings.is_undefined() || settings.is_null() {
			PlayerSettings::default()
		} else {
			serde_wasm_bindgen::from_value(settings)?
		};

		if settings.debug {
			if let Err(err) = crate::logging::init("debug") {
				web_sys::console::warn_1(&format!("failed to install logger: {err}").into());
			}
		}

		let transmuxer = MuxJsTransmuxer::new(TransmuxerConfig::default())?;
		let platform = Platform::new(
			Rc::new(XhrClient),
			Rc::new(transmuxer),
			Rc::new(MediaSourceSink::new(element.clone())),
			Rc::new(VideoSurface::new(element.clone())),
		);

		let player = Player::new(settings, platform).map_err(to_js)?;
		let events = forward_events(element, &player);

		Ok(Self {
			player,
			listeners: RefCell::new(Vec::new()),
			_events: events,
		})
	}

	#[wasm_bindgen(js_name = isSupported)]
	pub fn is_supported(codecs: Option<String>) -> bool {
		let codecs = codecs.unwrap_or_else(|| PlayerSettings::default().codecs);
		MediaSource::is_type_supported(&codecs)
	}

	#[wasm_bindgen(js_name = setSource)]
	pub fn set_source(&self, src: String) -> js_sys::Promise {
		let player = self.player.clone();
		wasm_bindgen_futures::future_to_promise(async move {
			player.set_source(&src).await.map_err(to_js)?;
			Ok(JsValue::undefined())
		})
	}

	#[wasm_bindgen(js_name = seekToTime)]
	pub fn seek_to_time(&self, time: f64, force_reload: Option<bool>) -> js_sys::Promise {
		let player = self.player.clone();
		wasm_bindgen_futures::future_to_promise(async move {
			player
				.seek_to_time(time, force_reload.unwrap_or_default())
				.await
				.map_err(to_js)?;
			Ok(JsValue::undefined())
		})
	}

	pub fn play(&self) -> js_sys::Promise {
		let player = self.player.clone();
		wasm_bindgen_futures::future_to_promise(async move {
			player.play().await.map_err(to_js)?;
			Ok(JsValue::undefined())
		})
	}

	pub fn pause(&self) -> js_sys::Promise {
		let player = self.player.clone();
		wasm_bindgen_futures::future_to_promise(async move {
			player.pause().await.map_err(to_js)?;
			Ok(JsValue::undefined())
		})
	}

	pub fn destroy(&self) {
		self.player.destroy();
	}

	#[wasm_bindgen(getter)]
	pub fn state(&self) -> Result<JsValue, JsValue> {
		Ok(serde_wasm_bindgen::to_value(&self.player.state())?)
	}

	pub fn on(&self, event: &str, f: js_sys::Function) -> Result<(), JsValue> {
		self.add_listener(event, f, false)
	}

	pub fn once(&self, event: &str, f: js_sys::Function) -> Result<(), JsValue> {
		self.add_listener(event, f, true)
	}

	pub fn off(&self, event: &str, f: js_sys::Function) -> Result<(), JsValue> {
		let ty = parse_event(event)?;

		self.listeners.borrow_mut().retain(|(t, func, id)| {
			if *t == ty && JsValue::eq(func, &f) {
				self.player.off(ty, *id);
				false
			} else {
				true
			}
		});

		Ok(())
	}

	fn add_listener(&self, event: &str, f: js_sys::Function, once: bool) -> Result<(), JsValue> {
		let ty = parse_event(event)?;

		let callback = {
			let f = f.clone();
			move |event: &PlayerEvent| {
				let result = match event_value(event) {
					Some(value) => f.call1(&JsValue::undefined(), &value),
					None => f.call0(&JsValue::undefined()),
				};

				if let Err(err) = result {
					tracing::error!("event target raised exception: {:?}", err);
				}
			}
		};

		let id = if once {
			self.player.once(ty, callback)
		} else {
			self.player.on(ty, callback)
		};

		self.listeners.borrow_mut().push((ty, f, id));
		Ok(())
	}
}

fn parse_event(event: &str) -> Result<EventType, JsValue> {
	event
		.parse()
		.map_err(|_| JsValue::from_str(&format!("unknown event: {event}")))
}
