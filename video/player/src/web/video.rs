use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlVideoElement;

use super::util::{register_events, Holder};
use crate::player::surface::{PlaybackSurface, SurfaceEvent};
use crate::player::Player;

/// [`PlaybackSurface`] backed by an `HTMLVideoElement`.
pub struct VideoSurface {
	element: HtmlVideoElement,
}

impl VideoSurface {
	pub fn new(element: HtmlVideoElement) -> Self {
		Self { element }
	}
}

#[async_trait::async_trait(?Send)]
impl PlaybackSurface for VideoSurface {
	fn current_time(&self) -> f64 {
		self.element.current_time()
	}

	fn set_current_time(&self, seconds: f64) {
		self.element.set_current_time(seconds);
	}

	fn volume(&self) -> f64 {
		self.element.volume()
	}

	fn muted(&self) -> bool {
		self.element.muted()
	}

	fn set_muted(&self, muted: bool) {
		self.element.set_muted(muted);
	}

	fn set_autoplay(&self, autoplay: bool) {
		self.element.set_autoplay(autoplay);
	}

	fn set_controls(&self, controls: bool) {
		self.element.set_controls(controls);
	}

	async fn play(&self) -> Result<(), String> {
		let promise = self.element.play().map_err(|err| format!("{err:?}"))?;
		JsFuture::from(promise).await.map_err(|err| format!("{err:?}"))?;
		Ok(())
	}

	async fn pause(&self) -> Result<(), String> {
		self.element.pause().map_err(|err| format!("{err:?}"))
	}
}

/// Forwards `timeupdate` and `volumechange` from `element` to `player`.
pub fn forward_events(element: HtmlVideoElement, player: &Player) -> Holder<HtmlVideoElement> {
	let cleanup = register_events!(element, {
		"timeupdate" => {
			let player = player.clone();
			move |_| player.handle_surface_event(SurfaceEvent::TimeUpdate)
		},
		"volumechange" => {
			let player = player.clone();
			move |_| player.handle_surface_event(SurfaceEvent::VolumeChange)
		},
	});

	Holder::new(element, cleanup)
}
