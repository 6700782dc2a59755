#[cfg(not(target_arch = "wasm32"))]
pub use self::native::init;
#[cfg(target_arch = "wasm32")]
pub use self::wasm::init;

#[cfg(not(target_arch = "wasm32"))]
mod native {
	use std::str::FromStr;

	use anyhow::Result;
	use tracing_subscriber::prelude::*;
	use tracing_subscriber::EnvFilter;

	/// Installs a global fmt subscriber filtered by `level` (any `EnvFilter` directive).
	pub fn init(level: &str) -> Result<()> {
		let env_filter = EnvFilter::from_str(level)?;

		tracing_subscriber::fmt()
			.with_line_number(true)
			.with_file(true)
			.with_env_filter(env_filter)
			.finish()
			.try_init()?;

		Ok(())
	}
}

#[cfg(target_arch = "wasm32")]
mod wasm {
	use std::fmt::{self, Write};
	use std::str::FromStr;

	use anyhow::Result;
	use tracing::field::{Field, Visit};
	use tracing::Subscriber;
	use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
	use tracing_subscriber::registry::{LookupSpan, Registry};
	use web_sys::console;

	/// Writes events to the browser console, colored by level.
	pub struct ConsoleLayer {
		max_level: tracing::Level,
	}

	impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for ConsoleLayer {
		fn enabled(&self, metadata: &tracing::Metadata<'_>, _: Context<'_, S>) -> bool {
			metadata.level() <= &self.max_level
		}

		fn on_event(&self, event: &tracing::Event<'_>, _: Context<'_, S>) {
			let mut recorder = StringRecorder::default();
			event.record(&mut recorder);

			let meta = event.metadata();
			let level = meta.level();
			let origin = meta
				.file()
				.and_then(|file| meta.line().map(|ln| format!("{file}:{ln}")))
				.unwrap_or_default();

			let console_fn = match *level {
				tracing::Level::TRACE | tracing::Level::DEBUG => console::debug_4,
				tracing::Level::INFO => console::info_4,
				tracing::Level::WARN => console::warn_4,
				tracing::Level::ERROR => console::error_4,
			};

			let color = match *level {
				tracing::Level::TRACE => "color: dodgerblue; background: #444",
				tracing::Level::DEBUG => "color: lawngreen; background: #444",
				tracing::Level::INFO => "color: whitesmoke; background: #444",
				tracing::Level::WARN => "color: orange; background: #444",
				tracing::Level::ERROR => "color: red; background: #444",
			};

			console_fn(
				&format!("%c{level}%c {origin}%c{recorder}").into(),
				&color.into(),
				&"color: gray; font-style: italic".into(),
				&"color: inherit".into(),
			);
		}
	}

	#[derive(Default)]
	struct StringRecorder {
		display: String,
		is_following_args: bool,
	}

	impl Visit for StringRecorder {
		fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
			if field.name() == "message" {
				if self.display.is_empty() {
					self.display = format!("{value:?}");
				} else {
					self.display = format!("{value:?}\n{}", self.display);
				}
			} else {
				let sep = if self.is_following_args { "\n" } else { " " };
				self.is_following_args = true;
				let _ = write!(self.display, "{sep}{} = {value:?};", field.name());
			}
		}
	}

	impl fmt::Display for StringRecorder {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			if self.display.is_empty() {
				Ok(())
			} else {
				write!(f, " {}", self.display)
			}
		}
	}

	/// Installs the console layer as the global subscriber. `level` is a plain level
	/// name such as `debug`.
	pub fn init(level: &str) -> Result<()> {
		let max_level = tracing::Level::from_str(level)?;
		tracing::subscriber::set_global_default(Registry::default().with(ConsoleLayer { max_level }))?;
		Ok(())
	}
}
