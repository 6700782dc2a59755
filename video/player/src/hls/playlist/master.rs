use serde::Serialize;

use super::utils::Tag;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MasterPlaylist {
	pub independent_segments: bool,
	pub streams: Vec<Stream>,
}

/// A rendition declared with `#EXT-X-STREAM-INF`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stream {
	pub uri: String,
	pub bandwidth: u32,
	pub codecs: Option<String>,
	pub resolution: Option<(u32, u32)>,
	pub frame_rate: Option<f64>,
	pub audio: Option<String>,
}

impl MasterPlaylist {
	pub fn from_tags(tags: Vec<Tag>) -> Result<Self, String> {
		let streams = tags
			.iter()
			.filter_map(|t| match t {
				Tag::ExtXStreamInf(attributes, uri) => Some(Stream {
					uri: uri.clone(),
					bandwidth: attributes.get("BANDWIDTH").and_then(|s| s.parse().ok()).unwrap_or(0),
					codecs: attributes.get("CODECS").cloned(),
					audio: attributes.get("AUDIO").cloned(),
					resolution: attributes.get("RESOLUTION").and_then(|s| {
						let (width, height) = s.split_once('x')?;
						let width = width.parse().ok()?;
						let height = height.parse().ok()?;
						if width == 0 || height == 0 {
							None
						} else {
							Some((width, height))
						}
					}),
					frame_rate: attributes.get("FRAME-RATE").and_then(|s| s.parse().ok()),
				}),
				_ => None,
			})
			.collect::<Vec<_>>();

		if streams.iter().any(|s| s.uri.is_empty()) {
			return Err("stream inf with an empty uri".into());
		}

		Ok(Self {
			independent_segments: tags.iter().any(|t| t == &Tag::ExtXIndependentSegments),
			streams,
		})
	}
}
