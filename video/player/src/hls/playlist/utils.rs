use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
	ExtM3u,
	ExtXVersion(u8),
	ExtXIndependentSegments,
	ExtXStart(HashMap<String, String>),
	ExtXTargetDuration(u32),
	ExtXMediaSequence(u32),
	ExtXDiscontinuitySequence(u32),
	ExtXEndList,
	ExtXPlaylistType(PlaylistType),
	ExtInf(f64, String),
	ExtXByteRange(u32, Option<u32>),
	ExtXDiscontinuity,
	ExtXKey(HashMap<String, String>),
	ExtXMap(HashMap<String, String>),
	ExtXProgramDateTime(String),
	ExtXMedia(HashMap<String, String>),
	ExtXStreamInf(HashMap<String, String>, String),
	Unknown(String),
}

impl Tag {
	pub fn is_master_tag(&self) -> bool {
		matches!(
			self,
			Tag::ExtM3u
				| Tag::ExtXVersion(_)
				| Tag::ExtXIndependentSegments
				| Tag::ExtXStart(_)
				| Tag::ExtXMedia(_)
				| Tag::ExtXStreamInf(_, _)
				| Tag::Unknown(_)
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PlaylistType {
	Event,
	Vod,
}

pub fn parse_tags(input: &str) -> Result<Vec<Tag>, String> {
	let mut lines = input.lines().map(str::trim).filter(|l| !l.is_empty());

	let mut tags = Vec::new();
	while let Some(tag) = parse_tag(&mut lines)? {
		tags.push(tag);
	}

	Ok(tags)
}

fn parse_attributes(line: &str) -> Result<HashMap<String, String>, String> {
	let mut attributes = HashMap::new();

	let mut key = None;
	let mut value = String::new();

	let mut chars = line.chars();
	while let Some(c) = chars.next() {
		match c {
			'=' if key.is_none() => {
				key = Some(value);
				value = String::new();
			}
			',' => {
				let Some(key) = key.take() else { continue };

				attributes.insert(key, value);
				value = String::new();
			}
			'"' => {
				let mut quoted = String::new();

				while let Some(c) = chars.next() {
					match c {
						'"' => break,
						'\\' => match chars.next().ok_or("unterminated escape in attribute")? {
							'"' => quoted.push('"'),
							'\\' => quoted.push('\\'),
							'n' => quoted.push('\n'),
							'r' => quoted.push('\r'),
							't' => quoted.push('\t'),
							c => return Err(format!("invalid escape in attribute: \\{c}")),
						},
						_ => quoted.push(c),
					}
				}

				let key = key.take().ok_or("quoted attribute value without a key")?;
				attributes.insert(key, quoted);
			}
			c => {
				value.push(c);
			}
		}
	}

	if let Some(key) = key.take() {
		attributes.insert(key, value);
	}

	Ok(attributes)
}

fn parse_number<T: std::str::FromStr>(line: &str, prefix: &str, what: &str) -> Result<T, String> {
	line.strip_prefix(prefix)
		.ok_or_else(|| format!("invalid {what}"))?
		.trim()
		.parse()
		.map_err(|_| format!("invalid {what}"))
}

fn parse_tag<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<Option<Tag>, String> {
	let line = match lines.next() {
		Some(line) => line,
		None => return Ok(None),
	};

	match line {
		"#EXTM3U" => Ok(Some(Tag::ExtM3u)),
		line if line.starts_with("#EXT-X-VERSION:") => Ok(Some(Tag::ExtXVersion(parse_number(
			line,
			"#EXT-X-VERSION:",
			"version",
		)?))),
		_ if line.starts_with("#EXT-X-INDEPENDENT-SEGMENTS") => Ok(Some(Tag::ExtXIndependentSegments)),
		line if line.starts_with("#EXT-X-START:") => {
			let attributes = parse_attributes(line.strip_prefix("#EXT-X-START:").ok_or("invalid start")?)?;

			Ok(Some(Tag::ExtXStart(attributes)))
		}
		line if line.starts_with("#EXT-X-TARGETDURATION:") => {
			// Some packagers write fractional target durations, round up like players do.
			let duration: f64 = parse_number(line, "#EXT-X-TARGETDURATION:", "target duration")?;

			Ok(Some(Tag::ExtXTargetDuration(duration.ceil() as u32)))
		}
		line if line.starts_with("#EXT-X-MEDIA-SEQUENCE:") => Ok(Some(Tag::ExtXMediaSequence(parse_number(
			line,
			"#EXT-X-MEDIA-SEQUENCE:",
			"media sequence",
		)?))),
		line if line.starts_with("#EXT-X-DISCONTINUITY-SEQUENCE:") => Ok(Some(Tag::ExtXDiscontinuitySequence(
			parse_number(line, "#EXT-X-DISCONTINUITY-SEQUENCE:", "discontinuity sequence")?,
		))),
		_ if line.starts_with("#EXT-X-ENDLIST") => Ok(Some(Tag::ExtXEndList)),
		line if line.starts_with("#EXT-X-PLAYLIST-TYPE:") => {
			let playlist_type = match line
				.strip_prefix("#EXT-X-PLAYLIST-TYPE:")
				.ok_or("invalid playlist type")?
				.trim()
				.to_uppercase()
				.as_str()
			{
				"EVENT" => PlaylistType::Event,
				"VOD" => PlaylistType::Vod,
				_ => return Err("invalid playlist type".to_string()),
			};

			Ok(Some(Tag::ExtXPlaylistType(playlist_type)))
		}
		line if line.starts_with("#EXTINF:") => {
			let duration = line
				.strip_prefix("#EXTINF:")
				.ok_or("invalid duration")?
				.split(',')
				.next()
				.ok_or("invalid duration")?
				.trim()
				.parse::<f64>()
				.map_err(|_| "invalid duration")?;

			if !duration.is_finite() || duration < 0.0 {
				return Err(format!("invalid duration: {duration}"));
			}

			// Skip any per-segment tags that sit between #EXTINF and its uri.
			let uri = lines
				.find(|l| !l.starts_with('#'))
				.ok_or("segment is missing a uri")?;

			Ok(Some(Tag::ExtInf(duration, uri.into())))
		}
		line if line.starts_with("#EXT-X-BYTERANGE:") => {
			let mut splits = line.strip_prefix("#EXT-X-BYTERANGE:").ok_or("invalid byterange")?.split('@');

			let length = splits
				.next()
				.ok_or("invalid byterange")?
				.parse()
				.map_err(|_| "invalid byterange")?;

			let offset = match splits.next().map(|s| s.parse().map_err(|_| "invalid byterange")) {
				Some(Ok(offset)) => Some(offset),
				Some(Err(err)) => return Err(err.into()),
				None => None,
			};

			Ok(Some(Tag::ExtXByteRange(length, offset)))
		}
		_ if line.starts_with("#EXT-X-DISCONTINUITY") => Ok(Some(Tag::ExtXDiscontinuity)),
		line if line.starts_with("#EXT-X-KEY:") => {
			let attributes = parse_attributes(line.strip_prefix("#EXT-X-KEY:").ok_or("invalid key")?)?;

			Ok(Some(Tag::ExtXKey(attributes)))
		}
		line if line.starts_with("#EXT-X-MAP:") => {
			let attributes = parse_attributes(line.strip_prefix("#EXT-X-MAP:").ok_or("invalid map")?)?;

			Ok(Some(Tag::ExtXMap(attributes)))
		}
		line if line.starts_with("#EXT-X-PROGRAM-DATE-TIME:") => {
			let date_time = line
				.strip_prefix("#EXT-X-PROGRAM-DATE-TIME:")
				.ok_or("invalid program date time")?;

			Ok(Some(Tag::ExtXProgramDateTime(date_time.into())))
		}
		line if line.starts_with("#EXT-X-MEDIA:") => {
			let attributes = parse_attributes(line.strip_prefix("#EXT-X-MEDIA:").ok_or("invalid media")?)?;

			Ok(Some(Tag::ExtXMedia(attributes)))
		}
		line if line.starts_with("#EXT-X-STREAM-INF:") => {
			let attributes = parse_attributes(line.strip_prefix("#EXT-X-STREAM-INF:").ok_or("invalid stream inf")?)?;

			let uri = lines.find(|l| !l.starts_with('#')).ok_or("stream inf is missing a uri")?;

			Ok(Some(Tag::ExtXStreamInf(attributes, uri.into())))
		}
		line => Ok(Some(Tag::Unknown(line.into()))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn attributes_with_quoted_commas() {
		let attributes = parse_attributes(r#"BANDWIDTH=1280000,CODECS="avc1.42e01e,mp4a.40.2",RESOLUTION=640x360"#).unwrap();

		assert_eq!(attributes.get("BANDWIDTH").map(String::as_str), Some("1280000"));
		assert_eq!(attributes.get("CODECS").map(String::as_str), Some("avc1.42e01e,mp4a.40.2"));
		assert_eq!(attributes.get("RESOLUTION").map(String::as_str), Some("640x360"));
	}

	#[test]
	fn extinf_skips_interleaved_tags() {
		let tags = parse_tags("#EXTM3U\n#EXTINF:4.5,title\n#EXT-X-PROGRAM-DATE-TIME:2020\nseg0.ts\n").unwrap();

		assert_eq!(tags, vec![Tag::ExtM3u, Tag::ExtInf(4.5, "seg0.ts".into())]);
	}

	#[test]
	fn rejects_negative_duration() {
		assert!(parse_tags("#EXTM3U\n#EXTINF:-1,\nseg0.ts\n").is_err());
	}
}
