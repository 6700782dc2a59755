use serde::Serialize;

use super::utils::{PlaylistType, Tag};

#[derive(Debug, Clone, Serialize)]
pub struct MediaPlaylist {
	pub version: u8,
	pub target_duration: u32,
	pub media_sequence: u32,
	pub discontinuity_sequence: u32,
	pub playlist_type: Option<PlaylistType>,
	pub end_list: bool,
	pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
	pub discontinuity: bool,
	pub map: Option<String>,
	pub sn: u32,
	pub duration: f64,
	pub url: String,
	pub program_date_time: Option<String>,
	pub encrypted: bool,
}

impl MediaPlaylist {
	pub fn from_tags(tags: Vec<Tag>) -> Result<Self, String> {
		let version = tags
			.iter()
			.find_map(|t| match t {
				Tag::ExtXVersion(v) => Some(*v),
				_ => None,
			})
			.unwrap_or(1);

		let target_duration = tags
			.iter()
			.find_map(|t| match t {
				Tag::ExtXTargetDuration(d) => Some(*d),
				_ => None,
			})
			.ok_or("no #EXT-X-TARGETDURATION tag found")?;

		let media_sequence = tags
			.iter()
			.find_map(|t| match t {
				Tag::ExtXMediaSequence(s) => Some(*s),
				_ => None,
			})
			.unwrap_or_default();

		let discontinuity_sequence = tags
			.iter()
			.find_map(|t| match t {
				Tag::ExtXDiscontinuitySequence(s) => Some(*s),
				_ => None,
			})
			.unwrap_or_default();

		let playlist_type = tags.iter().find_map(|t| match t {
			Tag::ExtXPlaylistType(t) => Some(*t),
			_ => None,
		});

		let end_list = tags.iter().any(|t| t == &Tag::ExtXEndList);

		let mut map = None;
		let mut sn = media_sequence;
		let mut segments = Vec::new();
		let mut program_date_time = None;
		let mut discontinuity = false;
		let mut encrypted = false;

		for tag in tags.iter() {
			match tag {
				Tag::ExtXProgramDateTime(d) => {
					program_date_time = Some(d.clone());
				}
				Tag::ExtXMap(attributes) => {
					let uri = attributes.get("URI").ok_or("no URI attribute found")?;
					map = Some(uri.clone());
				}
				Tag::ExtXKey(attributes) => {
					encrypted = attributes.get("METHOD").is_some_and(|m| m != "NONE");
				}
				Tag::ExtXDiscontinuity => {
					discontinuity = true;
				}
				Tag::ExtInf(duration, url) => {
					segments.push(Segment {
						discontinuity,
						map: map.clone(),
						sn,
						duration: *duration,
						url: url.clone(),
						program_date_time: program_date_time.take(),
						encrypted,
					});

					discontinuity = false;
					sn = sn.wrapping_add(1);
				}
				_ => {}
			}
		}

		Ok(Self {
			version,
			target_duration,
			media_sequence,
			discontinuity_sequence,
			playlist_type,
			end_list,
			segments,
		})
	}
}
