use std::cell::Cell;
use std::rc::Rc;

use bytes::Bytes;
use hls_player_types::{ErrorKind, StateField};

use super::{media_playlist, run_local, segment_url, settle, Harness, Route, SinkCall, SOURCE};
use crate::player::errors::PlayerError;
use crate::player::events::EventType;
use crate::player::PlayerSettings;

#[tokio::test(start_paused = true)]
async fn test_set_source_resets_state() {
	run_local(async {
		let harness = Harness::with_media(&[10.0, 10.0, 10.0], true);

		harness.player.set_source(SOURCE).await.unwrap();

		let changes = harness.state_changes();
		assert_eq!(changes[0].fields, StateField::ALL.to_vec());
		assert!(changes[0].state.paused);
		assert!(changes[0].state.seeking);
		assert_eq!(changes[0].state.total_duration, 0.0);

		assert_eq!(
			harness.sink.calls.borrow()[..2],
			[SinkCall::Open, SinkCall::AddBufferHandle(PlayerSettings::default().codecs)]
		);
		assert_eq!(harness.count(EventType::Init), 1);
		assert_eq!(harness.count(EventType::ManifestParsed), 1);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_format_is_fatal() {
	run_local(async {
		let harness = Harness::with_media(&[10.0], true);
		harness.sink.supported.set(false);

		let result = harness.player.set_source(SOURCE).await;

		assert!(matches!(result, Err(PlayerError::UnsupportedFormat(_))));
		assert!(harness.http.requests().is_empty());
		assert_eq!(harness.count(EventType::Init), 0);

		let errors = harness.errors();
		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0].kind, ErrorKind::UnsupportedFormat);
		assert!(errors[0].fatal);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_is_reported() {
	run_local(async {
		let harness = Harness::new(PlayerSettings::default());

		let result = harness.player.set_source("not a url").await;

		assert!(matches!(result, Err(PlayerError::Url(_))));

		let errors = harness.errors();
		assert_eq!(errors.len(), 1);
		assert!(errors[0].fatal);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_terminal_manifest_ends_stream() {
	run_local(async {
		let harness = Harness::with_media(&[], true);

		harness.player.set_source(SOURCE).await.unwrap();
		settle(500).await;

		assert_eq!(harness.sink.count(&SinkCall::EndOfStream), 1);
		assert_eq!(harness.http.requests(), vec![SOURCE.to_string()]);
		assert_eq!(harness.sink.count(&SinkCall::Abort), 0);
		assert_eq!(harness.count(EventType::Ready), 0);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_parse_error_reported_once() {
	run_local(async {
		let harness = Harness::new(PlayerSettings::default());
		harness.http.body(SOURCE, "<html>not found</html>");

		let result = harness.player.set_source(SOURCE).await;

		assert!(matches!(result, Err(PlayerError::ManifestParse(_))));

		let errors = harness.errors();
		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0].kind, ErrorKind::ManifestParse);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_master_without_renditions_is_used_as_media() {
	run_local(async {
		let harness = Harness::new(PlayerSettings::default());
		harness.http.route(
			SOURCE,
			Route::Sequence(
				["#EXTM3U\n#EXT-X-INDEPENDENT-SEGMENTS\n".to_string(), media_playlist(&[10.0, 10.0], true)]
					.into_iter()
					.map(Into::into)
					.collect(),
			),
		);
		harness.http.segments(2);

		harness.player.set_source(SOURCE).await.unwrap();
		assert_eq!(harness.player.state().total_duration, 0.0);
		assert_eq!(harness.sink.count(&SinkCall::EndOfStream), 0);

		settle(4000).await;

		assert_eq!(harness.loaded(), vec![0, 1]);
		assert_eq!(harness.player.state().total_duration, 20.0);
		assert_eq!(harness.sink.count(&SinkCall::EndOfStream), 1);
		assert_eq!(harness.count(EventType::ManifestParsed), 2);
		assert!(harness.errors().is_empty());
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_seek_without_source() {
	run_local(async {
		let harness = Harness::new(PlayerSettings::default());

		let result = harness.player.seek_to_time(10.0, false).await;

		assert_eq!(result, Err(PlayerError::NoSource));
		assert!(harness.errors().is_empty());
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_source_change_cancels_previous() {
	run_local(async {
		let harness = Harness::with_media(&[10.0, 10.0], true);
		harness.http.route(segment_url(0), Route::Hang);

		let other = "https://cdn.test/other/index.m3u8";
		harness.http.body(other, media_playlist(&[5.0, 5.0], true));
		harness.http.body("https://cdn.test/other/seg0.ts", "a0");
		harness.http.body("https://cdn.test/other/seg1.ts", "a1");

		harness.player.set_source(SOURCE).await.unwrap();
		settle(100).await;
		let epoch = harness.player.epoch();

		harness.player.set_source(other).await.unwrap();
		settle(500).await;

		assert!(harness.player.epoch() > epoch);
		assert_eq!(harness.loaded(), vec![0, 1]);
		assert_eq!(harness.player.state().total_duration, 10.0);
		assert_eq!(harness.http.count(&segment_url(1)), 0);
		assert_eq!(harness.count(EventType::Init), 2);
		assert!(harness.errors().is_empty());
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_source_change_drops_cached_bytes() {
	run_local(async {
		let harness = Harness::with_media(&[10.0; 20], true);

		let other = "https://cdn.test/other/index.m3u8";
		harness.http.body(other, media_playlist(&[10.0; 20], true));
		for idx in 0..20 {
			harness.http.body(format!("https://cdn.test/other/seg{idx}.ts"), format!("other{idx}"));
		}

		harness.player.set_source(SOURCE).await.unwrap();
		settle(500).await;
		assert_eq!(harness.loaded().len(), 16);

		harness.transmuxer.inputs.borrow_mut().clear();
		harness.player.set_source(other).await.unwrap();
		settle(500).await;

		assert_eq!(harness.loaded(), (0..16).collect::<Vec<_>>());
		assert_eq!(harness.http.count("https://cdn.test/other/seg15.ts"), 1);
		assert_eq!(
			*harness.transmuxer.inputs.borrow(),
			(0..16).map(|idx| Bytes::from(format!("other{idx}"))).collect::<Vec<_>>()
		);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_destroy_stops_work() {
	run_local(async {
		let harness = Harness::with_media(&[10.0; 5], true);

		harness.player.set_source(SOURCE).await.unwrap();
		harness.player.destroy();
		settle(10_000).await;

		assert!(harness.player.is_destroyed());
		assert!((0..5).all(|idx| harness.http.count(&segment_url(idx)) == 0));
		assert_eq!(harness.sink.count(&SinkCall::Abort), 2);

		let result = harness.player.seek_to_time(5.0, false).await;
		assert_eq!(result, Err(PlayerError::Cancelled));
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_play_and_pause() {
	run_local(async {
		let harness = Harness::new(PlayerSettings::default());
		harness.surface.reject_play.set(true);

		let result = harness.player.play().await;
		assert!(matches!(result, Err(PlayerError::Playback(_))));
		assert!(harness.player.state().paused);

		harness.surface.reject_play.set(false);
		harness.player.play().await.unwrap();
		harness.player.play().await.unwrap();
		assert!(!harness.player.state().paused);
		assert_eq!(harness.notified(StateField::Paused), 1);

		harness.player.pause().await.unwrap();
		assert!(harness.player.state().paused);
		assert_eq!(harness.notified(StateField::Paused), 2);
	})
	.await;
}

#[tokio::test(start_paused = true)]
async fn test_once_and_off_listeners() {
	run_local(async {
		let harness = Harness::with_media(&[10.0, 10.0], true);

		let once = Rc::new(Cell::new(0));
		let always = Rc::new(Cell::new(0));
		let removed = Rc::new(Cell::new(0));

		{
			let once = once.clone();
			harness.player.once(EventType::SegmentLoaded, move |_| once.set(once.get() + 1));
		}
		{
			let always = always.clone();
			harness.player.on(EventType::SegmentLoaded, move |_| always.set(always.get() + 1));
		}
		let id = {
			let removed = removed.clone();
			harness.player.on(EventType::SegmentLoaded, move |_| removed.set(removed.get() + 1))
		};
		harness.player.off(EventType::SegmentLoaded, id);

		harness.player.set_source(SOURCE).await.unwrap();
		settle(500).await;

		assert_eq!(once.get(), 1);
		assert_eq!(always.get(), 2);
		assert_eq!(removed.get(), 0);
	})
	.await;
}

#[test]
fn test_event_type_names() {
	assert_eq!("segmentloaded".parse::<EventType>(), Ok(EventType::SegmentLoaded));
	assert_eq!("statechanged".parse::<EventType>(), Ok(EventType::StateChanged));
	assert_eq!("error".parse::<EventType>(), Ok(EventType::Error));
	assert!("bogus".parse::<EventType>().is_err());
}
