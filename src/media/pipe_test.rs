// ============================================================================
// Pipeline Tests
// ============================================================================

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use super::{Pipe, PipeStats};
use crate::{
    buffer::InputBuffer,
    caps::Caps,
    config::{FrameType, SerializerConfig},
    emitter::Envelope,
    media::{
        output::decode_dump,
        types::{BufferSource, InputConfig, OutputDest, PipeConfig, SourceItem},
    },
};

fn h264() -> Caps {
    Caps::new("video/x-h264")
        .with_size(320, 240)
        .with_framerate(10, 1)
}

fn buffer(pts: u64) -> SourceItem {
    SourceItem::Buffer(InputBuffer::new(vec![0u8, 0, 1], Some(pts)))
}

fn two_files() -> Box<dyn BufferSource> {
    Box::new(
        vec![
            SourceItem::caps(h264()),
            SourceItem::location("a.mp4"),
            buffer(0),
            buffer(100),
            SourceItem::location("b.mp4"),
            buffer(200),
            SourceItem::eos(),
        ]
        .into_iter(),
    )
}

fn kinds(envelopes: &[Envelope]) -> Vec<&'static str> {
    envelopes
        .iter()
        .map(|e| e.decode().unwrap().kind())
        .collect()
}

/// Produces buffers forever.
struct Endless(u64);

impl BufferSource for Endless {
    fn next_item(&mut self) -> anyhow::Result<Option<SourceItem>> {
        self.0 += 1;
        if self.0 == 1 {
            return Ok(Some(SourceItem::caps(h264())));
        }
        Ok(Some(buffer(self.0)))
    }
}

// ------------------------------------------------------------------------
// PipeConfigBuilder Tests
// ------------------------------------------------------------------------

#[test]
fn test_builder_inputs_and_output() {
    let config = PipeConfig::builder()
        .input_file("a.mp4")
        .input_file("b.mp4")
        .loops(2)
        .dump_output("out.dump")
        .serializer(SerializerConfig::with_source_id("cam"))
        .build()
        .unwrap();

    assert_eq!(
        config.inputs,
        vec![
            InputConfig::File {
                path: "a.mp4".into()
            },
            InputConfig::File {
                path: "b.mp4".into()
            }
        ]
    );
    assert_eq!(config.input_paths().len(), 2);
    assert_eq!(config.loops, 2);
    assert_eq!(config.channel_capacity, PipeConfig::DEFAULT_CHANNEL_CAPACITY);
    match &config.output {
        OutputDest::Dump { path } => assert_eq!(path.to_str(), Some("out.dump")),
        _ => panic!("Expected Dump output"),
    }
}

#[test]
fn test_builder_defaults_to_log_output() {
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .build()
        .unwrap();
    assert!(matches!(config.output, OutputDest::Log));
    assert!(config.inputs.is_empty());
}

#[test]
fn test_builder_rejects_invalid_config() {
    assert!(PipeConfig::builder().build().is_err());

    let invalid = SerializerConfig {
        framerate: "0/0".to_string(),
        ..SerializerConfig::with_source_id("cam")
    };
    assert!(PipeConfig::builder().serializer(invalid).build().is_err());

    assert!(PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .channel_capacity(0)
        .build()
        .is_err());
}

// ------------------------------------------------------------------------
// Pipe Tests
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_pipe_channel_output() {
    let (sender, mut receiver) = mpsc::channel(64);
    let config = PipeConfig::builder()
        .serializer(SerializerConfig {
            shutdown_auth: Some("token".to_string()),
            ..SerializerConfig::with_source_id("cam")
        })
        .channel_output(sender)
        .channel_capacity(1)
        .build()
        .unwrap();
    let pipe = Pipe::new(config);

    let stats = pipe.start(two_files()).await.unwrap();
    assert_eq!(
        stats,
        PipeStats {
            events: 4,
            buffers: 3,
            rejected: 0,
            envelopes: 6,
        }
    );
    assert!(!pipe.is_started());

    let mut envelopes = Vec::new();
    while let Ok(envelope) = receiver.try_recv() {
        envelopes.push(envelope);
    }
    assert_eq!(
        kinds(&envelopes),
        [
            "VideoFrame",
            "VideoFrame",
            "EndOfStream",
            "VideoFrame",
            "EndOfStream",
            "Shutdown"
        ]
    );
    assert_eq!(envelopes[0].pts, Some(0));
    assert_eq!(envelopes[3].pts, Some(200));
    assert_eq!(envelopes[0].segments.len(), 3);
}

#[tokio::test]
async fn test_pipe_dump_output_multistream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dump");
    let config = PipeConfig::builder()
        .serializer(SerializerConfig {
            enable_multistream: true,
            number_of_streams: 2,
            frame_type: FrameType::Embedded,
            ..Default::default()
        })
        .dump_output(&path)
        .build()
        .unwrap();

    let stats = Pipe::new(config).start(two_files()).await.unwrap();
    assert_eq!(stats.envelopes, 10);

    let envelopes = decode_dump(std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(envelopes.len(), 10);
    let topics: Vec<_> = envelopes.iter().map(|e| e.topic().to_vec()).collect();
    assert_eq!(topics[0], b"source-0/");
    assert_eq!(topics[1], b"source-1/");
    assert!(envelopes.iter().all(|e| e.segments.len() == 2));
}

#[tokio::test]
async fn test_pipe_rejected_buffers_continue() {
    let (sender, mut receiver) = mpsc::channel(64);
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .channel_output(sender)
        .build()
        .unwrap();

    // buffer before caps is rejected, the rest flows
    let source = vec![buffer(0), SourceItem::caps(h264()), buffer(1), SourceItem::eos()];
    let stats = Pipe::new(config)
        .start(Box::new(source.into_iter()))
        .await
        .unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.envelopes, 2);
    assert_eq!(receiver.recv().await.unwrap().decode().unwrap().kind(), "VideoFrame");
}

#[tokio::test]
async fn test_pipe_negotiation_failure() {
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .build()
        .unwrap();
    let source = vec![
        SourceItem::caps(Caps::new("video/x-theora").with_size(1, 1)),
        buffer(0),
    ];
    let err = Pipe::new(config)
        .start(Box::new(source.into_iter()))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("negotiation"));
}

#[tokio::test]
async fn test_pipe_start_fails_on_configuration() {
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::default())
        .build()
        .unwrap();
    let pipe = Pipe::new(config);
    let err = pipe.start(two_files()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("source ID is required"));
    assert!(!pipe.is_started());
}

#[tokio::test]
async fn test_pipe_cancel() {
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .channel_capacity(4)
        .build()
        .unwrap();
    let pipe = Arc::new(Pipe::new(config));

    let handle = {
        let pipe = Arc::clone(&pipe);
        tokio::spawn(async move { pipe.start(Box::new(Endless(0))).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(pipe.is_started());
    pipe.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pipe did not stop")
        .unwrap()
        .unwrap();
    assert!(pipe.is_cancelled());
    assert!(!pipe.is_started());
    assert!(stats.buffers > 0);
}

#[tokio::test]
async fn test_pipe_cancel_with_stalled_channel_output() {
    // the receiver is never drained
    let (sender, _receiver) = mpsc::channel(1);
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .channel_output(sender)
        .channel_capacity(1)
        .build()
        .unwrap();
    let pipe = Arc::new(Pipe::new(config));

    let handle = {
        let pipe = Arc::clone(&pipe);
        tokio::spawn(async move { pipe.start(Box::new(Endless(0))).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    pipe.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pipe did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.envelopes, 1);
    assert!(!pipe.is_started());
}

#[tokio::test]
async fn test_pipe_already_started() {
    let config = PipeConfig::builder()
        .serializer(SerializerConfig::with_source_id("cam"))
        .build()
        .unwrap();
    let pipe = Arc::new(Pipe::new(config));

    let handle = {
        let pipe = Arc::clone(&pipe);
        tokio::spawn(async move { pipe.start(Box::new(Endless(0))).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = pipe.start(two_files()).await.unwrap_err();
    assert!(err.to_string().contains("already started"));

    pipe.cancel();
    handle.await.unwrap().unwrap();
}
