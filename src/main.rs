use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use stream_serializer::{
    config::FrameType,
    media::{demux, demux::FileDemuxer, playlist::Playlist},
    Pipe, PipeConfig, SerializerConfig,
};

/// Plays media files through the serializer and writes the envelopes out.
#[derive(Debug, Parser)]
#[command(name = "stream-serializer", version)]
struct Cli {
    /// Media files, played in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON file with element options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra passes over the playlist
    #[arg(long, default_value_t = 0)]
    loops: usize,

    /// Dump file for the envelopes; envelopes are logged when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    source_id: Option<String>,

    #[arg(long)]
    frame_type: Option<FrameType>,

    #[arg(long)]
    framerate: Option<String>,

    #[arg(long)]
    read_metadata: bool,

    #[arg(long)]
    eos_on_loop_end: bool,

    /// Fan out to this many logical sources
    #[arg(long)]
    number_of_streams: Option<usize>,

    #[arg(long)]
    source_id_pattern: Option<String>,

    #[arg(long)]
    shutdown_auth: Option<String>,

    /// Capacity of the element to output channel
    #[arg(long)]
    channel_capacity: Option<usize>,
}

impl Cli {
    fn serializer_config(&self) -> anyhow::Result<SerializerConfig> {
        let mut config = match &self.config {
            Some(path) => SerializerConfig::from_file(path)?,
            None => SerializerConfig::default(),
        };
        if let Some(source_id) = &self.source_id {
            config.source_id = Some(source_id.clone());
        }
        if let Some(frame_type) = &self.frame_type {
            config.frame_type = frame_type.clone();
        }
        if let Some(framerate) = &self.framerate {
            config.framerate = framerate.clone();
        }
        if let Some(count) = self.number_of_streams {
            config.enable_multistream = true;
            config.number_of_streams = count;
        }
        if let Some(pattern) = &self.source_id_pattern {
            config.source_id_pattern = Some(pattern.clone());
        }
        if self.shutdown_auth.is_some() {
            config.shutdown_auth = self.shutdown_auth.clone();
        }
        config.read_metadata |= self.read_metadata;
        config.eos_on_loop_end |= self.eos_on_loop_end;
        Ok(config)
    }

    fn pipe_config(&self) -> anyhow::Result<PipeConfig> {
        let mut builder = PipeConfig::builder()
            .loops(self.loops)
            .serializer(self.serializer_config()?);
        for input in &self.inputs {
            builder = builder.input_file(input);
        }
        if let Some(output) = &self.output {
            builder = builder.dump_output(output);
        }
        if let Some(capacity) = self.channel_capacity {
            builder = builder.channel_capacity(capacity);
        }
        builder.build()
    }
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("stream_serializer", log::LevelFilter::Debug)
        .filter_module("frame_message", log::LevelFilter::Info)
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    demux::init()?;

    let config = cli.pipe_config()?;
    let playlist = Playlist::new(
        config.input_paths(),
        config.loops,
        Box::new(FileDemuxer::open_reader),
    );
    let pipe = Arc::new(Pipe::new(config));

    let mut handle = {
        let pipe = Arc::clone(&pipe);
        tokio::spawn(async move { pipe.start(Box::new(playlist)).await })
    };

    let result = loop {
        tokio::select! {
            result = &mut handle => break result?,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping pipeline");
                pipe.cancel();
            },
        }
    };

    let stats = result?;
    log::info!(
        "Done: {} buffers ({} rejected), {} envelopes",
        stats.buffers,
        stats.rejected,
        stats.envelopes
    );
    Ok(())
}
