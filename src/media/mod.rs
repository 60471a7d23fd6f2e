//! Host side of the serializer: feeds the element from media files and
//! carries its envelopes to an output.
//!
//! Data Flow:
//! ```text
//! Playlist (demux) ──► SourceItem ──► [Serializer on blocking worker]
//!                                              │
//!                                        ChannelSink
//!                                              │
//!                                    EnvelopeSinkSource ──► EnvelopeOutput (dump / log / channel)
//! ```

#[cfg(feature = "ffmpeg")]
pub mod demux;
pub mod output;
pub mod pipe;
pub mod playlist;
pub mod stream;
pub mod types;
