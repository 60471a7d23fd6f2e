//! Plays a list of media files, optionally looped, as one serialized stream.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    caps::Caps,
    media::types::{BufferSource, MediaReader, SourceItem},
};

/// Opens one media file.
pub type OpenReader = Box<dyn FnMut(&Path) -> anyhow::Result<Box<dyn MediaReader>> + Send>;

/// Emits, per opened file, caps (when they differ from the previous file)
/// and a location tag, then the file's buffers. Ends with an end-of-stream
/// after the last pass.
pub struct Playlist {
    paths: Vec<PathBuf>,
    loops: usize,
    open: OpenReader,
    pass: usize,
    next_index: usize,
    current: Option<Box<dyn MediaReader>>,
    last_caps: Option<Caps>,
    pending: VecDeque<SourceItem>,
    finished: bool,
}

impl Playlist {
    pub fn new(paths: Vec<PathBuf>, loops: usize, open: OpenReader) -> Self {
        Self {
            paths,
            loops,
            open,
            pass: 0,
            next_index: 0,
            current: None,
            last_caps: None,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn next_path(&mut self) -> Option<PathBuf> {
        if self.paths.is_empty() {
            return None;
        }
        if self.next_index == self.paths.len() {
            if self.pass == self.loops {
                return None;
            }
            self.pass += 1;
            self.next_index = 0;
            log::info!("Playlist: starting loop {} of {}", self.pass, self.loops);
        }
        let path = self.paths[self.next_index].clone();
        self.next_index += 1;
        Some(path)
    }

    fn open_next(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.next_path() else {
            log::info!("Playlist: finished");
            self.finished = true;
            self.pending.push_back(SourceItem::eos());
            return Ok(());
        };

        let reader = (self.open)(&path).with_context(|| format!("open {}", path.display()))?;
        let caps = reader.caps();
        log::info!("Playlist: opened {} ({})", path.display(), caps);
        if self.last_caps.as_ref() != Some(&caps) {
            self.pending.push_back(SourceItem::caps(caps.clone()));
            self.last_caps = Some(caps);
        }
        self.pending
            .push_back(SourceItem::location(path.to_string_lossy()));
        self.current = Some(reader);
        Ok(())
    }
}

impl BufferSource for Playlist {
    fn next_item(&mut self) -> anyhow::Result<Option<SourceItem>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            if self.finished {
                return Ok(None);
            }
            match self.current.as_mut() {
                Some(reader) => match reader.read_buffer()? {
                    Some(buffer) => return Ok(Some(SourceItem::Buffer(buffer))),
                    None => self.current = None,
                },
                None => self.open_next()?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{InputBuffer, SinkEvent};

    struct FakeReader {
        caps: Caps,
        remaining: u64,
    }

    impl MediaReader for FakeReader {
        fn caps(&self) -> Caps {
            self.caps.clone()
        }

        fn read_buffer(&mut self) -> anyhow::Result<Option<InputBuffer>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(InputBuffer::new(vec![0u8], Some(self.remaining))))
        }
    }

    /// "wide" files negotiate a different size than the others.
    fn open_fake() -> OpenReader {
        Box::new(|path: &Path| {
            if path.to_string_lossy().contains("missing") {
                anyhow::bail!("no such file");
            }
            let width = if path.to_string_lossy().contains("wide") { 1280 } else { 640 };
            Ok(Box::new(FakeReader {
                caps: Caps::new("video/x-h264").with_size(width, 480),
                remaining: 2,
            }) as Box<dyn MediaReader>)
        })
    }

    fn describe(source: &mut dyn BufferSource) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(item) = source.next_item().unwrap() {
            out.push(match item {
                SourceItem::Event(SinkEvent::Caps(caps)) => format!("caps {}", caps.width.unwrap()),
                SourceItem::Event(SinkEvent::Tag { location }) => format!("tag {}", location.unwrap()),
                SourceItem::Event(SinkEvent::Eos) => "eos".to_string(),
                SourceItem::Buffer(_) => "buffer".to_string(),
            });
        }
        out
    }

    #[test]
    fn test_plays_files_in_order() {
        let mut playlist = Playlist::new(vec!["a.mp4".into(), "wide.mp4".into()], 0, open_fake());
        assert_eq!(
            describe(&mut playlist),
            [
                "caps 640",
                "tag a.mp4",
                "buffer",
                "buffer",
                "caps 1280",
                "tag wide.mp4",
                "buffer",
                "buffer",
                "eos"
            ]
        );
        assert!(playlist.next_item().unwrap().is_none());
    }

    #[test]
    fn test_loops_replay_with_tags() {
        let mut playlist = Playlist::new(vec!["a.mp4".into()], 2, open_fake());
        let items = describe(&mut playlist);
        assert_eq!(items.iter().filter(|i| *i == "tag a.mp4").count(), 3);
        assert_eq!(items.iter().filter(|i| i.starts_with("caps")).count(), 1);
        assert_eq!(items.iter().filter(|i| *i == "buffer").count(), 6);
        assert_eq!(items.last().map(String::as_str), Some("eos"));
    }

    #[test]
    fn test_empty_playlist_only_eos() {
        let mut playlist = Playlist::new(Vec::new(), 3, open_fake());
        assert_eq!(describe(&mut playlist), ["eos"]);
    }

    #[test]
    fn test_open_failure() {
        let mut playlist = Playlist::new(vec!["missing.mp4".into()], 0, open_fake());
        let err = playlist.next_item().unwrap_err();
        assert!(format!("{:#}", err).contains("missing.mp4"));
    }
}
