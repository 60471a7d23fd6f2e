//! Sidecar metadata files: back-to-back JSON records, one per frame, stored
//! next to the media file as `<stem>.json`.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::{de::IoRead, StreamDeserializer, Value};

use crate::error::SidecarError;

const SCHEMA_FIELD: &str = "schema";
const VIDEO_FRAME_SCHEMA: &str = "VideoFrame";

/// Path of the sidecar file for a media location.
pub fn sidecar_path(location: &Path) -> PathBuf {
    let stem = location.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".json");
    location.with_file_name(name)
}

/// Splits a byte stream of concatenated JSON values into individual records.
/// No delimiter is required between records.
pub struct RecordSplitter<R: Read> {
    inner: StreamDeserializer<'static, IoRead<R>, Value>,
}

impl<R: Read> RecordSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: serde_json::Deserializer::from_reader(reader).into_iter::<Value>(),
        }
    }
}

impl<R: Read> Iterator for RecordSplitter<R> {
    type Item = Result<Value, serde_json::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Bounding box as written by object producers.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BBoxRecord {
    pub xc: f32,
    pub yc: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub angle: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ObjectAttributeRecord {
    pub element_name: String,
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ObjectRecord {
    pub model_name: String,
    pub label: String,
    pub object_id: i64,
    pub bbox: BBoxRecord,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub attributes: Vec<ObjectAttributeRecord>,
    #[serde(default)]
    pub parent_object_id: Option<i64>,
}

/// Object metadata of one frame.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

/// A record counts as a frame record when it has no schema or the video
/// frame schema.
pub fn is_frame_record(record: &Value) -> bool {
    match record.get(SCHEMA_FIELD) {
        Some(schema) => schema.as_str() == Some(VIDEO_FRAME_SCHEMA),
        None => true,
    }
}

fn parse_frame_record(mut record: Value) -> Result<FrameRecord, serde_json::Error> {
    // schema-wrapped records nest the frame metadata
    if record.get("metadata").is_some_and(Value::is_object) {
        record = record["metadata"].take();
    }
    serde_json::from_value(record)
}

pub struct MetadataFileReader;

impl MetadataFileReader {
    /// Loads frame records in file order. Returns `Ok(None)` when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Option<Vec<FrameRecord>>, SidecarError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SidecarError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::read(path, BufReader::new(file)).map(Some)
    }

    /// Parses records from any reader; `path` is only used in errors.
    pub fn read<R: Read>(path: &Path, reader: R) -> Result<Vec<FrameRecord>, SidecarError> {
        let mut records = Vec::new();
        for (index, record) in RecordSplitter::new(reader).enumerate() {
            let malformed = |source| SidecarError::MalformedRecord {
                path: path.to_path_buf(),
                index,
                source,
            };
            let record = record.map_err(malformed)?;
            if !is_frame_record(&record) {
                continue;
            }
            records.push(parse_frame_record(record).map_err(malformed)?);
        }
        log::debug!(
            "loaded {} frame records from {}",
            records.len(),
            path.display()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJECT: &str = r#"{"model_name":"yolo","label":"car","object_id":3,
        "bbox":{"xc":10.0,"yc":20.0,"width":4.0,"height":2.0},"confidence":0.5,
        "attributes":[{"element_name":"color","name":"main","value":"red","confidence":0.9}]}"#;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/data/videos/clip.mp4")),
            PathBuf::from("/data/videos/clip.json")
        );
        assert_eq!(
            sidecar_path(Path::new("clip.tar.mp4")),
            PathBuf::from("clip.tar.json")
        );
    }

    #[test]
    fn test_splitter_without_delimiters() {
        let records: Vec<Value> = RecordSplitter::new(r#"{"a":1}{"a":2}  {"a":3}"#.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["a"], 3);
    }

    #[test]
    fn test_frame_record_filter() {
        assert!(is_frame_record(&serde_json::json!({ "objects": [] })));
        assert!(is_frame_record(
            &serde_json::json!({ "schema": "VideoFrame", "objects": [] })
        ));
        assert!(!is_frame_record(&serde_json::json!({ "schema": "EndOfStream" })));
        assert!(!is_frame_record(&serde_json::json!({ "schema": 1 })));
    }

    #[test]
    fn test_read_filters_and_unwraps() {
        let data = format!(
            r#"{{"objects":[{OBJECT}]}}
            {{"schema":"EndOfStream","source_id":"a"}}
            {{"schema":"VideoFrame","metadata":{{"objects":[]}}}}
            {{"schema":"VideoFrame"}}"#
        );
        let records = MetadataFileReader::read(Path::new("x.json"), data.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].objects.len(), 1);
        let object = &records[0].objects[0];
        assert_eq!(object.model_name, "yolo");
        assert_eq!(object.object_id, 3);
        assert_eq!(object.bbox.angle, None);
        assert_eq!(object.attributes[0].value, serde_json::json!("red"));
        assert!(records[1].objects.is_empty());
        assert!(records[2].objects.is_empty());
    }

    #[test]
    fn test_malformed_record_fails_load() {
        let data = r#"{"objects":[]}{"objects":[{"label":"car"}]}"#;
        let err = MetadataFileReader::read(Path::new("x.json"), data.as_bytes()).unwrap_err();
        assert!(matches!(err, SidecarError::MalformedRecord { index: 1, .. }));

        let data = r#"{"objects":[]}{"objects":"#;
        let err = MetadataFileReader::read(Path::new("x.json"), data.as_bytes()).unwrap_err();
        assert!(matches!(err, SidecarError::MalformedRecord { index: 1, .. }));
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let result = MetadataFileReader::load(&dir.path().join("missing.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.json");
        std::fs::write(&path, r#"{"objects":[]}{"objects":[]}"#).unwrap();
        let records = MetadataFileReader::load(&path).unwrap().unwrap();
        assert_eq!(records.len(), 2);
    }
}
