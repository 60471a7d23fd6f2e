//! Wire schema shared by the serializer and its consumers.
//!
//! A message is one of [`VideoFrame`], [`EndOfStream`] or [`Shutdown`],
//! wrapped in a versioned envelope by [`save_message_to_bytes`].

pub mod attribute;
pub mod frame;
pub mod message;
pub mod object;

pub use attribute::{Attribute, AttributeValue, AttributeValueVariant, DEFAULT_NAMESPACE};
pub use frame::{VideoFrame, VideoFrameContent, VideoFrameTransformation, DEFAULT_TIME_BASE};
pub use message::{
    load_message_from_bytes, save_message_to_bytes, EndOfStream, Message, Shutdown,
    PROTOCOL_VERSION,
};
pub use object::{RBBox, VideoObject};
