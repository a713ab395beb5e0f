//! QR payloads: the text carried by an attendee's code and the PNG it is drawn into.

mod codec;
mod render;

pub use codec::{decode, encode, DecodeError};
pub use render::{render_png, QrError};
