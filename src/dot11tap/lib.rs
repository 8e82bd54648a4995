//! Decoders for 802.11 MAC frames and the radiotap headers capture drivers
//! put in front of them.
//!
//! Both decoders are pure functions over a borrowed buffer:
//!
//! ```
//! let capture = [
//!     0, 0, 0x09, 0, 0x04, 0, 0, 0, 0x02,
//!     0xd4, 0x00, 0x00, 0x00, 0x28, 0xcf, 0xda, 0xb2, 0x16, 0xd0,
//! ];
//! let tap = dot11tap::decode_radiotap(&capture).unwrap();
//! assert_eq!(tap.rate, 2);
//! let frame = dot11tap::decode_frame(tap.frame_bytes(&capture)).unwrap();
//! assert_eq!(frame.addr1.unwrap().to_string(), "28:cf:da:b2:16:d0");
//! ```

pub mod ether;
pub mod util;
pub mod dot11;
pub mod tap;

pub use crate::dot11::{decode as decode_frame, decode_with as decode_frame_with, FcsMode, Frame};
pub use crate::ether::MacAddr;
pub use crate::tap::{decode as decode_radiotap, RadiotapHeader};
pub use crate::util::{DecodeError, DecodeResult};
