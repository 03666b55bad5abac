mod basic_info_message;

pub use basic_info_message::{BasicInfoMessage, DecodeError, MIN_FRAME_LEN};

pub(crate) use basic_info_message::REQUEST;
