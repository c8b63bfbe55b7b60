//! Wire format decoding of request bodies.
//!
//! - [`MultipartDecoder`]: a [`tokio_util::codec::Decoder`] splitting a
//!   `multipart/form-data` body into [`PartItem`]s while it streams in
//! - [`PartHeader`]: the `Content-Disposition` / `Content-Type` of one part

mod multipart_decoder;
mod part_header;

pub use multipart_decoder::MultipartDecoder;
pub use multipart_decoder::PartItem;
pub use multipart_decoder::MAX_PART_HEADER_SIZE;
pub use part_header::parse_boundary;
pub use part_header::PartHeader;
